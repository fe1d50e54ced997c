//! Orthographic shadow maps for directional lights.
use nalgebra::{Matrix4, Point3, Vector3};
use thumb3d_core::{BoundingSphere, Geometry};

use crate::raster::rasterize_triangle;

/// Shadow map resolution per side
const SHADOW_MAP_SIZE: usize = 1024;

/// Depth of the closest caster as seen from a directional light.
pub(crate) struct ShadowMap {
    view_proj: Matrix4<f32>,
    size: usize,
    depth: Vec<f32>,
}

/// A mesh contributing occluders
pub(crate) struct Caster<'a> {
    pub world: Matrix4<f32>,
    pub geometry: &'a Geometry,
}

impl ShadowMap {
    /// Render caster depth from a light shining along `-to_light` onto a
    /// square frustum enclosing `bounds`.
    pub fn build(to_light: &Vector3<f32>, bounds: &BoundingSphere, casters: &[Caster<'_>]) -> Self {
        let radius = bounds.radius.max(f32::EPSILON);
        let eye = bounds.center + to_light * radius * 2.0;
        let up = if to_light.y.abs() > 0.99 {
            Vector3::z()
        } else {
            Vector3::y()
        };
        let view = Matrix4::look_at_rh(&eye, &bounds.center, &up);
        let projection =
            Matrix4::new_orthographic(-radius, radius, -radius, radius, radius * 0.5, radius * 3.5);

        let mut map = Self {
            view_proj: projection * view,
            size: SHADOW_MAP_SIZE,
            depth: vec![f32::INFINITY; SHADOW_MAP_SIZE * SHADOW_MAP_SIZE],
        };

        for caster in casters {
            let mvp = map.view_proj * caster.world;
            for (positions, _) in caster.geometry.triangles() {
                let coords = [0, 1, 2].map(|i| map.to_texel(&mvp.transform_point(&positions[i])));
                let (size, depth) = (map.size, &mut map.depth);
                rasterize_triangle(&coords, size, size, |x, y, w| {
                    let z = w[0] * coords[0].2 + w[1] * coords[1].2 + w[2] * coords[2].2;
                    let idx = y * size + x;
                    if z < depth[idx] {
                        depth[idx] = z;
                    }
                });
            }
        }

        map
    }

    fn to_texel(&self, ndc: &Point3<f32>) -> (f32, f32, f32) {
        let size = self.size as f32;
        ((ndc.x + 1.0) * 0.5 * size, (1.0 - ndc.y) * 0.5 * size, ndc.z)
    }

    /// Fraction of 3x3 neighbouring texels that see `world` lit.
    /// `n_dot_l` scales the depth bias at grazing angles.
    pub fn visibility(&self, world: &Point3<f32>, n_dot_l: f32) -> f32 {
        let (u, v, z) = self.to_texel(&self.view_proj.transform_point(world));
        if !(-1.0..=1.0).contains(&z) {
            return 1.0;
        }

        let bias = 0.002 + 0.01 * (1.0 - n_dot_l.clamp(0.0, 1.0));
        let (cx, cy) = (u.floor() as i64, v.floor() as i64);
        let mut lit = 0;
        let mut total = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (x, y) = (cx + dx, cy + dy);
                total += 1;
                if x < 0 || y < 0 || x >= self.size as i64 || y >= self.size as i64 {
                    lit += 1;
                    continue;
                }
                if z - bias <= self.depth[y as usize * self.size + x as usize] {
                    lit += 1;
                }
            }
        }
        lit as f32 / total as f32
    }
}

/// World-space bounding sphere of a transformed geometry
pub(crate) fn world_sphere(world: &Matrix4<f32>, geometry: &Geometry) -> BoundingSphere {
    let sphere = geometry.bounding_sphere();
    let scale = (0..3)
        .map(|i| world.fixed_view::<3, 1>(0, i).norm())
        .fold(0.0_f32, f32::max);
    BoundingSphere {
        center: world.transform_point(&sphere.center),
        radius: sphere.radius * scale,
    }
}

/// Smallest sphere enclosing both spheres
pub(crate) fn merge_spheres(a: &BoundingSphere, b: &BoundingSphere) -> BoundingSphere {
    let offset = b.center - a.center;
    let distance = offset.norm();
    if distance + b.radius <= a.radius {
        return *a;
    }
    if distance + a.radius <= b.radius {
        return *b;
    }
    let radius = (distance + a.radius + b.radius) * 0.5;
    let center = a.center + offset * ((radius - a.radius) / distance);
    BoundingSphere { center, radius }
}
