//! Software rasterizer that draws a composed scene into an offscreen context
use nalgebra::{Matrix3, Matrix4, Point3, Vector3, Vector4};
use thumb3d_core::color::GAMMA_FACTOR;
use thumb3d_core::{
    BoundingSphere, Camera, Color, Geometry, Light, Material, NodeKind, ProjectSettings, Scene,
    Shading, Side, Transform,
};
use tracing::debug;

use crate::context::{RenderContext, RenderTarget};
use crate::error::RenderError;
use crate::raster::{rasterize_triangle, ScreenVertex};
use crate::shadow::{merge_spheres, world_sphere, Caster, ShadowMap};

/// Renderer bound to one offscreen context
pub struct Renderer {
    context: RenderContext,
    project: ProjectSettings,
    clear_color: Color,
    clear_alpha: f32,
}

/// Light in world space with its color already scaled by intensity
enum LightSample {
    Directional {
        to_light: Vector3<f32>,
        color: Vector3<f32>,
        shadow: Option<ShadowMap>,
    },
    Point {
        position: Point3<f32>,
        color: Vector3<f32>,
        distance: f32,
        decay: f32,
    },
}

struct Lighting {
    ambient: Vector3<f32>,
    lights: Vec<LightSample>,
}

/// Per-mesh state shared by all of its triangles
struct DrawCall<'a> {
    world: Matrix4<f32>,
    normal_matrix: Matrix3<f32>,
    geometry: &'a Geometry,
    material: ShadeMaterial,
    receive_shadow: bool,
}

/// Material with colors converted for shading
struct ShadeMaterial {
    shading: Shading,
    side: Side,
    color: Vector3<f32>,
    emissive: Vector3<f32>,
    specular: Vector3<f32>,
    shininess: f32,
    alpha: f32,
    translucent: bool,
}

#[derive(Clone, Copy)]
struct ClipVertex {
    clip: Vector4<f32>,
    world: Point3<f32>,
    normal: Vector3<f32>,
}

impl Renderer {
    pub fn new(context: RenderContext) -> Self {
        Self {
            context,
            project: ProjectSettings::default(),
            clear_color: Color::BLACK,
            clear_alpha: 1.0,
        }
    }

    /// Apply the base scene's `project` flags
    pub fn configure(&mut self, project: ProjectSettings) {
        self.project = project;
    }

    /// Resize the viewport, reallocating the context when the size changes
    pub fn set_size(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if (width, height) != (self.context.width(), self.context.height()) {
            self.context = RenderContext::new(width, height, self.context.options())?;
        }
        Ok(())
    }

    pub fn set_clear_color(&mut self, color: Color, alpha: f32) {
        self.clear_color = color;
        self.clear_alpha = alpha.clamp(0.0, 1.0);
    }

    /// Draw `scene` through `camera` and resolve the result into `target`.
    ///
    /// Opaque meshes are drawn first; translucent meshes follow with their
    /// triangles sorted back to front and blended over the frame.
    pub fn render(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        target: &mut RenderTarget,
    ) -> Result<(), RenderError> {
        let (width, height) = (self.context.width(), self.context.height());
        if (target.width(), target.height()) != (width, height) {
            return Err(RenderError::TargetMismatch {
                width,
                height,
                got_width: target.width(),
                got_height: target.height(),
            });
        }

        let view_proj = camera.view_projection();
        if !view_proj.iter().all(|c| c.is_finite()) {
            return Err(RenderError::DegenerateCamera);
        }

        match scene.background {
            Some(background) => self.context.clear(background, 1.0),
            None => self.context.clear(self.clear_color, self.clear_alpha),
        }

        let calls = self.draw_calls(scene);
        let lighting = self.lighting(scene, &calls);
        debug!(
            width,
            height,
            meshes = calls.len(),
            lights = lighting.lights.len(),
            "rendering scene"
        );

        let mut translucent = Vec::new();
        for call in &calls {
            let vertices = transform_vertices(call, &view_proj);
            if call.material.translucent {
                for tri in vertices.chunks_exact(3) {
                    let centroid = (tri[0].world.coords + tri[1].world.coords + tri[2].world.coords) / 3.0;
                    let depth = (Point3::from(centroid) - camera.position).norm_squared();
                    translucent.push((depth, call, [tri[0], tri[1], tri[2]]));
                }
            } else {
                for tri in vertices.chunks_exact(3) {
                    self.draw_triangle(&[tri[0], tri[1], tri[2]], call, &lighting, camera);
                }
            }
        }

        translucent.sort_by(|a, b| b.0.total_cmp(&a.0));
        for (_, call, tri) in &translucent {
            self.draw_triangle(tri, call, &lighting, camera);
        }

        self.context.resolve(target);
        Ok(())
    }

    fn draw_calls<'a>(&self, scene: &'a Scene) -> Vec<DrawCall<'a>> {
        scene
            .world_nodes()
            .into_iter()
            .filter_map(|(world, node)| match &node.kind {
                NodeKind::Mesh(mesh) => mesh.geometry.as_deref().map(|geometry| DrawCall {
                    world,
                    normal_matrix: Transform::normal_matrix(&world),
                    geometry,
                    material: self.shade_material(&mesh.material),
                    receive_shadow: mesh.receive_shadow && self.project.shadows,
                }),
                _ => None,
            })
            .collect()
    }

    fn input_color(&self, color: Color) -> Vector3<f32> {
        if self.project.gamma_input {
            color.gamma_to_linear(GAMMA_FACTOR).as_vector()
        } else {
            color.as_vector()
        }
    }

    fn shade_material(&self, material: &Material) -> ShadeMaterial {
        ShadeMaterial {
            shading: material.shading,
            side: material.side,
            color: self.input_color(material.color),
            emissive: self.input_color(material.emissive),
            specular: self.input_color(material.specular),
            shininess: material.shininess,
            alpha: material.alpha(),
            translucent: material.is_translucent(),
        }
    }

    fn lighting(&self, scene: &Scene, calls: &[DrawCall<'_>]) -> Lighting {
        let casters: Vec<Caster<'_>> = scene
            .world_nodes()
            .into_iter()
            .filter_map(|(world, node)| match &node.kind {
                NodeKind::Mesh(mesh) if mesh.cast_shadow => {
                    mesh.geometry.as_deref().map(|geometry| Caster { world, geometry })
                }
                _ => None,
            })
            .collect();
        let bounds = calls
            .iter()
            .map(|call| world_sphere(&call.world, call.geometry))
            .reduce(|a, b| merge_spheres(&a, &b))
            .unwrap_or(BoundingSphere {
                center: Point3::origin(),
                radius: 1.0,
            });

        let mut lighting = Lighting {
            ambient: Vector3::zeros(),
            lights: Vec::new(),
        };

        for (world, node) in scene.world_nodes() {
            let NodeKind::Light(light) = &node.kind else {
                continue;
            };
            let position = world.transform_point(&Point3::origin());

            match light {
                Light::Ambient { color, intensity } => {
                    lighting.ambient += self.input_color(*color) * *intensity;
                }
                Light::Directional {
                    color,
                    intensity,
                    cast_shadow,
                } => {
                    let Some(to_light) = position.coords.try_normalize(f32::EPSILON) else {
                        continue;
                    };
                    let shadow = (self.project.shadows && *cast_shadow && !casters.is_empty())
                        .then(|| ShadowMap::build(&to_light, &bounds, &casters));
                    lighting.lights.push(LightSample::Directional {
                        to_light,
                        color: self.input_color(*color) * *intensity,
                        shadow,
                    });
                }
                Light::Point {
                    color,
                    intensity,
                    distance,
                    decay,
                } => lighting.lights.push(LightSample::Point {
                    position,
                    color: self.input_color(*color) * *intensity,
                    distance: *distance,
                    decay: *decay,
                }),
            }
        }

        lighting
    }

    fn draw_triangle(
        &mut self,
        tri: &[ClipVertex; 3],
        call: &DrawCall<'_>,
        lighting: &Lighting,
        camera: &Camera,
    ) {
        // Triangles crossing the camera plane are dropped; framing keeps the
        // part in front of the near plane
        if tri.iter().any(|v| v.clip.w <= 1e-6) {
            return;
        }

        let ndc = tri.map(|v| v.clip.xyz() / v.clip.w);
        let area = (ndc[1].x - ndc[0].x) * (ndc[2].y - ndc[0].y)
            - (ndc[2].x - ndc[0].x) * (ndc[1].y - ndc[0].y);
        let front_facing = area > 0.0;
        match call.material.side {
            Side::Front if !front_facing => return,
            Side::Back if front_facing => return,
            _ => {}
        }
        let facing = if front_facing { 1.0 } else { -1.0 };

        let (bw, bh) = (self.context.buffer_width(), self.context.buffer_height());
        let coords: [ScreenVertex; 3] = ndc.map(|p| {
            (
                (p.x + 1.0) * 0.5 * bw as f32,
                (1.0 - p.y) * 0.5 * bh as f32,
                p.z,
            )
        });
        let inv_w = tri.map(|v| 1.0 / v.clip.w);

        let material = &call.material;
        let project = self.project;
        let RenderContext { color, depth, .. } = &mut self.context;

        rasterize_triangle(&coords, bw, bh, |x, y, w| {
            let z = w[0] * coords[0].2 + w[1] * coords[1].2 + w[2] * coords[2].2;
            let idx = y * bw + x;
            if !(-1.0..=1.0).contains(&z) || z >= depth[idx] {
                return;
            }

            // Perspective-correct attribute weights
            let pw = [w[0] * inv_w[0], w[1] * inv_w[1], w[2] * inv_w[2]];
            let sum = pw[0] + pw[1] + pw[2];
            let pw = pw.map(|c| c / sum);

            let world = Point3::from(
                tri[0].world.coords * pw[0] + tri[1].world.coords * pw[1] + tri[2].world.coords * pw[2],
            );
            let normal = (tri[0].normal * pw[0] + tri[1].normal * pw[1] + tri[2].normal * pw[2]) * facing;
            let normal = normal.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::z);

            let rgb = shade(material, project, lighting, call.receive_shadow, &world, &normal, camera);
            let a = material.alpha;
            let dst = color[idx];
            color[idx] = [
                rgb.x * a + dst[0] * (1.0 - a),
                rgb.y * a + dst[1] * (1.0 - a),
                rgb.z * a + dst[2] * (1.0 - a),
                a + dst[3] * (1.0 - a),
            ];
            depth[idx] = z;
        });
    }
}

fn transform_vertices(call: &DrawCall<'_>, view_proj: &Matrix4<f32>) -> Vec<ClipVertex> {
    call.geometry
        .positions()
        .iter()
        .zip(call.geometry.normals())
        .map(|(p, n)| {
            let world = call.world.transform_point(p);
            ClipVertex {
                clip: view_proj * world.to_homogeneous(),
                world,
                normal: (call.normal_matrix * n)
                    .try_normalize(f32::EPSILON)
                    .unwrap_or(*n),
            }
        })
        .collect()
}

fn shade(
    material: &ShadeMaterial,
    project: ProjectSettings,
    lighting: &Lighting,
    receive_shadow: bool,
    world: &Point3<f32>,
    normal: &Vector3<f32>,
    camera: &Camera,
) -> Vector3<f32> {
    let rgb = match material.shading {
        Shading::Basic => material.color,
        Shading::Lambert | Shading::Phong => {
            let to_eye = (camera.position - world)
                .try_normalize(f32::EPSILON)
                .unwrap_or_else(Vector3::z);
            let mut diffuse = lighting.ambient;
            let mut specular = Vector3::zeros();

            for light in &lighting.lights {
                let (to_light, radiance, visibility) = match light {
                    LightSample::Directional {
                        to_light,
                        color,
                        shadow,
                    } => {
                        let n_dot_l = normal.dot(to_light);
                        let visibility = match shadow {
                            Some(map) if receive_shadow && n_dot_l > 0.0 => {
                                map.visibility(world, n_dot_l)
                            }
                            _ => 1.0,
                        };
                        (*to_light, *color, visibility)
                    }
                    LightSample::Point {
                        position,
                        color,
                        distance,
                        decay,
                    } => {
                        let offset = position - world;
                        let d = offset.norm();
                        let Some(to_light) = offset.try_normalize(f32::EPSILON) else {
                            continue;
                        };
                        let attenuation = if *distance > 0.0 {
                            (1.0 - d / distance).max(0.0).powf(*decay)
                        } else {
                            1.0
                        };
                        (to_light, color * attenuation, 1.0)
                    }
                };

                let n_dot_l = normal.dot(&to_light).max(0.0);
                diffuse += radiance * n_dot_l * visibility;

                if material.shading == Shading::Phong && n_dot_l > 0.0 {
                    let half = (to_light + to_eye).try_normalize(f32::EPSILON);
                    if let Some(half) = half {
                        let n_dot_h = normal.dot(&half).max(0.0);
                        specular += radiance * n_dot_h.powf(material.shininess.max(1.0)) * visibility;
                    }
                }
            }

            material.emissive
                + material.color.component_mul(&diffuse)
                + material.specular.component_mul(&specular)
        }
    };

    let rgb = rgb.map(|c| c.clamp(0.0, 1.0));
    if project.gamma_output {
        Color::from_vector(rgb).linear_to_gamma(GAMMA_FACTOR).as_vector()
    } else {
        rgb
    }
}
