//! Geometry primitives and the normalized render geometry.
use std::collections::HashMap;

use nalgebra::{Point3, Vector3};

/// A 3D vertex with position and normal
#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
}

impl Vertex {
    pub fn new(x: f32, y: f32, z: f32, nx: f32, ny: f32, nz: f32) -> Self {
        Self {
            position: Point3::new(x, y, z),
            normal: Vector3::new(nx, ny, nz),
        }
    }
}

/// A triangle face defined by three vertices
#[derive(Debug, Clone)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
}

impl Triangle {
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    /// Unnormalized face normal; its length is twice the triangle area.
    pub fn area_normal(&self) -> Vector3<f32> {
        let v0 = self.vertices[0].position;
        let v1 = self.vertices[1].position;
        let v2 = self.vertices[2].position;

        (v1 - v0).cross(&(v2 - v0))
    }

    /// Calculate the face normal from the triangle's vertices
    pub fn calculate_normal(&self) -> Vector3<f32> {
        self.area_normal()
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::zeros)
    }
}

/// A triangle soup as decoded from a mesh file
#[derive(Debug, Clone)]
pub struct Mesh {
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            triangles: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            triangles: Vec::with_capacity(capacity),
        }
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    /// Create an axis-aligned cube mesh centered at the origin
    pub fn cube(size: f32) -> Self {
        let h = size / 2.0;
        let mut mesh = Self::with_capacity(12);

        // (normal, four corners in counter-clockwise order seen from outside)
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([0.0, 0.0, 1.0], [[-h, -h, h], [h, -h, h], [h, h, h], [-h, h, h]]),
            ([0.0, 0.0, -1.0], [[h, -h, -h], [-h, -h, -h], [-h, h, -h], [h, h, -h]]),
            ([0.0, 1.0, 0.0], [[-h, h, h], [h, h, h], [h, h, -h], [-h, h, -h]]),
            ([0.0, -1.0, 0.0], [[-h, -h, -h], [h, -h, -h], [h, -h, h], [-h, -h, h]]),
            ([1.0, 0.0, 0.0], [[h, -h, h], [h, -h, -h], [h, h, -h], [h, h, h]]),
            ([-1.0, 0.0, 0.0], [[-h, -h, -h], [-h, -h, h], [-h, h, h], [-h, h, -h]]),
        ];

        for ([nx, ny, nz], corners) in faces {
            let v = corners.map(|[x, y, z]| Vertex::new(x, y, z, nx, ny, nz));
            mesh.add_triangle(Triangle::new(v[0], v[1], v[2]));
            mesh.add_triangle(Triangle::new(v[0], v[2], v[3]));
        }

        mesh
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl BoundingBox {
    /// Box enclosing `points`, or `None` when there are none.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f32>>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        let mut bounds = Self {
            min: first,
            max: first,
        };
        for p in points {
            bounds.min = bounds.min.inf(p);
            bounds.max = bounds.max.sup(p);
        }
        Some(bounds)
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }
}

/// Sphere enclosing every vertex of a geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Point3<f32>,
    pub radius: f32,
}

/// Normalized render geometry.
///
/// Built once per session from the parsed [`Mesh`]: positions are recentered
/// so the bounding box center sits at the origin, then smooth vertex normals,
/// the bounding box and the bounding sphere are computed on the centered data.
#[derive(Debug, Clone)]
pub struct Geometry {
    /// Three consecutive positions per triangle.
    positions: Vec<Point3<f32>>,
    /// One normal per entry of `positions`.
    normals: Vec<Vector3<f32>>,
    bounding_box: BoundingBox,
    bounding_sphere: BoundingSphere,
}

impl Geometry {
    /// Normalize a mesh. Returns `None` for a mesh without triangles.
    pub fn from_mesh(mesh: &Mesh) -> Option<Self> {
        let positions: Vec<Point3<f32>> = mesh
            .triangles
            .iter()
            .flat_map(|t| t.vertices.iter().map(|v| v.position))
            .collect();

        let mut geometry = Self {
            bounding_box: BoundingBox::from_points(&positions)?,
            bounding_sphere: BoundingSphere {
                center: Point3::origin(),
                radius: 0.0,
            },
            normals: Vec::new(),
            positions,
        };

        geometry.center();
        geometry.compute_vertex_normals();
        geometry.compute_bounding_box();
        geometry.compute_bounding_sphere();
        Some(geometry)
    }

    pub fn positions(&self) -> &[Point3<f32>] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vector3<f32>] {
        &self.normals
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Iterate triangles as `(positions, normals)` triples
    pub fn triangles(&self) -> impl Iterator<Item = (&[Point3<f32>], &[Vector3<f32>])> {
        self.positions.chunks_exact(3).zip(self.normals.chunks_exact(3))
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    pub fn bounding_sphere(&self) -> &BoundingSphere {
        &self.bounding_sphere
    }

    /// Translate the positions so the bounding box center lands on the origin.
    fn center(&mut self) {
        let offset = self.bounding_box.center().coords;
        for p in &mut self.positions {
            *p -= offset;
        }
    }

    fn compute_bounding_box(&mut self) {
        if let Some(bounds) = BoundingBox::from_points(&self.positions) {
            self.bounding_box = bounds;
        }
    }

    /// Box-centered sphere; radius is the farthest vertex from the center.
    fn compute_bounding_sphere(&mut self) {
        let center = self.bounding_box.center();
        let radius = self
            .positions
            .iter()
            .map(|p| nalgebra::distance(&center, p))
            .fold(0.0_f32, f32::max);
        self.bounding_sphere = BoundingSphere { center, radius };
    }

    /// Smooth normals: area-weighted face normals summed over every corner that
    /// shares an exact position, then normalized.
    fn compute_vertex_normals(&mut self) {
        let key = |p: &Point3<f32>| [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
        let mut accumulated: HashMap<[u32; 3], Vector3<f32>> = HashMap::new();
        let mut face_normals = Vec::with_capacity(self.triangle_count());

        for tri in self.positions.chunks_exact(3) {
            let n = (tri[1] - tri[0]).cross(&(tri[2] - tri[0]));
            face_normals.push(n);
            for p in tri {
                *accumulated.entry(key(p)).or_insert_with(Vector3::zeros) += n;
            }
        }

        self.normals = self
            .positions
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let face = face_normals[i / 3];
                accumulated[&key(p)]
                    .try_normalize(f32::EPSILON)
                    .or_else(|| face.try_normalize(f32::EPSILON))
                    .unwrap_or_else(Vector3::z)
            })
            .collect();
    }
}
