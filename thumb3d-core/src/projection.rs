//! Perspective camera used to view a composed scene
use nalgebra::{Matrix4, Point3, Vector3};

/// Perspective camera configuration.
///
/// `fov` is the vertical field of view in degrees. The projection matrix is
/// cached; call [`Camera::update_projection_matrix`] after changing `fov`,
/// `aspect`, `near` or `far`.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    projection: Matrix4<f32>,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        let mut camera = Self {
            position: Point3::new(0.0, 0.0, 5.0),
            target: Point3::origin(),
            up: Vector3::y(),
            fov: 45.0,
            aspect: width as f32 / height.max(1) as f32,
            near: 0.1,
            far: 2000.0,
            projection: Matrix4::identity(),
        };
        camera.update_projection_matrix();
        camera
    }

    /// Camera with explicit lens parameters
    pub fn perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            fov,
            aspect,
            near,
            far,
            ..Self::new(1, 1)
        };
        camera.update_projection_matrix();
        camera
    }

    /// Orient the camera toward `target` from its current position
    pub fn look_at(&mut self, target: Point3<f32>) {
        self.target = target;
    }

    pub fn fov_radians(&self) -> f32 {
        self.fov.to_radians()
    }

    /// Create the view matrix (camera transformation)
    pub fn view_matrix(&self) -> Matrix4<f32> {
        let forward = self.target - self.position;
        // Looking straight along `up` leaves look_at without a basis
        let up = if forward.cross(&self.up).norm_squared() < 1e-12 {
            Vector3::z()
        } else {
            self.up
        };
        Matrix4::look_at_rh(&self.position, &self.target, &up)
    }

    pub fn projection_matrix(&self) -> &Matrix4<f32> {
        &self.projection
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection = Matrix4::new_perspective(
            self.aspect,
            self.fov_radians(),
            self.near,
            self.far,
        );
    }

    /// Combined projection * view matrix
    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection * self.view_matrix()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(800, 600)
    }
}
