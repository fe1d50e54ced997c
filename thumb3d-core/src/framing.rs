//! Fit-to-view camera placement.
use nalgebra::{Point3, Vector3};

use crate::error::FrameError;
use crate::geometry::Geometry;
use crate::projection::Camera;

/// Reject camera angles that cannot be normalized.
pub fn check_direction(angle: &Vector3<f32>) -> Result<(), FrameError> {
    if !angle.iter().all(|c| c.is_finite()) {
        return Err(FrameError::NonFinite);
    }
    if angle.norm_squared() <= f32::EPSILON * f32::EPSILON {
        return Err(FrameError::ZeroDirection);
    }
    Ok(())
}

/// Distance from the origin at which a sphere of `radius` exactly fills a
/// vertical field of view of `fov_degrees`.
pub fn fit_distance(radius: f32, fov_degrees: f32) -> Result<f32, FrameError> {
    if !(fov_degrees > 0.0 && fov_degrees < 180.0) {
        return Err(FrameError::InvalidFov(fov_degrees));
    }
    let fov = fov_degrees * (std::f32::consts::PI / 180.0);
    Ok((radius / (fov / 2.0).sin()).abs())
}

/// Near and far planes enclosing a sphere of `radius` seen from `distance`,
/// with slack on both sides.
fn clip_planes(radius: f32, distance: f32) -> (f32, f32) {
    let near = ((distance - radius) * 0.5).max(radius * 1e-3).max(f32::MIN_POSITIVE);
    (near, distance + radius * 2.0)
}

/// Place `camera` along `angle` so the geometry's bounding sphere fills the
/// vertical field of view, looking at the origin.
///
/// `angle` only contributes its direction; the magnitude is replaced by the
/// fit distance. A zero or non-finite angle is rejected and leaves the camera
/// untouched. The near and far planes are reset around the fitted sphere, so
/// depth resolution does not depend on the scale of the part. Returns the fit
/// distance.
pub fn frame(
    camera: &mut Camera,
    geometry: &Geometry,
    angle: Vector3<f32>,
) -> Result<f32, FrameError> {
    check_direction(&angle)?;
    let radius = geometry.bounding_sphere().radius;
    let distance = fit_distance(radius, camera.fov)?;

    camera.position = Point3::from(angle);
    camera.look_at(Point3::origin());
    camera.position = Point3::from(angle.normalize() * distance);

    let (near, far) = clip_planes(radius, distance);
    camera.near = near;
    camera.far = far;
    camera.update_projection_matrix();

    Ok(distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Mesh;

    fn cube_geometry(size: f32) -> Geometry {
        Geometry::from_mesh(&Mesh::cube(size)).unwrap()
    }

    #[test]
    fn test_fit_distance_formula() {
        // sin(30deg) = 0.5
        let d = fit_distance(2.0, 60.0).unwrap();
        assert!((d - 4.0).abs() < 1e-5);
        assert!(fit_distance(2.0, 0.0).is_err());
        assert!(fit_distance(2.0, 180.0).is_err());
    }

    #[test]
    fn test_frame_preserves_direction() {
        let geometry = cube_geometry(2.0);
        let mut camera = Camera::new(100, 100);
        let angle = Vector3::new(10.0, 50.0, 100.0);

        let distance = frame(&mut camera, &geometry, angle).unwrap();
        let expected = 3.0_f32.sqrt() / (22.5_f32.to_radians()).sin();
        assert!((distance - expected).abs() < 1e-4);
        assert!((camera.position.coords.norm() - distance).abs() < 1e-4);

        let direction = camera.position.coords.normalize();
        assert!((direction - angle.normalize()).norm() < 1e-6);
        assert_eq!(camera.target, Point3::origin());
    }

    #[test]
    fn test_frame_is_idempotent() {
        let geometry = cube_geometry(3.0);
        let mut camera = Camera::new(64, 48);
        let angle = Vector3::new(-4.0, 2.0, 9.0);

        let first = frame(&mut camera, &geometry, angle).unwrap();
        let position = camera.position;
        let second = frame(&mut camera, &geometry, angle).unwrap();

        assert_eq!(first, second);
        assert_eq!(position, camera.position);
    }

    #[test]
    fn test_zero_angle_is_rejected() {
        let geometry = cube_geometry(1.0);
        let mut camera = Camera::new(10, 10);
        let before = camera.position;

        let err = frame(&mut camera, &geometry, Vector3::zeros()).unwrap_err();
        assert_eq!(err, FrameError::ZeroDirection);
        assert_eq!(camera.position, before);

        let err = frame(&mut camera, &geometry, Vector3::new(f32::NAN, 1.0, 0.0)).unwrap_err();
        assert_eq!(err, FrameError::NonFinite);
    }

    #[test]
    fn test_frame_encloses_sphere_in_clip_planes() {
        let geometry = cube_geometry(5000.0);
        let mut camera = Camera::new(10, 10);
        let distance = frame(&mut camera, &geometry, Vector3::z()).unwrap();
        let radius = geometry.bounding_sphere().radius;
        assert!(camera.far >= distance + radius);
        assert!(camera.near > 0.0 && camera.near < distance - radius);
    }

    #[test]
    fn test_clip_planes_scale_with_the_part() {
        let mut small = Camera::new(10, 10);
        let mut large = Camera::new(10, 10);
        frame(&mut small, &cube_geometry(1.0), Vector3::z()).unwrap();
        frame(&mut large, &cube_geometry(1.0e5), Vector3::z()).unwrap();

        let ratio = |c: &Camera| c.far / c.near;
        assert!((ratio(&small) - ratio(&large)).abs() / ratio(&small) < 1e-3);
        assert!((large.near / small.near - 1.0e5).abs() / 1.0e5 < 1e-3);
    }

    #[test]
    fn test_invalid_fov_leaves_camera_untouched() {
        let geometry = cube_geometry(1.0);
        let mut camera = Camera::new(10, 10);
        camera.fov = 180.0;
        let (position, near, far) = (camera.position, camera.near, camera.far);

        let err = frame(&mut camera, &geometry, Vector3::new(1.0, 2.0, 3.0)).unwrap_err();
        assert_eq!(err, FrameError::InvalidFov(180.0));
        assert_eq!(camera.position, position);
        assert_eq!((camera.near, camera.far), (near, far));
    }
}
