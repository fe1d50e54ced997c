//! Thumb3D Core Library - mesh decoding, geometry normalization, scene
//! composition and camera framing.
//!
//! Everything here is synchronous and free of I/O apart from reading a base
//! scene file; rasterization lives in `thumb3d-raster` and the async
//! orchestration in `thumb3d`.

pub mod color;
pub mod error;
pub mod framing;
pub mod geometry;
pub mod projection;
pub mod scene;
pub mod stl;
pub mod transform;

// Re-export commonly used types
pub use color::Color;
pub use error::{FrameError, ParseError, SceneError};
pub use framing::frame;
pub use geometry::{BoundingBox, BoundingSphere, Geometry, Mesh, Triangle, Vertex};
pub use projection::Camera;
pub use scene::{
    compose, BaseScene, ComposedScene, Light, Material, MeshObject, Node, NodeKind,
    ProjectSettings, Scene, Shading, Side,
};
pub use transform::{RotationState, Transform};

/// Parse STL bytes and normalize the result into render geometry.
pub fn load_geometry(data: &[u8]) -> Result<Geometry, ParseError> {
    let mesh = stl::parse_stl(data)?;
    let geometry = Geometry::from_mesh(&mesh).ok_or(ParseError::Empty)?;
    if !(geometry.bounding_sphere().radius > 0.0) {
        return Err(ParseError::Degenerate);
    }
    Ok(geometry)
}
