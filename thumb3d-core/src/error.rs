//! Error types for mesh decoding, scene composition and camera framing.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while decoding STL data.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Binary data too short to hold the 80-byte header and face count.
    #[error("invalid STL header: expected at least {expected} bytes, got {got}")]
    InvalidHeader { expected: usize, got: usize },

    /// Binary data shorter than the face count announces.
    #[error("truncated binary STL: {faces} faces need {expected} bytes, got {got}")]
    Truncated {
        faces: u32,
        expected: usize,
        got: usize,
    },

    /// ASCII data that does not follow the `solid`/`facet` grammar.
    #[error("malformed ASCII STL: {0}")]
    Ascii(String),

    /// A vertex coordinate is NaN or infinite.
    #[error("non-finite vertex coordinate in face {face}")]
    NonFinite { face: usize },

    /// The file decodes to zero triangles.
    #[error("STL contains no triangles")]
    Empty,

    /// Every vertex sits on the same point, so there is nothing to frame.
    #[error("STL vertices have no spatial extent")]
    Degenerate,
}

/// Errors raised while reading or instantiating a base scene.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("unable to read scene file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scene description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid scene description: {0}")]
    Invalid(String),
}

/// Errors raised while fitting a camera to a geometry.
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    /// The requested camera angle has no direction.
    #[error("camera angle must be a non-zero vector")]
    ZeroDirection,

    #[error("camera angle components must be finite")]
    NonFinite,

    #[error("camera field of view must be within (0, 180) degrees, got {0}")]
    InvalidFov(f32),
}
