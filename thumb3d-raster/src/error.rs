//! Error types for offscreen rendering and PNG encoding.

use thiserror::Error;

/// Errors raised by the offscreen context or the rasterizer.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The offscreen context could not be created for this viewport.
    #[error("unable to create a {width}x{height} offscreen context: {reason}")]
    ContextCreation {
        width: u32,
        height: u32,
        reason: String,
    },

    /// The render target does not match the renderer viewport.
    #[error("render target is {got_width}x{got_height}, viewport is {width}x{height}")]
    TargetMismatch {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },

    /// The camera matrices contain NaN or infinite values.
    #[error("camera produces a degenerate view projection")]
    DegenerateCamera,
}

/// Errors raised while turning a rendered frame into PNG bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("cannot encode an empty {width}x{height} frame")]
    Empty { width: u32, height: u32 },

    #[error("frame buffer holds {got} bytes, a {width}x{height} RGBA frame needs {expected}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },

    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),
}
