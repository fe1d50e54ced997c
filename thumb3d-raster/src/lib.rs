//! Thumb3D Raster - offscreen CPU rasterizer and PNG encoder.
//!
//! A [`RenderContext`] is the offscreen drawing surface for one job; the
//! [`Renderer`] draws a composed scene into it and resolves the frame into a
//! [`RenderTarget`], which [`encode`] turns into a [`PngStream`].

pub mod context;
pub mod encoder;
pub mod error;
mod raster;
pub mod renderer;
mod shadow;

pub use context::{
    ContextOptions, RenderContext, RenderTarget, MAX_BUFFER_SAMPLES, MAX_VIEWPORT_DIMENSION,
};
pub use encoder::{encode, PngStream};
pub use error::{EncodeError, RenderError};
pub use renderer::Renderer;
