//! Thumb3D - render PNG thumbnails of STL meshes.
//!
//! A [`Thumbnailer`] session validates its requests up front, loads one mesh
//! from a [`MeshSource`], then renders every requested thumbnail
//! concurrently. The results come back as [`PngStream`]s in request order.
//!
//! ```no_run
//! use thumb3d::{Thumbnailer, ThumbnailRequest};
//!
//! # async fn run() -> thumb3d::Result<()> {
//! let streams = Thumbnailer::render_file(
//!     "bracket.stl",
//!     vec![ThumbnailRequest::new(256, 256), ThumbnailRequest::new(64, 64)],
//! )
//! .await?;
//! assert_eq!(streams.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;
pub mod request;
pub mod thumbnailer;

pub use error::{Result, ThumbnailError};
pub use loader::{FileSource, MeshSource, UrlSource};
pub use request::{ThumbnailRequest, ThumbnailSpec};
pub use thumb3d_core::BaseScene;
pub use thumb3d_raster::PngStream;
pub use thumbnailer::{SessionState, Thumbnailer, ThumbnailerBuilder};
