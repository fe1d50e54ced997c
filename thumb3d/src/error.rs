use std::path::PathBuf;

use thiserror::Error;
use thumb3d_core::{FrameError, ParseError, SceneError};
use thumb3d_raster::{EncodeError, RenderError};
use tokio::task::JoinError;

use crate::thumbnailer::SessionState;

pub type Result<T, E = ThumbnailError> = std::result::Result<T, E>;

/// Error type for a thumbnailing session.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    /// A thumbnail request is missing a field or carries an invalid value.
    #[error("invalid thumbnail request: {0}")]
    Validation(String),

    /// The mesh file could not be read.
    #[error("unable to load {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The mesh URL could not be fetched.
    #[error("unable to retrieve {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The mesh URL answered with something other than 200.
    #[error("unable to retrieve {url}: server answered {status}")]
    FetchStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("unable to parse mesh: {0}")]
    Parse(#[from] ParseError),

    #[error("unable to compose scene: {0}")]
    Scene(#[from] SceneError),

    #[error("unable to frame camera: {0}")]
    Frame(#[from] FrameError),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("background task failed: {0}")]
    BackgroundTaskFailed(#[from] JoinError),

    /// An operation was called out of order, or on a finished session.
    #[error("cannot {operation} while the session is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}
