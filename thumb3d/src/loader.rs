//! Mesh byte sources.
//!
//! Each source performs exactly one attempt: no retry, no timeout.
use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::{Result, ThumbnailError};

/// Something that can produce the raw bytes of an STL mesh.
#[async_trait]
pub trait MeshSource: Send + Sync {
    /// Human readable location, used in logs
    fn describe(&self) -> String;

    async fn load(&self) -> Result<Vec<u8>>;
}

/// Mesh read from the local filesystem
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MeshSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Vec<u8>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| ThumbnailError::Io {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "read mesh file");
        Ok(bytes)
    }
}

/// Mesh fetched with a single HTTP GET
#[derive(Debug, Clone)]
pub struct UrlSource {
    url: String,
    client: Client,
}

impl UrlSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, Client::new())
    }

    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    fn fetch_error(&self, source: reqwest::Error) -> ThumbnailError {
        ThumbnailError::Fetch {
            url: self.url.clone(),
            source,
        }
    }
}

#[async_trait]
impl MeshSource for UrlSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn load(&self) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.fetch_error(e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ThumbnailError::FetchStatus {
                url: self.url.clone(),
                status,
            });
        }

        let body = response.bytes().await.map_err(|e| self.fetch_error(e))?;
        debug!(url = %self.url, bytes = body.len(), "fetched mesh");
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_source_reads_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"solid empty\nendsolid empty\n").unwrap();

        let source = FileSource::new(file.path());
        assert_eq!(source.load().await.unwrap(), b"solid empty\nendsolid empty\n");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.stl");

        match FileSource::new(&path).load().await {
            Err(ThumbnailError::Io { path: got, .. }) => assert_eq!(got, path),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_url_names_the_url() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = format!("http://127.0.0.1:{port}/part.stl");

        let err = UrlSource::new(&url).load().await.unwrap_err();
        assert!(matches!(err, ThumbnailError::Fetch { .. }));
        assert!(err.to_string().contains(&url));
    }
}
