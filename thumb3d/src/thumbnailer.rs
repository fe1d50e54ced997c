use std::path::PathBuf;
use std::sync::Arc;

use futures::future::try_join_all;
use reqwest::Client;
use thumb3d_core::{compose, frame, load_geometry, BaseScene, ComposedScene, Geometry};
use thumb3d_raster::{encode, ContextOptions, PngStream, RenderContext, RenderTarget, Renderer};
use tokio::task::spawn_blocking;
use tracing::{debug, info, info_span, warn};

use crate::error::{Result, ThumbnailError};
use crate::loader::{FileSource, MeshSource, UrlSource};
use crate::request::{ThumbnailRequest, ThumbnailSpec};

/// Lifecycle of a [`Thumbnailer`]. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Constructed,
    Loading,
    Loaded,
    Processing,
    Completed,
    Failed,
}

/// Session progress together with the data each step owns
#[derive(Debug)]
enum Stage {
    Constructed,
    Loading,
    Loaded(Arc<[u8]>),
    Processing,
    Completed,
    Failed,
}

impl Stage {
    fn state(&self) -> SessionState {
        match self {
            Stage::Constructed => SessionState::Constructed,
            Stage::Loading => SessionState::Loading,
            Stage::Loaded(_) => SessionState::Loaded,
            Stage::Processing => SessionState::Processing,
            Stage::Completed => SessionState::Completed,
            Stage::Failed => SessionState::Failed,
        }
    }
}

/// `ThumbnailerBuilder` holds the settings shared by every job of a session.
#[derive(Debug, Clone)]
pub struct ThumbnailerBuilder {
    scene: BaseScene,
    antialias: bool,
    client: Option<Client>,
}

impl Default for ThumbnailerBuilder {
    fn default() -> Self {
        Self {
            scene: BaseScene::builtin(),
            antialias: true,
            client: None,
        }
    }
}

impl ThumbnailerBuilder {
    /// Creates a new `ThumbnailerBuilder` with default values:
    /// - `scene`: the bundled base scene
    /// - `antialias`: true
    /// - `client`: a default `reqwest::Client`, created on build
    pub fn new() -> Self {
        Default::default()
    }

    /// Base scene every job is composed from
    pub fn scene(mut self, scene: BaseScene) -> Self {
        self.scene = scene;
        self
    }

    /// Render with 2x2 supersampling
    pub fn antialias(mut self, antialias: bool) -> Self {
        self.antialias = antialias;
        self
    }

    /// HTTP client used by [`Thumbnailer::load_from_url`]
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Validate `requests` and create a session. Nothing is loaded or
    /// allocated when a request is invalid.
    pub fn build<I>(self, requests: I) -> Result<Thumbnailer>
    where
        I: IntoIterator<Item = ThumbnailRequest>,
    {
        let jobs = requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| {
                request
                    .validate()
                    .map_err(|reason| ThumbnailError::Validation(format!("thumbnail {index}: {reason}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Thumbnailer {
            jobs,
            scene: self.scene,
            options: ContextOptions {
                antialias: self.antialias,
                preserve_drawing_buffer: false,
            },
            client: self.client.unwrap_or_default(),
            stage: Stage::Constructed,
        })
    }
}

/// One thumbnailing session: a single mesh rendered once per validated job.
///
/// The mesh is loaded exactly once, parsed exactly once, and the resulting
/// geometry is shared read-only by every job. Each job gets its own scene,
/// camera and render context. Results come back in request order and the
/// first failing job fails the whole session.
#[derive(Debug)]
pub struct Thumbnailer {
    jobs: Vec<ThumbnailSpec>,
    scene: BaseScene,
    options: ContextOptions,
    client: Client,
    stage: Stage,
}

impl Thumbnailer {
    /// Session with the default settings
    pub fn new<I>(requests: I) -> Result<Self>
    where
        I: IntoIterator<Item = ThumbnailRequest>,
    {
        ThumbnailerBuilder::new().build(requests)
    }

    pub fn builder() -> ThumbnailerBuilder {
        ThumbnailerBuilder::new()
    }

    pub fn jobs(&self) -> &[ThumbnailSpec] {
        &self.jobs
    }

    pub fn state(&self) -> SessionState {
        self.stage.state()
    }

    /// Load, then render every job of `requests` from a local STL file.
    pub async fn render_file<I>(path: impl Into<PathBuf>, requests: I) -> Result<Vec<PngStream>>
    where
        I: IntoIterator<Item = ThumbnailRequest>,
    {
        Self::render(&FileSource::new(path), requests).await
    }

    /// Load, then render every job of `requests` from an STL served at `url`.
    pub async fn render_url<I>(url: impl Into<String>, requests: I) -> Result<Vec<PngStream>>
    where
        I: IntoIterator<Item = ThumbnailRequest>,
    {
        Self::render(&UrlSource::new(url), requests).await
    }

    pub async fn render<S, I>(source: &S, requests: I) -> Result<Vec<PngStream>>
    where
        S: MeshSource + ?Sized,
        I: IntoIterator<Item = ThumbnailRequest>,
    {
        let mut thumbnailer = Self::new(requests)?;
        thumbnailer.load(source).await?;
        thumbnailer.process_jobs().await
    }

    /// Await the mesh bytes from `source` and keep them for processing.
    pub async fn load<S>(&mut self, source: &S) -> Result<()>
    where
        S: MeshSource + ?Sized,
    {
        if !matches!(self.stage, Stage::Constructed) {
            return Err(ThumbnailError::InvalidState {
                operation: "load",
                state: self.state(),
            });
        }
        self.stage = Stage::Loading;
        let location = source.describe();
        info!(source = %location, jobs = self.jobs.len(), "loading mesh");

        match source.load().await {
            Ok(bytes) => {
                self.stage = Stage::Loaded(Arc::from(bytes));
                Ok(())
            }
            Err(e) => {
                warn!(source = %location, error = %e, "mesh load failed");
                self.stage = Stage::Failed;
                Err(e)
            }
        }
    }

    pub async fn load_from_file(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.load(&FileSource::new(path)).await
    }

    /// Fetch through the session's HTTP client
    pub async fn load_from_url(&mut self, url: impl Into<String>) -> Result<()> {
        let source = UrlSource::with_client(url, self.client.clone());
        self.load(&source).await
    }

    /// Render every job concurrently and join the results in request order.
    pub async fn process_jobs(&mut self) -> Result<Vec<PngStream>> {
        let mesh = match std::mem::replace(&mut self.stage, Stage::Processing) {
            Stage::Loaded(mesh) => mesh,
            other => {
                let state = other.state();
                self.stage = other;
                return Err(ThumbnailError::InvalidState {
                    operation: "process jobs",
                    state,
                });
            }
        };

        match self.run_jobs(mesh).await {
            Ok(streams) => {
                info!(thumbnails = streams.len(), "session completed");
                self.stage = Stage::Completed;
                Ok(streams)
            }
            Err(e) => {
                warn!(error = %e, "session failed");
                self.stage = Stage::Failed;
                Err(e)
            }
        }
    }

    async fn run_jobs(&self, mesh: Arc<[u8]>) -> Result<Vec<PngStream>> {
        let geometry = spawn_blocking(move || load_geometry(&mesh)).await??;
        let geometry = Arc::new(geometry);
        info!(
            triangles = geometry.triangle_count(),
            radius = geometry.bounding_sphere().radius,
            "normalized mesh geometry"
        );

        let jobs = self.jobs.iter().copied().enumerate().map(|(index, spec)| {
            let scene = self.scene.clone();
            let geometry = Arc::clone(&geometry);
            let options = self.options;
            let span = info_span!("thumbnail", index, width = spec.width(), height = spec.height());

            async move {
                spawn_blocking(move || span.in_scope(|| render_job(&scene, geometry, &spec, options)))
                    .await?
            }
        });

        try_join_all(jobs).await
    }
}

/// Compose, frame, render and wrap one thumbnail. The render context and
/// target live only for the duration of this call.
fn render_job(
    base: &BaseScene,
    geometry: Arc<Geometry>,
    spec: &ThumbnailSpec,
    options: ContextOptions,
) -> Result<PngStream> {
    let (width, height) = (spec.width(), spec.height());
    let mut renderer = Renderer::new(RenderContext::new(width, height, options)?);

    let ComposedScene {
        project,
        mut scene,
        mut camera,
    } = compose(base, Arc::clone(&geometry))?;
    renderer.configure(project);
    if !scene.apply_base_material(spec.base_color(), spec.base_opacity()) {
        debug!("no part material to apply the base color to");
    }

    renderer.set_size(width, height)?;
    renderer.set_clear_color(spec.background_color(), 0.0);

    camera.aspect = width as f32 / height as f32;
    let distance = frame(&mut camera, &geometry, spec.camera_angle())?;
    debug!(distance, "framed camera");

    let mut target = RenderTarget::new(width, height)?;
    renderer.render(&scene, &camera, &mut target)?;
    drop(renderer);

    let stream = encode(target)?;
    debug!("rendered thumbnail");
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use thumb3d_core::stl::write_binary_stl;
    use thumb3d_core::{Mesh, ParseError, Triangle, Vertex};

    struct MemorySource {
        bytes: Vec<u8>,
        calls: AtomicUsize,
    }

    impl MemorySource {
        fn new(bytes: Vec<u8>) -> Self {
            Self {
                bytes,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MeshSource for MemorySource {
        fn describe(&self) -> String {
            "memory".to_string()
        }

        async fn load(&self) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.bytes.clone())
        }
    }

    fn cube_source() -> MemorySource {
        MemorySource::new(write_binary_stl(&Mesh::cube(10.0)))
    }

    #[test]
    fn test_invalid_request_rejected_at_construction() {
        let requests = vec![
            ThumbnailRequest::new(10, 10),
            ThumbnailRequest {
                width: Some(10),
                ..Default::default()
            },
        ];
        let err = Thumbnailer::new(requests).unwrap_err();
        assert!(matches!(err, ThumbnailError::Validation(_)));
        assert!(err.to_string().contains("thumbnail 1"));
    }

    #[test]
    fn test_builder_keeps_job_order() {
        let thumbnailer = Thumbnailer::builder()
            .antialias(false)
            .build(vec![ThumbnailRequest::new(30, 20), ThumbnailRequest::new(5, 5)])
            .unwrap();
        assert_eq!(thumbnailer.state(), SessionState::Constructed);
        assert_eq!(thumbnailer.jobs()[0].width(), 30);
        assert_eq!(thumbnailer.jobs()[1].width(), 5);
    }

    #[tokio::test]
    async fn test_session_runs_to_completion() {
        let source = cube_source();
        let mut thumbnailer = Thumbnailer::new(vec![ThumbnailRequest::new(16, 12)]).unwrap();

        thumbnailer.load(&source).await.unwrap();
        assert_eq!(thumbnailer.state(), SessionState::Loaded);

        let streams = thumbnailer.process_jobs().await.unwrap();
        assert_eq!(thumbnailer.state(), SessionState::Completed);
        assert_eq!((streams[0].width(), streams[0].height()), (16, 12));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_terminal_session_refuses_further_work() {
        let source = cube_source();
        let mut thumbnailer = Thumbnailer::new(vec![ThumbnailRequest::new(4, 4)]).unwrap();
        thumbnailer.load(&source).await.unwrap();
        thumbnailer.process_jobs().await.unwrap();

        assert!(matches!(
            thumbnailer.load(&source).await,
            Err(ThumbnailError::InvalidState { state: SessionState::Completed, .. })
        ));
        assert!(matches!(
            thumbnailer.process_jobs().await,
            Err(ThumbnailError::InvalidState { .. })
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_processing_requires_a_loaded_mesh() {
        let mut thumbnailer = Thumbnailer::new(vec![ThumbnailRequest::new(4, 4)]).unwrap();
        assert!(matches!(
            thumbnailer.process_jobs().await,
            Err(ThumbnailError::InvalidState { state: SessionState::Constructed, .. })
        ));
    }

    #[tokio::test]
    async fn test_rejected_processing_keeps_the_session_usable() {
        let source = cube_source();
        let mut thumbnailer = Thumbnailer::new(vec![ThumbnailRequest::new(4, 4)]).unwrap();
        assert!(thumbnailer.process_jobs().await.is_err());
        assert_eq!(thumbnailer.state(), SessionState::Constructed);

        thumbnailer.load(&source).await.unwrap();
        assert_eq!(thumbnailer.state(), SessionState::Loaded);
        assert_eq!(thumbnailer.process_jobs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_point_sized_mesh_is_a_parse_error() {
        let v = Vertex::new(1.0, 1.0, 1.0, 0.0, 0.0, 1.0);
        let mut mesh = Mesh::new();
        mesh.add_triangle(Triangle::new(v, v, v));
        let source = MemorySource::new(write_binary_stl(&mesh));

        let err = Thumbnailer::render(&source, vec![ThumbnailRequest::new(4, 4)])
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::Parse(ParseError::Degenerate)));
    }

    #[tokio::test]
    async fn test_parse_failure_fails_the_session() {
        let source = MemorySource::new(vec![0u8; 40]);
        let mut thumbnailer = Thumbnailer::new(vec![ThumbnailRequest::new(4, 4)]).unwrap();
        thumbnailer.load(&source).await.unwrap();

        let err = thumbnailer.process_jobs().await.unwrap_err();
        assert!(matches!(err, ThumbnailError::Parse(_)));
        assert_eq!(thumbnailer.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_one_failing_job_fails_all() {
        let requests = vec![ThumbnailRequest::new(8, 8), ThumbnailRequest::new(9000, 8)];
        let err = Thumbnailer::render(&cube_source(), requests).await.unwrap_err();
        assert!(matches!(err, ThumbnailError::Render(_)));
    }
}
