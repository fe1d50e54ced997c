use std::{env, io, net::SocketAddr, sync::Arc};

use axum::{
    body::StreamBody,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::{future, stream, Stream, StreamExt};
use serde::Deserialize;
use thumb3d::{BaseScene, PngStream, ThumbnailError, ThumbnailRequest, Thumbnailer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_WIDTH: u32 = 1920;
const DEFAULT_HEIGHT: u32 = 1200;
/// Bytes per response body chunk
const CHUNK_SIZE: usize = 64 * 1024;

struct AppState {
    scene: BaseScene,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ThumbnailQuery {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = env::var("PORT")
        .map(|port| port.parse::<u16>().unwrap_or(DEFAULT_PORT))
        .unwrap_or(DEFAULT_PORT);

    let scene = match env::var("THUMB3D_SCENE") {
        Ok(path) => {
            info!(path = %path, "loading base scene");
            BaseScene::from_path(&path)?
        }
        Err(_) => BaseScene::builtin(),
    };

    let state = Arc::new(AppState {
        scene,
        client: reqwest::Client::new(),
    });

    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/thumbnailer", get(thumbnail))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on http://localhost:{}", port);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn thumbnail(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ThumbnailQuery>,
) -> Response {
    let url = query.url.clone();
    match render(&state, query).await {
        Ok((first, png)) => (
            [(header::CONTENT_TYPE, "image/png")],
            StreamBody::new(png_chunks(first, png, CHUNK_SIZE)),
        )
            .into_response(),
        Err(err) => {
            error!(url = %url, error = %err, "thumbnailing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error thumbnailing: {err}"),
            )
                .into_response()
        }
    }
}

/// Render the single thumbnail a query asks for. Returns the first PNG chunk
/// together with the stream holding the rest.
async fn render(state: &AppState, query: ThumbnailQuery) -> thumb3d::Result<(Vec<u8>, PngStream)> {
    let request = ThumbnailRequest::new(
        query.width.unwrap_or(DEFAULT_WIDTH),
        query.height.unwrap_or(DEFAULT_HEIGHT),
    );

    let mut thumbnailer = Thumbnailer::builder()
        .scene(state.scene.clone())
        .client(state.client.clone())
        .build([request])?;
    thumbnailer.load_from_url(query.url).await?;

    let mut png = thumbnailer
        .process_jobs()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ThumbnailError::Validation("no thumbnail was requested".to_string()))?;

    // PNG compression happens on first read, so encoding errors surface here
    let chunk = tokio::task::spawn_blocking(move || {
        let first = png.next_chunk(CHUNK_SIZE)?;
        Ok::<_, ThumbnailError>((first, png))
    })
    .await??;
    Ok(chunk)
}

/// Body stream yielding `first`, then the rest of `png` in `chunk_size` pieces.
/// The stream is already encoded, so the remaining reads only copy memory.
fn png_chunks(
    first: Vec<u8>,
    png: PngStream,
    chunk_size: usize,
) -> impl Stream<Item = io::Result<Vec<u8>>> + Send + 'static {
    let rest = stream::unfold(Some(png), move |png| async move {
        let mut png = png?;
        match png.next_chunk(chunk_size) {
            Ok(chunk) if chunk.is_empty() => None,
            Ok(chunk) => Some((Ok(chunk), Some(png))),
            Err(e) => Some((Err(io::Error::new(io::ErrorKind::Other, e)), None)),
        }
    });
    stream::once(future::ready(Ok(first))).chain(rest)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use thumb3d_raster::{encode, RenderTarget};

    #[tokio::test]
    async fn test_png_chunks_reassemble_the_image() {
        let whole = encode(RenderTarget::new(32, 32).unwrap()).unwrap().into_bytes().unwrap();

        let mut png = encode(RenderTarget::new(32, 32).unwrap()).unwrap();
        let first = png.next_chunk(16).unwrap();
        let chunks: Vec<Vec<u8>> = png_chunks(first, png, 16)
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;

        assert!(chunks.len() > 2);
        assert!(chunks.iter().all(|chunk| !chunk.is_empty() && chunk.len() <= 16));
        assert_eq!(chunks.concat(), whole);
    }
}
