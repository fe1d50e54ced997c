mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use thumb3d::{MeshSource, SessionState, ThumbnailError, ThumbnailRequest, Thumbnailer};

#[tokio::test]
async fn test_url_mesh_is_rendered() {
    let addr = common::serve_once("200 OK", common::unit_sphere_stl()).await;

    let streams = Thumbnailer::render_url(
        format!("http://{addr}/sphere.stl"),
        vec![ThumbnailRequest::new(40, 30)],
    )
    .await
    .unwrap();

    let png = streams.into_iter().next().unwrap().into_bytes().unwrap();
    let image = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (40, 30));
    assert!(image.get_pixel(20, 15)[3] > 0);
}

#[tokio::test]
async fn test_not_found_names_the_url() {
    let addr = common::serve_once("404 Not Found", b"missing".to_vec()).await;
    let url = format!("http://{addr}/missing.stl");

    let mut thumbnailer = Thumbnailer::new(vec![ThumbnailRequest::new(8, 8)]).unwrap();
    let err = thumbnailer.load_from_url(&url).await.unwrap_err();

    match &err {
        ThumbnailError::FetchStatus { status, .. } => assert_eq!(status.as_u16(), 404),
        other => panic!("expected FetchStatus, got {other:?}"),
    }
    assert!(err.to_string().contains(&url));
    assert_eq!(thumbnailer.state(), SessionState::Failed);
}

/// Counts loads and never yields usable data
struct CountingSource(AtomicUsize);

#[async_trait]
impl MeshSource for CountingSource {
    fn describe(&self) -> String {
        "counting".to_string()
    }

    async fn load(&self) -> thumb3d::Result<Vec<u8>> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_invalid_request_never_loads() {
    let source = CountingSource(AtomicUsize::new(0));
    let requests = vec![ThumbnailRequest {
        height: Some(10),
        ..Default::default()
    }];

    let err = Thumbnailer::render(&source, requests).await.unwrap_err();
    assert!(err.to_string().contains("please specify a thumbnail width"));
    assert_eq!(source.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_requests_from_json() {
    let requests = ThumbnailRequest::parse_list(
        r#"[{"width": 24, "height": 24, "cameraAngle": [1, 1, 1], "baseOpacity": 0.5}]"#,
    )
    .unwrap();
    let addr = common::serve_once("200 OK", common::unit_sphere_stl()).await;

    let streams = Thumbnailer::render_url(format!("http://{addr}/sphere.stl"), requests)
        .await
        .unwrap();
    assert_eq!((streams[0].width(), streams[0].height()), (24, 24));
}
