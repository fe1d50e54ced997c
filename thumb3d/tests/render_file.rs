mod common;

use std::io::{Read, Write};

use thumb3d::{BaseScene, ThumbnailError, ThumbnailRequest, Thumbnailer};
use thumb3d_core::stl::write_binary_stl;
use thumb3d_core::Mesh;
use tracing_test::traced_test;

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

fn sphere_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".stl").tempfile().unwrap();
    file.write_all(&common::unit_sphere_stl()).unwrap();
    file
}

fn decode(stream: thumb3d::PngStream) -> image::RgbaImage {
    let png = stream.into_bytes().unwrap();
    image::load_from_memory(&png).unwrap().to_rgba8()
}

#[tokio::test]
async fn test_sphere_thumbnail_covers_center() {
    let file = sphere_file();
    let streams = Thumbnailer::render_file(file.path(), vec![ThumbnailRequest::new(100, 100)])
        .await
        .unwrap();
    assert_eq!(streams.len(), 1);

    let image = decode(streams.into_iter().next().unwrap());
    assert_eq!(image.dimensions(), (100, 100));
    assert!(image.get_pixel(50, 50)[3] > 0, "sphere should cover the center");
    assert_eq!(image.get_pixel(0, 0)[3], 0, "background should stay transparent");
}

#[tokio::test]
#[traced_test]
async fn test_jobs_keep_request_order_and_share_geometry() {
    let file = sphere_file();
    let requests = vec![
        ThumbnailRequest::new(50, 50),
        ThumbnailRequest::new(200, 200).camera_angle(0.0, 0.0, 1.0),
        ThumbnailRequest::new(64, 32).base_color(0xff0000).base_opacity(1.0),
    ];

    let streams = Thumbnailer::render_file(file.path(), requests).await.unwrap();
    let sizes: Vec<_> = streams.iter().map(|s| (s.width(), s.height())).collect();
    assert_eq!(sizes, vec![(50, 50), (200, 200), (64, 32)]);

    let opaque = decode(streams.into_iter().nth(2).unwrap());
    let center = opaque.get_pixel(32, 16);
    assert_eq!(center[3], 255);
    assert!(center[0] > center[1] && center[0] > center[2]);

    logs_assert(|lines: &[&str]| {
        match lines
            .iter()
            .filter(|line| line.contains("normalized mesh geometry"))
            .count()
        {
            1 => Ok(()),
            n => Err(format!("geometry normalized {n} times")),
        }
    });
    assert!(logs_contain("framed camera"));
}

#[tokio::test]
async fn test_stream_starts_with_png_signature() {
    let file = sphere_file();
    let mut streams = Thumbnailer::render_file(file.path(), vec![ThumbnailRequest::new(8, 8)])
        .await
        .unwrap();

    let mut head = [0u8; 8];
    streams[0].read_exact(&mut head).unwrap();
    assert_eq!(head, PNG_MAGIC);
}

#[tokio::test]
async fn test_missing_file_rejects() {
    let dir = tempfile::tempdir().unwrap();
    let err = Thumbnailer::render_file(dir.path().join("none.stl"), vec![ThumbnailRequest::new(8, 8)])
        .await
        .unwrap_err();
    assert!(matches!(err, ThumbnailError::Io { .. }));
}

#[tokio::test]
async fn test_malformed_mesh_rejects() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"solid broken\nfacet normal 0 0 1\nouter loop\nvertex 0 0\n")
        .unwrap();

    let err = Thumbnailer::render_file(file.path(), vec![ThumbnailRequest::new(8, 8)])
        .await
        .unwrap_err();
    assert!(matches!(err, ThumbnailError::Parse(_)));
}

#[tokio::test]
#[traced_test]
async fn test_scene_without_mesh_slot_renders_empty_frame() {
    let scene = BaseScene::from_json(
        r#"{
            "camera": {"fov": 45},
            "scene": {"objects": [{"type": "ambientLight", "color": 16777215}]}
        }"#,
    )
    .unwrap();

    let file = sphere_file();
    let mut thumbnailer = Thumbnailer::builder()
        .scene(scene)
        .build(vec![ThumbnailRequest::new(20, 20)])
        .unwrap();
    thumbnailer.load_from_file(file.path()).await.unwrap();
    let streams = thumbnailer.process_jobs().await.unwrap();

    let image = decode(streams.into_iter().next().unwrap());
    assert!(image.pixels().all(|p| p[3] == 0));
    assert!(logs_contain("scene declares no mesh slot"));
}

const DIRECTIONAL_SCENE: &str = r#"{
    "camera": {"fov": 45, "near": 0.1, "far": 10000},
    "scene": {
        "meshSlot": "part",
        "objects": [
            {"type": "mesh", "name": "part",
             "material": {"type": "phong", "color": 12632256, "side": "double"}},
            {"type": "ambientLight", "color": 4210752},
            {"type": "directionalLight", "position": [3, 6, 5], "intensity": 0.8}
        ]
    }
}"#;

async fn render_cube(size: f32) -> image::RgbaImage {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&write_binary_stl(&Mesh::cube(size))).unwrap();

    let mut thumbnailer = Thumbnailer::builder()
        .scene(BaseScene::from_json(DIRECTIONAL_SCENE).unwrap())
        .build(vec![ThumbnailRequest::new(64, 64)
            .camera_angle(1.0, 0.7, 3.0)
            .base_opacity(1.0)])
        .unwrap();
    thumbnailer.load_from_file(file.path()).await.unwrap();
    decode(thumbnailer.process_jobs().await.unwrap().remove(0))
}

#[tokio::test]
async fn test_thumbnail_does_not_depend_on_part_scale() {
    let reference = render_cube(1.0).await;
    let scaled = render_cube(1.0e5).await;

    let differing = reference
        .pixels()
        .zip(scaled.pixels())
        .filter(|(a, b)| a.0.iter().zip(b.0.iter()).any(|(x, y)| x.abs_diff(*y) > 8))
        .count();
    assert!(differing <= 16, "{differing} of 4096 pixels changed with scale");
}
