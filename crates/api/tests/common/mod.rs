// All functions in this module are shared test helpers. Not every test binary
// uses every helper, so we suppress dead_code warnings at the item level.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request};
use axum::Router;
use http_body_util::BodyExt;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};
use tower::ServiceExt;

use photogate_api::config::ServerConfig;
use photogate_api::pipeline::Pipeline;
use photogate_api::router::build_app_router;
use photogate_api::scheduler::PipelineScheduler;
use photogate_api::state::AppState;
use photogate_core::AnalyzerConfig;
use photogate_db::models::{ImageRecord, ImageStatus};
use photogate_db::{MemoryRecordStore, RecordStore};
use photogate_storage::{BlobStore, LocalBlobStore, StorageConfig};

/// A fully wired application over the in-memory record store and a
/// tempdir-backed local blob store.
pub struct TestApp {
    pub router: Router,
    pub records: Arc<MemoryRecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub scheduler: Arc<PipelineScheduler>,
    // Keeps the blob directory alive for the duration of the test.
    _tmp: tempfile::TempDir,
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(storage: StorageConfig, analyzers: AnalyzerConfig) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        app_url: "http://localhost:3000".to_string(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        worker_count: 2,
        signed_url_ttl_secs: 3600,
        development: false,
        database_url: None,
        storage,
        analyzers,
    }
}

/// Build the app with default analyzer tunables.
pub async fn build_test_app() -> TestApp {
    build_test_app_with(AnalyzerConfig::default()).await
}

/// Build the app with custom analyzer tunables.
pub async fn build_test_app_with(analyzers: AnalyzerConfig) -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let records = Arc::new(MemoryRecordStore::new());
    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(
        tmp.path().to_path_buf(),
        "http://localhost:3000".into(),
    ));

    let pipeline = Arc::new(Pipeline::new(
        Arc::clone(&records) as Arc<dyn RecordStore>,
        Arc::clone(&blobs),
        Arc::new(analyzers.clone()),
        false,
    ));
    let scheduler = PipelineScheduler::start(pipeline, 2);

    let config = test_config(
        StorageConfig::Local {
            root: tmp.path().to_path_buf(),
            public_base_url: "http://localhost:3000".into(),
        },
        analyzers,
    );

    let state = AppState {
        records: Arc::clone(&records) as Arc<dyn RecordStore>,
        blobs: Arc::clone(&blobs),
        scheduler: Arc::clone(&scheduler),
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        records,
        blobs,
        scheduler,
        _tmp: tmp,
    }
}

// ---------------------------------------------------------------------------
// Shared HTTP test helpers
// ---------------------------------------------------------------------------

/// Collect the response body into a `serde_json::Value`.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// GET from the given URI.
pub async fn get(app: &TestApp, uri: &str) -> axum::response::Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

/// DELETE the given URI.
pub async fn delete(app: &TestApp, uri: &str) -> axum::response::Response {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

/// POST with an empty body.
pub async fn post_empty(app: &TestApp, uri: &str) -> axum::response::Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

const BOUNDARY: &str = "photogate-test-boundary";

/// POST a multipart upload of `(filename, bytes)` pairs to `/api/images`.
pub async fn upload(app: &TestApp, files: &[(&str, Vec<u8>)]) -> axum::response::Response {
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; \
                 name=\"images\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/images")
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

/// Poll the record store until the background pipeline reaches a terminal
/// status for the given id.
pub async fn wait_for_terminal(app: &TestApp, id: uuid::Uuid) -> ImageRecord {
    for _ in 0..1200 {
        let record = app
            .records
            .get(id)
            .await
            .unwrap()
            .expect("record disappeared while waiting");
        if matches!(record.status, ImageStatus::Processed | ImageStatus::Failed) {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("pipeline did not reach a terminal status for {id}");
}

// ---------------------------------------------------------------------------
// Deterministic test images
// ---------------------------------------------------------------------------

/// Tiny deterministic PRNG so test images are reproducible.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(2862933555777941757).wrapping_add(3037000493))
    }

    pub fn next_u8(&mut self) -> u8 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u8
    }
}

fn encode_jpeg(img: RgbImage, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
        .unwrap();
    buf
}

/// A sharp, well-exposed "portrait": horizontal brightness ramp with
/// heavy grain. Passes every analyzer at default tunables (the grain keeps
/// the file large and the image sharp; the ramp keeps the cell grid calm).
pub fn textured_jpeg(width: u32, height: u32, seed: u64) -> Vec<u8> {
    let mut rng = Lcg::new(seed);
    let mut img = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let ramp = (x * 128 / width.max(1)) as i32;
            let grain = i32::from(rng.next_u8()) / 2 - 64;
            let v = (ramp + 64 + grain).clamp(0, 255) as u8;
            img.put_pixel(x, y, Rgb([v, v, v]));
        }
    }
    encode_jpeg(img, 90)
}

/// Same texture with the ramp along y, so its fingerprint differs from
/// [`textured_jpeg`].
pub fn textured_vertical_jpeg(width: u32, height: u32, seed: u64) -> Vec<u8> {
    let mut rng = Lcg::new(seed);
    let mut img = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let ramp = (y * 128 / height.max(1)) as i32;
            let grain = i32::from(rng.next_u8()) / 2 - 64;
            let v = (ramp + 64 + grain).clamp(0, 255) as u8;
            img.put_pixel(x, y, Rgb([v, v, v]));
        }
    }
    encode_jpeg(img, 90)
}

/// A flat single-color frame; compresses to well under the minimum file
/// size at any resolution.
pub fn flat_jpeg(width: u32, height: u32, value: u8) -> Vec<u8> {
    encode_jpeg(RgbImage::from_pixel(width, height, Rgb([value, value, value])), 50)
}

/// Full-frame harsh black/white grain with no structure at all; used where
/// per-channel color variance must stay high even after JPEG quantization
/// (defeats the portrait override).
pub fn noise_jpeg(width: u32, height: u32, seed: u64, quality: u8) -> Vec<u8> {
    let mut rng = Lcg::new(seed);
    let mut img = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let v = if rng.next_u8() >= 128 { 255 } else { 0 };
            img.put_pixel(x, y, Rgb([v, v, v]));
        }
    }
    encode_jpeg(img, quality)
}

/// Heavily Gaussian-blurred grain: every local-detail test reads blurry.
pub fn blurred_jpeg(width: u32, height: u32, seed: u64) -> Vec<u8> {
    let mut rng = Lcg::new(seed);
    let mut img = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let v = rng.next_u8();
            img.put_pixel(x, y, Rgb([v, v, v]));
        }
    }
    let blurred = image::imageops::blur(&img, 6.0);
    encode_jpeg(blurred, 90)
}
