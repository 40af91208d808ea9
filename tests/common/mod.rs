#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use image::{ImageFormat, RgbImage};
use person_detector::{
    adapters::http::{router, state::HttpState},
    application::{
        lifecycle::{bootstrap, AppContext},
        ports::{InferenceEngine, ModelCatalogPort, ModelLoaderPort},
    },
    domain::{
        detection::Detection,
        errors::{DomainError, DomainResult},
        model::InferenceParams,
        settings::AppConfig,
    },
};
use serde_json::Value;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

pub const BOUNDARY: &str = "person-detector-test-boundary";

/// Qué hace el motor falso en cada inferencia.
#[derive(Clone)]
pub enum Script {
    Detections(Vec<Detection>),
    RuntimeFailure(String),
    /// Entra en pánico en la primera inferencia y después devuelve estas detecciones.
    PanicsFirst(Vec<Detection>),
}

pub struct FakeEngine {
    script: Script,
    calls: usize,
}

impl InferenceEngine for FakeEngine {
    fn infer(&mut self, _image: &RgbImage, _params: &InferenceParams) -> DomainResult<Vec<Detection>> {
        self.calls += 1;
        match &self.script {
            Script::Detections(dets) => Ok(dets.clone()),
            Script::RuntimeFailure(msg) => Err(DomainError::InferenceRuntime(msg.clone())),
            Script::PanicsFirst(_) if self.calls == 1 => panic!("engine crashed mid-inference"),
            Script::PanicsFirst(dets) => Ok(dets.clone()),
        }
    }
}

pub struct FakeLoader {
    pub loads: AtomicUsize,
    script: Option<Script>,
}

impl FakeLoader {
    pub fn with(script: Script) -> Arc<Self> {
        Arc::new(Self { loads: AtomicUsize::new(0), script: Some(script) })
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self { loads: AtomicUsize::new(0), script: None })
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelLoaderPort for FakeLoader {
    fn load(&self, _path: &Path, _params: &InferenceParams) -> DomainResult<Box<dyn InferenceEngine>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Some(script) => Ok(Box::new(FakeEngine { script: script.clone(), calls: 0 })),
            None => Err(DomainError::ModelLoad("corrupt weights".into())),
        }
    }
}

pub struct PresentCatalog;

#[async_trait]
impl ModelCatalogPort for PresentCatalog {
    async fn ensure_available(&self, _model_path: &Path) -> DomainResult<()> {
        Ok(())
    }
}

pub fn detection(class_id: usize, score: f32) -> Detection {
    Detection { x1: 10.0, y1: 20.0, x2: 110.0, y2: 220.0, score, class_id }
}

pub fn app_for(ctx: Arc<AppContext>) -> Router {
    router(HttpState::new(ctx), AppConfig::default().server.max_upload_bytes)
}

/// Contexto ya en Ready con un motor falso.
pub async fn ready_app(script: Script) -> (Router, Arc<AppContext>, Arc<FakeLoader>) {
    let ctx = Arc::new(AppContext::new());
    let loader = FakeLoader::with(script);
    bootstrap(&ctx, &AppConfig::default(), loader.clone(), Arc::new(PresentCatalog))
        .await
        .expect("bootstrap");
    (app_for(ctx.clone()), ctx, loader)
}

pub fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(32, 24, image::Rgb([120, 80, 40]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub fn multipart_request(field: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/detect")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}
