mod common;

use axum::http::StatusCode;
use common::*;
use person_detector::{
    adapters::config::load_config,
    application::lifecycle::{bootstrap, bootstrap_unless_shutdown, AppContext},
    domain::{errors::DomainError, lifecycle::ServiceState, settings::AppConfig},
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn before_ready_only_liveness_answers() {
    let ctx = Arc::new(AppContext::new());
    let app = app_for(ctx.clone());

    assert_eq!(send(&app, get("/livez")).await.status(), StatusCode::OK);
    assert_eq!(send(&app, get("/readyz")).await.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = send(&app, multipart_request("file", "a.png", &png_bytes())).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["detail"], "Service not ready");
}

#[tokio::test]
async fn not_ready_wins_over_a_malformed_request() {
    let ctx = Arc::new(AppContext::new());
    let app = app_for(ctx);
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/detect")
        .body(axum::body::Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn model_load_failure_never_reaches_ready() {
    let ctx = Arc::new(AppContext::new());
    let loader = FakeLoader::broken();

    let err = bootstrap(&ctx, &AppConfig::default(), loader.clone(), Arc::new(PresentCatalog))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, DomainError::ModelLoad(_)));
    assert_eq!(ctx.state(), ServiceState::Initializing);
    assert_eq!(loader.load_count(), 1);

    let app = app_for(ctx);
    assert_eq!(send(&app, get("/readyz")).await.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(send(&app, get("/livez")).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_model_size_fails_bootstrap_without_loading() {
    let ctx = Arc::new(AppContext::new());
    let loader = FakeLoader::with(Script::Detections(vec![]));
    let mut config = AppConfig::default();
    config.model.size = "enormous".into();

    let err = bootstrap(&ctx, &config, loader.clone(), Arc::new(PresentCatalog)).await.err().unwrap();
    assert!(matches!(err, DomainError::ConfigInvalid(_)));
    assert_eq!(loader.load_count(), 0);
    assert_eq!(ctx.state(), ServiceState::Initializing);
}

#[test]
fn bad_configuration_documents_fail_to_load() {
    let mut empty = tempfile::NamedTempFile::new().unwrap();
    writeln!(empty).unwrap();
    assert!(matches!(load_config(Some(empty.path())), Err(DomainError::ConfigInvalid(_))));

    let mut broken = tempfile::NamedTempFile::new().unwrap();
    writeln!(broken, "inference: {{conf_threshold: [").unwrap();
    assert!(matches!(load_config(Some(broken.path())), Err(DomainError::ConfigInvalid(_))));

    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_config(Some(&dir.path().join("missing.yaml"))),
        Err(DomainError::ConfigNotFound(_))
    ));
}

#[tokio::test]
async fn bootstrap_loads_the_model_once_and_opens_the_gate() {
    let (app, ctx, loader) = ready_app(Script::Detections(vec![detection(0, 0.7)])).await;
    assert_eq!(ctx.state(), ServiceState::Ready);

    for _ in 0..3 {
        let response = send(&app, multipart_request("file", "x.png", &png_bytes())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(loader.load_count(), 1);
}

#[tokio::test]
async fn shutdown_closes_readiness_but_keeps_liveness() {
    let (app, ctx, _) = ready_app(Script::Detections(vec![detection(0, 0.7)])).await;
    let mut states = ctx.subscribe();

    ctx.begin_shutdown();
    assert_eq!(*states.borrow_and_update(), ServiceState::ShuttingDown);

    assert_eq!(send(&app, get("/readyz")).await.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(send(&app, get("/livez")).await.status(), StatusCode::OK);
    let response = send(&app, multipart_request("file", "late.png", &png_bytes())).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    assert!(ctx.mark_ready().is_err());
    assert_eq!(ctx.state(), ServiceState::ShuttingDown);
}

#[tokio::test]
async fn drain_keeps_health_endpoints_answering_during_grace() {
    let (app, ctx, _) = ready_app(Script::Detections(vec![])).await;

    let draining = {
        let ctx = ctx.clone();
        tokio::spawn(async move { ctx.drain(Duration::from_millis(200)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!draining.is_finished());
    assert_eq!(send(&app, get("/readyz")).await.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(send(&app, get("/livez")).await.status(), StatusCode::OK);

    draining.await.unwrap();
}

#[tokio::test]
async fn shutdown_during_a_slow_model_load_abandons_startup() {
    use person_detector::application::ports::{InferenceEngine, ModelLoaderPort};
    use person_detector::domain::{errors::DomainResult, model::InferenceParams};
    use std::path::Path;

    struct SlowLoader;
    impl ModelLoaderPort for SlowLoader {
        fn load(&self, _: &Path, _: &InferenceParams) -> DomainResult<Box<dyn InferenceEngine>> {
            std::thread::sleep(Duration::from_millis(400));
            Err(DomainError::ModelLoad("too late anyway".into()))
        }
    }

    let ctx = Arc::new(AppContext::new());
    let stopper = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ctx.begin_shutdown();
        })
    };

    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        bootstrap_unless_shutdown(&ctx, &AppConfig::default(), Arc::new(SlowLoader), Arc::new(PresentCatalog)),
    )
    .await
    .expect("startup should stop waiting once shutdown begins");

    assert!(matches!(outcome, Ok(None)));
    assert_eq!(ctx.state(), ServiceState::ShuttingDown);
    assert!(ctx.ready_detector().is_none());
    stopper.await.unwrap();
}
