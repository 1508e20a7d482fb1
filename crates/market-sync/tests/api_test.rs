//! HTTP API 통합 테스트.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration as ChronoDuration, Utc};
use market_core::{Bar, Instrument, Interval, TimeRange};
use market_data::{
    BarFetcher, FetchError, InstrumentRegistry, MarketStore, MemoryBackend, StaticRegistry,
};
use market_quality::QualityChecker;
use market_sync::api::{create_router, AppState};
use market_sync::modules::{
    JobRegistry, SchedulerStatus, SyncOptions, SyncOrchestrator,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// 요청 구간의 매일 자정 봉을 만들어 돌려주는 업스트림.
struct DailyFetcher;

#[async_trait]
impl BarFetcher for DailyFetcher {
    fn name(&self) -> &str {
        "daily"
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        venue: &str,
        interval: Interval,
        range: TimeRange,
    ) -> Result<Vec<Bar>, FetchError> {
        let p = Decimal::from(10);
        let first = range.start.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
        let mut bars = Vec::new();
        let mut ts = first;
        while ts < range.end {
            if range.contains(ts) {
                bars.push(Bar::new(
                    symbol,
                    venue,
                    interval,
                    ts,
                    p,
                    p + Decimal::ONE,
                    p - Decimal::ONE,
                    p,
                    Decimal::from(100),
                ));
            }
            ts += ChronoDuration::days(1);
        }
        Ok(bars)
    }
}

struct TestApp {
    router: Router,
    backend: Arc<MemoryBackend>,
}

fn app() -> TestApp {
    let backend = Arc::new(MemoryBackend::new());
    let store = MarketStore::new(backend.clone());
    let registry: Arc<dyn InstrumentRegistry> =
        Arc::new(StaticRegistry::new(vec![Instrument::new("600519", "SH")]));
    let options = SyncOptions {
        request_delay: Duration::ZERO,
        ..SyncOptions::default()
    };
    let shutdown = CancellationToken::new();
    let orchestrator = SyncOrchestrator::new(
        registry.clone(),
        Arc::new(DailyFetcher),
        store.clone(),
        options,
        shutdown.clone(),
    );
    let state = Arc::new(AppState::new(
        orchestrator,
        QualityChecker::new(store, registry),
        JobRegistry::new(shutdown),
        Arc::new(RwLock::new(SchedulerStatus::default())),
        Interval::D1,
    ));
    TestApp {
        router: create_router(state),
        backend,
    }
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn wait_job(router: &Router, id: &str) -> Value {
    for _ in 0..200 {
        let (status, job) = send(router, Method::GET, &format!("/api/v1/jobs/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        if matches!(job["state"].as_str(), Some("succeeded" | "failed" | "cancelled")) {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {id} did not finish");
}

#[tokio::test]
async fn health_reports_store_state() {
    let app = app();
    let (status, body) = send(&app.router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"]["store"]["status"], "up");

    app.backend.set_unavailable(true);
    let (status, body) = send(&app.router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["components"]["store"]["status"], "down");
}

#[tokio::test]
async fn full_sync_job_runs_to_completion() {
    let app = app();
    let end = Utc::now();
    let start = end - ChronoDuration::days(5);
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/v1/sync/full",
        Some(json!({
            "symbol": "600519",
            "venue": "SH",
            "interval": "1d",
            "start": start,
            "end": end,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let job = wait_job(&app.router, &job_id).await;
    assert_eq!(job["state"], "succeeded", "{job}");
    assert!(job["result"]["bars_written"].as_u64().unwrap() >= 4);

    // 끝난 작업 취소는 409
    let (status, body) = send(
        &app.router,
        Method::DELETE,
        &format!("/api/v1/jobs/{job_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "JOB_FINISHED");
}

#[tokio::test]
async fn full_sync_rejects_bad_requests() {
    let app = app();
    let end = Utc::now();
    let start = end - ChronoDuration::days(5);

    // 역전된 구간
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/v1/sync/full",
        Some(json!({"start": end, "end": start})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    // symbol만 지정
    let (status, _) = send(
        &app.router,
        Method::POST,
        "/api/v1/sync/full",
        Some(json!({"symbol": "600519", "start": start, "end": end})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 알 수 없는 간격
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/v1/sync/full",
        Some(json!({"interval": "7x", "start": start, "end": end})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["field"], "interval");
}

#[tokio::test]
async fn malformed_sync_body_is_structured_bad_request() {
    let app = app();

    // start 누락
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/v1/sync/full",
        Some(json!({"end": Utc::now()})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
    assert!(body["details"]["line"].is_u64());

    // 깨진 JSON
    for uri in ["/api/v1/sync/full", "/api/v1/sync/incremental"] {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from("{\"start\":"))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "INVALID_INPUT", "{uri}");
    }
}

#[tokio::test]
async fn incremental_sync_accepts_empty_body() {
    let app = app();
    let (status, body) = send(&app.router, Method::POST, "/api/v1/sync/incremental", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["kind"], "incremental:1d");

    let job = wait_job(&app.router, body["job_id"].as_str().unwrap()).await;
    assert_eq!(job["state"], "succeeded", "{job}");
    assert_eq!(job["result"]["outcomes"]["600519.SH"]["status"], "succeeded");
    assert!(!app.backend.is_empty().await);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let app = app();
    let id = uuid::Uuid::new_v4();
    let (status, body) = send(&app.router, Method::GET, &format!("/api/v1/jobs/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(&app.router, Method::DELETE, &format!("/api/v1/jobs/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn quality_check_for_unregistered_instrument_is_not_found() {
    let app = app();
    let (status, body) = send(&app.router, Method::GET, "/api/v1/quality/SZ/000001", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = send(&app.router, Method::GET, "/api/v1/quality/SH/600519", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().is_some_and(|checks| !checks.is_empty()));
}
