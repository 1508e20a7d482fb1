//! 동기화 트리거 endpoint.
//!
//! 요청은 작업으로 제출되며 202와 작업 ID를 즉시 반환합니다.

use axum::{
    body::Bytes, extract::State, http::StatusCode, response::IntoResponse, routing::post, Json,
    Router,
};
use chrono::{DateTime, Utc};
use market_core::{Interval, TimeRange};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::{ApiErrorResponse, ApiResult};
use crate::api::state::AppState;
use crate::error::SyncError;

/// 전체/단일 종목 동기화 요청.
#[derive(Debug, Deserialize)]
pub struct FullSyncRequest {
    pub symbol: Option<String>,
    pub venue: Option<String>,
    /// 기본값: 서비스 설정 간격
    pub interval: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IncrementalSyncRequest {
    pub interval: Option<String>,
}

/// 작업 제출 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobAccepted {
    pub job_id: Uuid,
    pub kind: String,
}

fn parse_interval(raw: Option<&str>, default: Interval) -> ApiResult<Interval> {
    match raw {
        Some(s) => s
            .parse()
            .map_err(|e: String| ApiErrorResponse::bad_request(e).with_details(json!({"field": "interval"}))),
        None => Ok(default),
    }
}

/// JSON 본문 파싱. 실패는 구조화된 400으로 변환합니다.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        ApiErrorResponse::bad_request(format!("잘못된 요청 본문: {}", e)).with_details(json!({
            "line": e.line(),
            "column": e.column(),
        }))
    })
}

/// POST /api/v1/sync/full
///
/// symbol과 venue가 모두 있으면 단일 종목, 둘 다 없으면 활성 종목 전체를 동기화합니다.
pub async fn full_sync(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let req: FullSyncRequest = parse_body(&body)?;
    let interval = parse_interval(req.interval.as_deref(), state.default_interval)?;
    let range = TimeRange::new(req.start, req.end).map_err(|e| {
        ApiErrorResponse::bad_request(e.to_string())
            .with_details(json!({"start": req.start, "end": req.end}))
    })?;

    let orchestrator = state.orchestrator.clone();
    let handle = match (req.symbol, req.venue) {
        (Some(symbol), Some(venue)) => {
            if symbol.trim().is_empty() || venue.trim().is_empty() {
                return Err(ApiErrorResponse::bad_request("symbol과 venue는 비어 있을 수 없습니다"));
            }
            state
                .jobs
                .submit("sync_instrument", move |token| async move {
                    let orchestrator = orchestrator.with_cancellation(token);
                    let written = orchestrator
                        .sync_instrument(&symbol, &venue, interval, range)
                        .await?;
                    Ok::<_, SyncError>(json!({
                        "symbol": symbol,
                        "venue": venue,
                        "interval": interval,
                        "bars_written": written,
                    }))
                })
                .await
        }
        (None, None) => {
            state
                .jobs
                .submit("sync_fleet", move |token| async move {
                    let report = orchestrator
                        .with_cancellation(token)
                        .sync_fleet(interval, range)
                        .await?;
                    Ok::<_, SyncError>(json!(report))
                })
                .await
        }
        _ => {
            return Err(ApiErrorResponse::bad_request(
                "symbol과 venue는 함께 지정해야 합니다",
            ))
        }
    };

    let kind = format!("sync_full:{}", interval);
    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            job_id: handle.id,
            kind,
        }),
    ))
}

/// POST /api/v1/sync/incremental
///
/// 본문은 생략할 수 있습니다. 증분 동기화가 이미 실행 중이면 409.
pub async fn incremental_sync(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let req: IncrementalSyncRequest = if body.is_empty() {
        IncrementalSyncRequest::default()
    } else {
        parse_body(&body)?
    };
    let interval = parse_interval(req.interval.as_deref(), state.default_interval)?;

    if state.orchestrator.is_incremental_running() {
        return Err(ApiErrorResponse::conflict("증분 동기화가 이미 실행 중입니다"));
    }

    let orchestrator = state.orchestrator.clone();
    let handle = state
        .jobs
        .submit("incremental_update", move |token| async move {
            let report = orchestrator
                .with_cancellation(token)
                .incremental_update(interval)
                .await?;
            Ok::<_, SyncError>(json!(report))
        })
        .await;

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            job_id: handle.id,
            kind: format!("incremental:{}", interval),
        }),
    ))
}

pub fn sync_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/full", post(full_sync))
        .route("/incremental", post(incremental_sync))
}
