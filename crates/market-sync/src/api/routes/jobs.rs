//! 작업 상태 조회/취소 endpoint.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::{ApiErrorResponse, ApiResult};
use crate::api::state::AppState;

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state
        .jobs
        .status(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiErrorResponse::not_found(format!("작업을 찾을 수 없습니다: {}", id)))
}

/// DELETE /api/v1/jobs/{id}
///
/// 이미 끝난 작업이면 409.
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if state.jobs.cancel(id).await {
        return Ok((StatusCode::ACCEPTED, Json(json!({"job_id": id, "cancelled": true}))));
    }
    match state.jobs.status(id).await {
        Some(status) => Err(ApiErrorResponse::new(
            StatusCode::CONFLICT,
            "JOB_FINISHED",
            format!("이미 종료된 작업입니다: {}", id),
        )
        .with_details(json!({"state": status.state}))),
        None => Err(ApiErrorResponse::not_found(format!(
            "작업을 찾을 수 없습니다: {}",
            id
        ))),
    }
}

pub fn jobs_router() -> Router<Arc<AppState>> {
    Router::new().route("/{id}", get(get_job).delete(cancel_job))
}
