//! 헬스 체크 endpoint.
//!
//! 저장소 연결과 스케줄러 상태를 보고합니다. 저장소에 연결할 수 없으면 503입니다.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::api::state::AppState;
use crate::modules::SchedulerStatus;

/// 헬스 체크 응답.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" | "degraded"
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
    /// 현재 시간 (ISO 8601)
    pub timestamp: String,
    pub components: ComponentHealth,
    pub scheduler: SchedulerStatus,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub store: ComponentStatus,
    pub scheduler: ComponentStatus,
}

/// 컴포넌트 상태.
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    /// "up" | "down" | "idle"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    pub fn up() -> Self {
        Self {
            status: "up".to_string(),
            message: None,
        }
    }

    pub fn up_with_info(message: impl Into<String>) -> Self {
        Self {
            status: "up".to_string(),
            message: Some(message.into()),
        }
    }

    pub fn down(message: impl Into<String>) -> Self {
        Self {
            status: "down".to_string(),
            message: Some(message.into()),
        }
    }
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let scheduler = state.scheduler.read().await.clone();

    let (store, status_code) = if state.is_store_healthy().await {
        (
            ComponentStatus::up_with_info(state.orchestrator.store().backend_name()),
            StatusCode::OK,
        )
    } else {
        (
            ComponentStatus::down("연결 실패"),
            StatusCode::SERVICE_UNAVAILABLE,
        )
    };

    let scheduler_component = match (&scheduler.last_error, scheduler.last_success) {
        (Some(err), _) => ComponentStatus::down(err.clone()),
        (None, Some(ts)) => ComponentStatus::up_with_info(format!("last success {}", ts.to_rfc3339())),
        (None, None) => ComponentStatus::up(),
    };

    let response = HealthResponse {
        status: if status_code == StatusCode::OK {
            "healthy"
        } else {
            "degraded"
        }
        .to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: (now - state.started_at).num_seconds(),
        timestamp: now.to_rfc3339(),
        components: ComponentHealth {
            store,
            scheduler: scheduler_component,
        },
        scheduler,
    };

    (status_code, Json(response))
}

pub fn health_router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}
