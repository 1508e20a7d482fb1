//! 동기화/품질 검사 트리거 HTTP API.

pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use error::{ApiErrorResponse, ApiResult};
pub use state::AppState;

/// 전체 라우터 생성.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::health_router())
        .nest("/api/v1/sync", routes::sync_router())
        .nest("/api/v1/jobs", routes::jobs_router())
        .nest("/api/v1/quality", routes::quality_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
