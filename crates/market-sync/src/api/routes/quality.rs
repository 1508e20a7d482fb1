//! 품질 검사 endpoint.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use market_quality::{CheckResult, QualityReport};
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// GET /api/v1/quality/report
pub async fn quality_report(State(state): State<Arc<AppState>>) -> ApiResult<Json<QualityReport>> {
    Ok(Json(state.checker.generate_report().await?))
}

/// GET /api/v1/quality/{venue}/{symbol}
///
/// 등록되지 않은 종목이면 404.
pub async fn check_instrument(
    State(state): State<Arc<AppState>>,
    Path((venue, symbol)): Path<(String, String)>,
) -> ApiResult<Json<Vec<CheckResult>>> {
    Ok(Json(state.checker.check_registered(&symbol, &venue).await?))
}

pub fn quality_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/report", get(quality_report))
        .route("/{venue}/{symbol}", get(check_instrument))
}
