//! API 에러 응답.
//!
//! 모든 엔드포인트는 실패 시 같은 JSON 형식을 반환합니다.
//!
//! ```json
//! {
//!   "status": 409,
//!   "code": "BUSY",
//!   "message": "이미 실행 중: incremental update",
//!   "details": null,
//!   "timestamp": 1719540000
//! }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use market_quality::QualityError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;

/// 통합 API 에러 응답.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// HTTP 상태 코드
    pub status: u16,
    /// 에러 코드 (예: "INVALID_INPUT", "NOT_FOUND")
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Unix timestamp
    pub timestamp: i64,
}

impl ApiErrorResponse {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "BUSY", message)
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

impl From<SyncError> for ApiErrorResponse {
    fn from(err: SyncError) -> Self {
        let status = match &err {
            SyncError::InvalidInput(_) | SyncError::Config(_) => StatusCode::BAD_REQUEST,
            SyncError::Busy(_) => StatusCode::CONFLICT,
            SyncError::Quality(QualityError::UnknownInstrument { .. }) => StatusCode::NOT_FOUND,
            SyncError::Store(_) | SyncError::Quality(QualityError::Data(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            SyncError::Fetch { .. } => StatusCode::BAD_GATEWAY,
            SyncError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<QualityError> for ApiErrorResponse {
    fn from(err: QualityError) -> Self {
        SyncError::from(err).into()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiErrorResponse>;
