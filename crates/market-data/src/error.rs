//! 데이터 모듈 오류 타입.

use std::time::Duration;
use thiserror::Error;

/// 저장소/레지스트리 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 저장된 값이 도메인 타입으로 복원되지 않음
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 마이그레이션 오류
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// 데이터 삽입 오류
    #[error("Insert error: {0}")]
    InsertError(String),

    /// 저장소를 사용할 수 없음
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Io(e) => DataError::ConnectionError(e.to_string()),
            sqlx::Error::Database(db_err) => DataError::QueryError(db_err.message().to_string()),
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<market_core::CoreError> for DataError {
    fn from(err: market_core::CoreError) -> Self {
        DataError::InvalidData(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

/// 업스트림 봉 조회 오류.
#[derive(Debug, Error)]
pub enum FetchError {
    /// 200이 아닌 HTTP 상태 또는 응답 본문의 에러 코드
    #[error("Upstream status {status}: {message}")]
    Status { status: u16, message: String },

    /// 요청 타임아웃
    #[error("Upstream timeout after {0:?}")]
    Timeout(Duration),

    /// 연결 실패 등 네트워크 오류
    #[error("Network error: {0}")]
    Network(String),

    /// 응답 본문 파싱 실패
    #[error("Decode error: {0}")]
    Decode(String),
}

impl FetchError {
    /// 재시도 가능한 일시적 오류인지 여부.
    ///
    /// 파싱 실패는 재시도해도 같은 결과이므로 제외합니다.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Decode(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            FetchError::Network(err.to_string())
        }
    }
}
