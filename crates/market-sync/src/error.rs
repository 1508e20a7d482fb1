//! 동기화 에러 타입.

use chrono::{DateTime, Utc};
use market_data::{DataError, FetchError};
use market_quality::QualityError;
use std::time::Duration;
use thiserror::Error;

/// 종목 단위 동기화 에러.
///
/// 플릿 동기화에서는 종목별 결과로 기록될 뿐 전체 실행을 중단시키지 않습니다.
#[derive(Debug, Error)]
pub enum SyncError {
    /// 재시도 후에도 업스트림 조회 실패
    #[error("업스트림 조회 실패 ({attempts}회 시도): {source}")]
    Fetch {
        attempts: u32,
        #[source]
        source: FetchError,
    },

    /// 저장소 에러 (실행 중 재시도하지 않음)
    #[error("저장소 에러: {0}")]
    Store(#[from] DataError),

    /// 일부 행 저장 실패
    #[error("일부 봉 저장 실패: {written}개 성공, {failed}개 실패")]
    PartialWrite { written: usize, failed: usize },

    /// 잘못된 봉 비율이 임계값 초과
    #[error("배치 거부: 잘못된 봉 {invalid}/{total} (임계값 {threshold})")]
    BatchRejected {
        invalid: usize,
        total: usize,
        threshold: f64,
    },

    /// 커서가 저장소 최신 시각을 앞섬
    #[error("커서 갱신 불가: 요청 {requested}, 저장소 최신 {latest:?}")]
    CursorNotPersisted {
        requested: DateTime<Utc>,
        latest: Option<DateTime<Utc>>,
    },

    /// 작업 타임아웃
    #[error("{operation} 타임아웃 ({timeout:?})")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// 종료 신호로 중단
    #[error("종료 신호로 중단됨")]
    Cancelled,

    /// 같은 작업이 이미 실행 중
    #[error("이미 실행 중: {0}")]
    Busy(String),

    /// 잘못된 요청
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 품질 검사 에러
    #[error(transparent)]
    Quality(#[from] QualityError),
}

impl SyncError {
    /// 짧은 분류 코드 (리포트/API 응답용).
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "FETCH_FAILED",
            Self::Store(_) => "STORE_ERROR",
            Self::PartialWrite { .. } => "PARTIAL_WRITE",
            Self::BatchRejected { .. } => "BATCH_REJECTED",
            Self::CursorNotPersisted { .. } => "CURSOR_NOT_PERSISTED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::Busy(_) => "BUSY",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Quality(QualityError::UnknownInstrument { .. }) => "NOT_FOUND",
            Self::Quality(_) => "QUALITY_ERROR",
        }
    }

    /// 다음 실행에서 다시 시도할 만한 일시적 에러인지 여부.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { source, .. } => source.is_retryable(),
            Self::Timeout { .. } | Self::Busy(_) | Self::Store(_) | Self::PartialWrite { .. } => {
                true
            }
            _ => false,
        }
    }
}

impl From<market_core::CoreError> for SyncError {
    fn from(err: market_core::CoreError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
