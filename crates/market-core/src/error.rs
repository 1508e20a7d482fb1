//! 도메인 에러 타입.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 시작이 종료보다 늦은 시간 범위
    #[error("잘못된 시간 범위: {start} > {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 봉/지표 유효성 검증 실패
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// 봉/지표 레코드의 불변식 위반.
///
/// 하나의 레코드에서 처음 발견된 위반만 보고합니다.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// 심볼 또는 거래소가 비어 있음
    #[error("심볼 또는 거래소가 비어 있습니다")]
    MissingIdentity,

    /// 0 이하의 가격
    #[error("가격은 0보다 커야 합니다: {field}={value}")]
    NonPositivePrice { field: &'static str, value: Decimal },

    /// 저가가 고가보다 높음
    #[error("저가가 고가보다 높습니다: low={low}, high={high}")]
    LowAboveHigh { low: Decimal, high: Decimal },

    /// 시가가 고가/저가 범위를 벗어남
    #[error("시가가 범위를 벗어났습니다: open={open}, low={low}, high={high}")]
    OpenOutOfRange {
        open: Decimal,
        low: Decimal,
        high: Decimal,
    },

    /// 종가가 고가/저가 범위를 벗어남
    #[error("종가가 범위를 벗어났습니다: close={close}, low={low}, high={high}")]
    CloseOutOfRange {
        close: Decimal,
        low: Decimal,
        high: Decimal,
    },

    /// 음수 거래량
    #[error("거래량은 음수일 수 없습니다: volume={0}")]
    NegativeVolume(Decimal),

    /// 음수 거래대금
    #[error("거래대금은 음수일 수 없습니다: amount={0}")]
    NegativeAmount(Decimal),

    /// 지표 종류에 정의되지 않은 필드
    #[error("지표 {kind}에 없는 필드입니다: {field}")]
    UnknownIndicatorField { kind: String, field: String },
}

impl ValidationError {
    /// 리포트/로그에서 사용하는 짧은 분류 코드.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingIdentity => "missing_identity",
            Self::NonPositivePrice { .. } => "invalid_price",
            Self::LowAboveHigh { .. }
            | Self::OpenOutOfRange { .. }
            | Self::CloseOutOfRange { .. } => "price_logic_error",
            Self::NegativeVolume(_) => "negative_volume",
            Self::NegativeAmount(_) => "negative_amount",
            Self::UnknownIndicatorField { .. } => "unknown_field",
        }
    }
}

/// 도메인 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;
