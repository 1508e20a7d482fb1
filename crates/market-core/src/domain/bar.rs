//! OHLCV 봉 데이터.
//!
//! 봉의 식별 키는 (symbol, venue, interval, timestamp)이며 저장소에서 유일합니다.
//! 같은 키로 다시 쓰면 마지막 값이 남습니다(last-write-wins).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{InstrumentId, Interval};

/// OHLCV 봉.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// 종목 코드
    pub symbol: String,
    /// 거래소
    pub venue: String,
    /// 봉 간격
    pub interval: Interval,
    /// 봉 시작 시간
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
    /// 거래대금
    #[serde(default)]
    pub amount: Decimal,
}

impl Bar {
    /// 새 봉을 생성합니다. 거래대금은 0으로 초기화됩니다.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        venue: impl Into<String>,
        interval: Interval,
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            venue: venue.into(),
            interval,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            amount: Decimal::ZERO,
        }
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    pub fn instrument_id(&self) -> InstrumentId {
        InstrumentId::new(&self.symbol, &self.venue)
    }

    /// 봉 불변식을 검사하고 처음 발견된 위반을 반환합니다.
    ///
    /// 순서: 식별자 → 양수 가격 → 고가/저가 관계 → 거래량/거래대금.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.symbol.trim().is_empty() || self.venue.trim().is_empty() {
            return Err(ValidationError::MissingIdentity);
        }

        for (field, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if value <= Decimal::ZERO {
                return Err(ValidationError::NonPositivePrice { field, value });
            }
        }

        if self.low > self.high {
            return Err(ValidationError::LowAboveHigh {
                low: self.low,
                high: self.high,
            });
        }
        if self.open < self.low || self.open > self.high {
            return Err(ValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }
        if self.close < self.low || self.close > self.high {
            return Err(ValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        if self.volume < Decimal::ZERO {
            return Err(ValidationError::NegativeVolume(self.volume));
        }
        if self.amount < Decimal::ZERO {
            return Err(ValidationError::NegativeAmount(self.amount));
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
