//! 기술 지표 레코드.
//!
//! 지표 종류별로 허용되는 필드 집합이 다르며, 값은 희소하게 저장됩니다
//! (계산 구간이 부족한 필드는 생략).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::InstrumentId;

/// 지표 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    /// 이동평균
    Ma,
    /// MACD
    Macd,
    /// RSI
    Rsi,
    /// KDJ (스토캐스틱 변형)
    Kdj,
    /// 볼린저 밴드
    Boll,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 5] = [
        IndicatorKind::Ma,
        IndicatorKind::Macd,
        IndicatorKind::Rsi,
        IndicatorKind::Kdj,
        IndicatorKind::Boll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ma => "ma",
            Self::Macd => "macd",
            Self::Rsi => "rsi",
            Self::Kdj => "kdj",
            Self::Boll => "boll",
        }
    }

    /// 이 종류에서 허용되는 필드명.
    pub fn field_names(&self) -> &'static [&'static str] {
        match self {
            Self::Ma => &["ma5", "ma10", "ma20", "ma30", "ma60", "ma120", "ma250"],
            Self::Macd => &["macd", "macd_signal", "macd_hist"],
            Self::Rsi => &["rsi6", "rsi12", "rsi24"],
            Self::Kdj => &["k", "d", "j"],
            Self::Boll => &["boll_upper", "boll_mid", "boll_lower"],
        }
    }

    pub fn accepts_field(&self, field: &str) -> bool {
        self.field_names().contains(&field)
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndicatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ma" => Ok(Self::Ma),
            "macd" => Ok(Self::Macd),
            "rsi" => Ok(Self::Rsi),
            "kdj" => Ok(Self::Kdj),
            "boll" => Ok(Self::Boll),
            _ => Err(format!("Unknown indicator kind: {}", s)),
        }
    }
}

/// 특정 시점의 지표 값 묶음.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub symbol: String,
    pub venue: String,
    pub kind: IndicatorKind,
    pub timestamp: DateTime<Utc>,
    /// 필드명 → 값 (희소)
    pub fields: BTreeMap<String, Decimal>,
}

impl Indicator {
    pub fn new(
        symbol: impl Into<String>,
        venue: impl Into<String>,
        kind: IndicatorKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            venue: venue.into(),
            kind,
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Decimal) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: Decimal) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Decimal> {
        self.fields.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn instrument_id(&self) -> InstrumentId {
        InstrumentId::new(&self.symbol, &self.venue)
    }

    /// 식별자와 필드 집합을 검사합니다.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.symbol.trim().is_empty() || self.venue.trim().is_empty() {
            return Err(ValidationError::MissingIdentity);
        }
        if let Some(field) = self.fields.keys().find(|f| !self.kind.accepts_field(f)) {
            return Err(ValidationError::UnknownIndicatorField {
                kind: self.kind.to_string(),
                field: field.clone(),
            });
        }
        Ok(())
    }
}
