//! 종목 정의.
//!
//! 종목은 (symbol, venue) 쌍으로 식별됩니다. 상장 이후 상태(status)를 제외하면
//! 변경되지 않으며, 이 코어에서는 읽기 전용입니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 종목 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentStatus {
    /// 거래 중
    Active,
    /// 상장폐지/거래정지
    Inactive,
}

impl InstrumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for InstrumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstrumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(format!("Unknown instrument status: {}", s)),
        }
    }
}

/// 종목 식별자 (symbol, venue).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentId {
    /// 종목 코드 (예: "600519")
    pub symbol: String,
    /// 거래소 (예: "SH", "SZ")
    pub venue: String,
}

impl InstrumentId {
    pub fn new(symbol: impl Into<String>, venue: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            venue: venue.into(),
        }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.symbol, self.venue)
    }
}

impl FromStr for InstrumentId {
    type Err = String;

    /// "SYMBOL.VENUE" 형식을 파싱합니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('.') {
            Some((symbol, venue)) if !symbol.is_empty() && !venue.is_empty() => {
                Ok(Self::new(symbol, venue))
            }
            _ => Err(format!("Invalid instrument code: {}", s)),
        }
    }
}

/// 거래 가능한 종목.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// 종목 코드
    pub symbol: String,
    /// 거래소
    pub venue: String,
    /// 종목명 (선택)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 상태
    pub status: InstrumentStatus,
}

impl Instrument {
    /// 활성 상태의 종목을 생성합니다.
    pub fn new(symbol: impl Into<String>, venue: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            venue: venue.into(),
            name: None,
            status: InstrumentStatus::Active,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_status(mut self, status: InstrumentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == InstrumentStatus::Active
    }

    pub fn id(&self) -> InstrumentId {
        InstrumentId::new(&self.symbol, &self.venue)
    }

    /// "SYMBOL.VENUE" 형식의 전체 코드.
    pub fn full_code(&self) -> String {
        format!("{}.{}", self.symbol, self.venue)
    }
}
