//! 시계열 포인트와 도메인 레코드 간 변환.
//!
//! 저장 레이아웃은 `(measurement, tags = {symbol, venue, series}, time, fields)`
//! 형태입니다. `series`는 봉이면 간격(`1d`), 지표면 종류(`ma`)입니다.

use chrono::{DateTime, Utc};
use market_core::{Bar, Indicator, IndicatorKind, Interval};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{DataError, Result};

/// 측정값(테이블) 구분.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measurement {
    Bars,
    Indicators,
}

impl Measurement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bars => "bars",
            Self::Indicators => "indicators",
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 하나의 시계열을 식별하는 태그 집합.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub measurement: Measurement,
    pub symbol: String,
    pub venue: String,
    pub series: String,
}

impl SeriesKey {
    pub fn bars(symbol: impl Into<String>, venue: impl Into<String>, interval: Interval) -> Self {
        Self {
            measurement: Measurement::Bars,
            symbol: symbol.into(),
            venue: venue.into(),
            series: interval.as_str().to_string(),
        }
    }

    pub fn indicators(
        symbol: impl Into<String>,
        venue: impl Into<String>,
        kind: IndicatorKind,
    ) -> Self {
        Self {
            measurement: Measurement::Indicators,
            symbol: symbol.into(),
            venue: venue.into(),
            series: kind.as_str().to_string(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}.{}/{}",
            self.measurement, self.symbol, self.venue, self.series
        )
    }
}

/// 한 시점의 필드 묶음.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub key: SeriesKey,
    pub timestamp: DateTime<Utc>,
    pub fields: BTreeMap<String, Decimal>,
}

const BAR_FIELDS: [&str; 6] = ["open", "high", "low", "close", "volume", "amount"];

impl Point {
    pub fn new(key: SeriesKey, timestamp: DateTime<Utc>) -> Self {
        Self {
            key,
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Decimal) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn from_bar(bar: &Bar) -> Self {
        let key = SeriesKey::bars(&bar.symbol, &bar.venue, bar.interval);
        let values = [
            bar.open, bar.high, bar.low, bar.close, bar.volume, bar.amount,
        ];
        let fields = BAR_FIELDS
            .iter()
            .zip(values)
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        Self {
            key,
            timestamp: bar.timestamp,
            fields,
        }
    }

    pub fn from_indicator(indicator: &Indicator) -> Self {
        Self {
            key: SeriesKey::indicators(&indicator.symbol, &indicator.venue, indicator.kind),
            timestamp: indicator.timestamp,
            fields: indicator.fields.clone(),
        }
    }

    fn required(&self, name: &str) -> Result<Decimal> {
        self.fields.get(name).copied().ok_or_else(|| {
            DataError::InvalidData(format!(
                "{} @ {}: missing field '{}'",
                self.key, self.timestamp, name
            ))
        })
    }

    /// 봉으로 복원합니다. `amount`가 없으면 0으로 둡니다.
    pub fn to_bar(&self) -> Result<Bar> {
        if self.key.measurement != Measurement::Bars {
            return Err(DataError::InvalidData(format!("{} is not a bar series", self.key)));
        }
        let interval: Interval = self
            .key
            .series
            .parse()
            .map_err(DataError::InvalidData)?;

        Ok(Bar::new(
            &self.key.symbol,
            &self.key.venue,
            interval,
            self.timestamp,
            self.required("open")?,
            self.required("high")?,
            self.required("low")?,
            self.required("close")?,
            self.required("volume")?,
        )
        .with_amount(self.fields.get("amount").copied().unwrap_or_default()))
    }

    pub fn to_indicator(&self) -> Result<Indicator> {
        if self.key.measurement != Measurement::Indicators {
            return Err(DataError::InvalidData(format!(
                "{} is not an indicator series",
                self.key
            )));
        }
        let kind: IndicatorKind = self
            .key
            .series
            .parse()
            .map_err(DataError::InvalidData)?;

        let mut indicator = Indicator::new(&self.key.symbol, &self.key.venue, kind, self.timestamp);
        indicator.fields = self.fields.clone();
        Ok(indicator)
    }
}
