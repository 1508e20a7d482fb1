//! 봉 데이터의 시간 간격 정의.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 봉 간격.
///
/// 저장소 태그와 업스트림 요청에는 `as_str()` 표현("1d", "5m" 등)을 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    /// 1분봉
    #[serde(rename = "1m")]
    M1,
    /// 5분봉
    #[serde(rename = "5m")]
    M5,
    /// 15분봉
    #[serde(rename = "15m")]
    M15,
    /// 30분봉
    #[serde(rename = "30m")]
    M30,
    /// 60분봉
    #[serde(rename = "60m")]
    M60,
    /// 일봉
    #[serde(rename = "1d")]
    D1,
}

impl Interval {
    /// 지원하는 모든 간격.
    pub const ALL: [Interval; 6] = [
        Interval::M1,
        Interval::M5,
        Interval::M15,
        Interval::M30,
        Interval::M60,
        Interval::D1,
    ];

    /// 이 간격의 명목 기간을 반환합니다.
    pub fn duration(&self) -> chrono::Duration {
        match self {
            Interval::M1 => chrono::Duration::minutes(1),
            Interval::M5 => chrono::Duration::minutes(5),
            Interval::M15 => chrono::Duration::minutes(15),
            Interval::M30 => chrono::Duration::minutes(30),
            Interval::M60 => chrono::Duration::minutes(60),
            Interval::D1 => chrono::Duration::days(1),
        }
    }

    /// 초 단위 길이.
    pub fn as_secs(&self) -> i64 {
        self.duration().num_seconds()
    }

    /// 저장소/업스트림에서 사용하는 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::M60 => "60m",
            Interval::D1 => "1d",
        }
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::D1
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Interval::M1),
            "5m" => Ok(Interval::M5),
            "15m" => Ok(Interval::M15),
            "30m" => Ok(Interval::M30),
            // 업스트림은 1시간봉을 "1h"로 표기하기도 함
            "60m" | "1h" => Ok(Interval::M60),
            "1d" => Ok(Interval::D1),
            _ => Err(format!("Invalid interval: {}", s)),
        }
    }
}
