//! 품질 검사 결과 타입.

use chrono::{DateTime, Utc};
use market_core::TimeRange;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 검사 종류. 선언 순서가 실행 순서입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Completeness,
    Continuity,
    Anomalies,
    Freshness,
}

impl CheckKind {
    pub const ALL: [CheckKind; 4] = [
        CheckKind::Completeness,
        CheckKind::Continuity,
        CheckKind::Anomalies,
        CheckKind::Freshness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completeness => "completeness",
            Self::Continuity => "continuity",
            Self::Anomalies => "anomalies",
            Self::Freshness => "freshness",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 검사 판정.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warning,
    Error,
}

impl CheckStatus {
    /// 발견 건수 기준 판정: 0 → pass, 1~2 → warning, 그 이상 → error.
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => Self::Pass,
            1..=2 => Self::Warning,
            _ => Self::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 한 시점의 검사 결과. 진단용이며 저장하지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub symbol: String,
    pub venue: String,
    pub check_kind: CheckKind,
    pub status: CheckStatus,
    pub message: String,
    #[serde(default)]
    pub details: Value,
    pub checked_at: DateTime<Utc>,
}

/// 종목 정보 없이 계산된 판정.
///
/// 순수 검사 함수의 반환값이며 [`Finding::into_result`]로 종목을 붙입니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub kind: CheckKind,
    pub status: CheckStatus,
    pub message: String,
    pub details: Value,
}

impl Finding {
    pub fn new(kind: CheckKind, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
            details: Value::Null,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn into_result(self, symbol: &str, venue: &str, checked_at: DateTime<Utc>) -> CheckResult {
        CheckResult {
            symbol: symbol.to_string(),
            venue: venue.to_string(),
            check_kind: self.kind,
            status: self.status,
            message: self.message,
            details: self.details,
            checked_at,
        }
    }
}

/// 판정별 집계.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub pass_count: usize,
    pub warning_count: usize,
    pub error_count: usize,
}

impl ReportSummary {
    pub fn record(&mut self, status: CheckStatus) {
        match status {
            CheckStatus::Pass => self.pass_count += 1,
            CheckStatus::Warning => self.warning_count += 1,
            CheckStatus::Error => self.error_count += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pass_count + self.warning_count + self.error_count
    }
}

/// 검사에 실패해 리포트에서 제외된 종목.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedInstrument {
    pub symbol: String,
    pub venue: String,
    pub reason: String,
}

/// 전체 활성 종목 품질 리포트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub generated_at: DateTime<Utc>,
    pub window: TimeRange,
    /// 검사 대상 활성 종목 수
    pub total_instruments: usize,
    pub checks: Vec<CheckResult>,
    pub summary: ReportSummary,
    #[serde(default)]
    pub skipped: Vec<SkippedInstrument>,
}

impl QualityReport {
    pub fn new(generated_at: DateTime<Utc>, window: TimeRange) -> Self {
        Self {
            generated_at,
            window,
            total_instruments: 0,
            checks: Vec::new(),
            summary: ReportSummary::default(),
            skipped: Vec::new(),
        }
    }

    pub fn extend(&mut self, results: Vec<CheckResult>) {
        for r in &results {
            self.summary.record(r.status);
        }
        self.checks.extend(results);
    }

    /// 특정 종목의 결과.
    pub fn for_instrument<'a>(
        &'a self,
        symbol: &'a str,
        venue: &'a str,
    ) -> impl Iterator<Item = &'a CheckResult> + 'a {
        self.checks
            .iter()
            .filter(move |c| c.symbol == symbol && c.venue == venue)
    }
}
