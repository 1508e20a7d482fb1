//! 저장소 기반 품질 검사기.
//!
//! 쓰기 경로와 독립적으로 저장소를 읽기만 하며, 동기화 잠금을 잡지 않습니다.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use market_core::{Interval, TimeRange};
use market_data::{InstrumentRegistry, MarketStore};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::checks;
use crate::error::{QualityError, Result};
use crate::types::{CheckResult, QualityReport, SkippedInstrument};

/// 검사기 설정.
#[derive(Debug, Clone)]
pub struct QualityConfig {
    /// 검사 구간 (최근 N일)
    pub window_days: i64,
    /// 검사 대상 봉 간격
    pub interval: Interval,
    /// 리포트 생성 시 동시 검사 종목 수
    pub concurrency: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            interval: Interval::D1,
            concurrency: 4,
        }
    }
}

/// 데이터 품질 검사기.
#[derive(Clone)]
pub struct QualityChecker {
    store: MarketStore,
    registry: Arc<dyn InstrumentRegistry>,
    config: QualityConfig,
}

impl QualityChecker {
    pub fn new(store: MarketStore, registry: Arc<dyn InstrumentRegistry>) -> Self {
        Self::with_config(store, registry, QualityConfig::default())
    }

    pub fn with_config(
        store: MarketStore,
        registry: Arc<dyn InstrumentRegistry>,
        config: QualityConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    fn window(&self, now: DateTime<Utc>) -> TimeRange {
        TimeRange::trailing_days(now, self.config.window_days)
    }

    /// 완전도 검사.
    pub async fn check_completeness(
        &self,
        symbol: &str,
        venue: &str,
        range: TimeRange,
    ) -> Result<CheckResult> {
        let actual = self
            .store
            .count_bars(symbol, venue, self.config.interval, range)
            .await?;
        Ok(checks::completeness(actual, range).into_result(symbol, venue, Utc::now()))
    }

    /// 연속성 검사.
    pub async fn check_continuity(
        &self,
        symbol: &str,
        venue: &str,
        range: TimeRange,
    ) -> Result<CheckResult> {
        let bars = self
            .store
            .read_bars(symbol, venue, self.config.interval, range)
            .await?;
        Ok(checks::continuity(&bars, self.config.interval).into_result(symbol, venue, Utc::now()))
    }

    /// 이상치 검사.
    pub async fn check_anomalies(
        &self,
        symbol: &str,
        venue: &str,
        range: TimeRange,
    ) -> Result<CheckResult> {
        let bars = self
            .store
            .read_bars(symbol, venue, self.config.interval, range)
            .await?;
        Ok(checks::anomalies(&bars).into_result(symbol, venue, Utc::now()))
    }

    /// 신선도 검사.
    pub async fn check_freshness(&self, symbol: &str, venue: &str) -> Result<CheckResult> {
        self.check_freshness_at(symbol, venue, Utc::now()).await
    }

    pub async fn check_freshness_at(
        &self,
        symbol: &str,
        venue: &str,
        now: DateTime<Utc>,
    ) -> Result<CheckResult> {
        let latest = self
            .store
            .latest_bar(symbol, venue, self.config.interval)
            .await?;
        Ok(checks::freshness(latest.map(|b| b.timestamp), now).into_result(symbol, venue, now))
    }

    /// 한 종목에 대해 네 가지 검사를 고정 순서로 실행합니다.
    ///
    /// 순서: completeness → continuity → anomalies → freshness.
    pub async fn check_instrument(&self, symbol: &str, venue: &str) -> Result<Vec<CheckResult>> {
        self.check_instrument_at(symbol, venue, Utc::now()).await
    }

    #[instrument(skip(self), fields(interval = %self.config.interval))]
    pub async fn check_instrument_at(
        &self,
        symbol: &str,
        venue: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<CheckResult>> {
        let range = self.window(now);
        let interval = self.config.interval;

        let count = self.store.count_bars(symbol, venue, interval, range).await?;
        // 연속성/이상치 검사는 같은 봉을 공유
        let bars = self.store.read_bars(symbol, venue, interval, range).await?;
        let latest = self.store.latest_bar(symbol, venue, interval).await?;

        let results = vec![
            checks::completeness(count, range),
            checks::continuity(&bars, interval),
            checks::anomalies(&bars),
            checks::freshness(latest.map(|b| b.timestamp), now),
        ]
        .into_iter()
        .map(|f| f.into_result(symbol, venue, now))
        .collect::<Vec<_>>();

        debug!(
            bars = bars.len(),
            statuses = ?results.iter().map(|r| r.status).collect::<Vec<_>>(),
            "종목 품질 검사 완료"
        );
        Ok(results)
    }

    /// 등록된 종목인지 확인한 뒤 검사합니다.
    pub async fn check_registered(&self, symbol: &str, venue: &str) -> Result<Vec<CheckResult>> {
        if self.registry.get(symbol, venue).await?.is_none() {
            return Err(QualityError::UnknownInstrument {
                symbol: symbol.to_string(),
                venue: venue.to_string(),
            });
        }
        self.check_instrument(symbol, venue).await
    }

    /// 전체 활성 종목 리포트.
    pub async fn generate_report(&self) -> Result<QualityReport> {
        self.generate_report_at(Utc::now()).await
    }

    /// 종목별 검사 실패는 리포트에서 제외하고 `skipped`에 기록합니다.
    #[instrument(skip(self))]
    pub async fn generate_report_at(&self, now: DateTime<Utc>) -> Result<QualityReport> {
        let instruments = self.registry.list_active().await?;
        let mut report = QualityReport::new(now, self.window(now));
        report.total_instruments = instruments.len();

        // 입력 순서 유지
        let outcomes: Vec<_> = stream::iter(instruments)
            .map(|inst| {
                let checker = self.clone();
                async move {
                    let result = checker
                        .check_instrument_at(&inst.symbol, &inst.venue, now)
                        .await;
                    (inst, result)
                }
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        for (inst, outcome) in outcomes {
            match outcome {
                Ok(results) => report.extend(results),
                Err(e) => {
                    warn!(symbol = %inst.symbol, venue = %inst.venue, error = %e, "품질 검사 실패, 리포트에서 제외");
                    report.skipped.push(SkippedInstrument {
                        symbol: inst.symbol,
                        venue: inst.venue,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            instruments = report.total_instruments,
            pass = report.summary.pass_count,
            warning = report.summary.warning_count,
            error = report.summary.error_count,
            skipped = report.skipped.len(),
            "품질 리포트 생성"
        );
        Ok(report)
    }
}
