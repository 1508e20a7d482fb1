//! 기술 지표 동기화 모듈.
//!
//! 저장된 봉에서 지표를 다시 계산하고, 종류별 최신 지표 이후 시점만 저장합니다.

use chrono::{DateTime, Utc};
use market_core::{IndicatorKind, Interval, TimeRange};
use market_data::{InstrumentRegistry, MarketStore};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::indicators::IndicatorCalculator;
use crate::error::Result;
use crate::stats::CollectionStats;

/// 계산에 필요한 최소 봉 수 (MA5)
const MIN_BARS: usize = 5;

/// 지표 동기화 설정.
#[derive(Debug, Clone)]
pub struct IndicatorSyncOptions {
    /// 지표 계산에 사용하는 봉 간격
    pub interval: Interval,
    /// 재계산 시 읽는 봉 기간 (일). EMA 수렴을 위해 여유 있게 잡습니다.
    pub lookback_days: i64,
}

impl Default for IndicatorSyncOptions {
    fn default() -> Self {
        Self {
            interval: Interval::D1,
            lookback_days: 400,
        }
    }
}

/// 지표 동기화기.
#[derive(Clone)]
pub struct IndicatorSync {
    store: MarketStore,
    options: IndicatorSyncOptions,
    calc: IndicatorCalculator,
}

impl IndicatorSync {
    pub fn new(store: MarketStore) -> Self {
        Self::with_options(store, IndicatorSyncOptions::default())
    }

    pub fn with_options(store: MarketStore, options: IndicatorSyncOptions) -> Self {
        Self {
            store,
            options,
            calc: IndicatorCalculator::new(),
        }
    }

    pub fn interval(&self) -> Interval {
        self.options.interval
    }

    /// 한 종목의 지표를 재계산해 새 시점만 저장하고 저장 수를 반환합니다.
    pub async fn sync_instrument(
        &self,
        symbol: &str,
        venue: &str,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let range = TimeRange::trailing_days(now, self.options.lookback_days);
        let bars = self
            .store
            .read_bars(symbol, venue, self.options.interval, range)
            .await?;
        if bars.len() < MIN_BARS {
            debug!(symbol, venue, bars = bars.len(), "봉 데이터 부족, 지표 계산 생략");
            return Ok(0);
        }

        let mut computed = self.calc.compute_all(&bars);

        for kind in IndicatorKind::ALL {
            let latest = self
                .store
                .latest_indicator(symbol, venue, kind)
                .await?
                .map(|i| i.timestamp);
            if let Some(latest) = latest {
                computed.retain(|ind| ind.kind != kind || ind.timestamp > latest);
            }
        }

        if computed.is_empty() {
            return Ok(0);
        }

        let outcome = self.store.write_indicators(&computed).await?;
        if !outcome.is_complete() {
            warn!(
                symbol,
                venue,
                written = outcome.written,
                failed = outcome.failures.len(),
                "일부 지표 저장 실패"
            );
        }
        debug!(symbol, venue, written = outcome.written, "지표 저장 완료");
        Ok(outcome.written)
    }

    /// 활성 종목 전체 지표 동기화.
    pub async fn sync_registered(
        &self,
        registry: &dyn InstrumentRegistry,
        now: DateTime<Utc>,
    ) -> Result<CollectionStats> {
        let start = Instant::now();
        let mut stats = CollectionStats::new();
        let instruments = registry.list_active().await?;
        stats.total = instruments.len();

        for inst in &instruments {
            match self.sync_instrument(&inst.symbol, &inst.venue, now).await {
                Ok(0) => stats.empty += 1,
                Ok(n) => {
                    stats.success += 1;
                    stats.total_bars += n;
                }
                Err(e) => {
                    warn!(instrument = %inst.full_code(), error = %e, "지표 동기화 실패");
                    stats.errors += 1;
                }
            }
        }

        stats.elapsed = start.elapsed();
        info!(instruments = stats.total, indicators = stats.total_bars, "지표 동기화 완료");
        Ok(stats)
    }
}
