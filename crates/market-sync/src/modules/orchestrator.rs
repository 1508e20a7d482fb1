//! 봉 동기화 오케스트레이터.
//!
//! # 종목 단위 흐름
//!
//! 1. 업스트림 조회 (타임아웃 + 지수 백오프 재시도, 종료 신호와 경합)
//! 2. 요청 구간/커서 이후 봉만 남기고 유효성 검증
//! 3. 잘못된 봉 비율이 임계값을 넘으면 배치 전체 거부
//! 4. 타임스탬프 중복 제거(마지막 값 우선) 후 오름차순 저장, 첫 실패에서 중단
//! 5. 실제 저장된 최대 시각으로 커서 갱신
//!
//! 종목별 실패는 [`FleetReport`]에 기록될 뿐 다른 종목 처리에 영향을 주지 않습니다.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use market_core::{Bar, Instrument, Interval, TimeRange};
use market_data::{BarFetcher, FetchError, InstrumentRegistry, MarketStore};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::cursor::SyncStateTracker;
use super::indicator_sync::IndicatorSync;
use super::lock::{KeyedLocks, LockKey};
use super::retry::RetryPolicy;
use crate::config::SyncSettings;
use crate::error::{Result, SyncError};
use crate::stats::CollectionStats;

/// 오케스트레이터 실행 옵션.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub retry: RetryPolicy,
    pub fetch_timeout: Duration,
    pub write_timeout: Duration,
    /// 종목 처리 후 대기
    pub request_delay: Duration,
    pub max_concurrency: usize,
    /// 이 비율을 초과하면 배치 거부
    pub max_invalid_ratio: f64,
    /// 커서가 없을 때 조회 기간 (일)
    pub lookback_days: i64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&SyncSettings::default())
    }
}

impl From<&SyncSettings> for SyncOptions {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            retry: RetryPolicy::new(
                settings.max_attempts,
                settings.backoff_base(),
                settings.backoff_max(),
            ),
            fetch_timeout: settings.fetch_timeout(),
            write_timeout: settings.write_timeout(),
            request_delay: settings.request_delay(),
            max_concurrency: settings.max_concurrency.max(1),
            max_invalid_ratio: settings.max_invalid_ratio,
            lookback_days: settings.lookback_days,
        }
    }
}

/// 종목별 처리 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// 봉 1개 이상 저장
    Succeeded,
    /// 조회 성공, 저장할 새 봉 없음
    Empty,
    /// 실행하지 않음 (잠금 보유 중, 종료 신호)
    Skipped,
    Failed,
}

/// 종목별 처리 결과.
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentOutcome {
    pub status: OutcomeStatus,
    pub bars_written: usize,
    pub invalid_bars: usize,
    /// 처리 후 커서
    pub cursor: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicators_written: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl InstrumentOutcome {
    fn from_batch(batch: BatchSummary) -> Self {
        let status = if batch.written > 0 {
            OutcomeStatus::Succeeded
        } else {
            OutcomeStatus::Empty
        };
        Self {
            status,
            bars_written: batch.written,
            invalid_bars: batch.invalid,
            cursor: batch.cursor,
            indicators_written: None,
            error: None,
            error_code: None,
        }
    }

    fn failed(err: &SyncError) -> Self {
        Self {
            status: OutcomeStatus::Failed,
            bars_written: 0,
            invalid_bars: 0,
            cursor: None,
            indicators_written: None,
            error: Some(err.to_string()),
            error_code: Some(err.code().to_string()),
        }
    }

    fn skipped(reason: &str) -> Self {
        Self {
            status: OutcomeStatus::Skipped,
            bars_written: 0,
            invalid_bars: 0,
            cursor: None,
            indicators_written: None,
            error: Some(reason.to_string()),
            error_code: None,
        }
    }
}

/// 전체 종목 동기화 결과.
#[derive(Debug, Clone, Serialize)]
pub struct FleetReport {
    pub interval: Interval,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `SYMBOL.VENUE` → 결과
    pub outcomes: BTreeMap<String, InstrumentOutcome>,
    pub stats: CollectionStats,
}

impl FleetReport {
    pub fn status_of(&self, full_code: &str) -> Option<OutcomeStatus> {
        self.outcomes.get(full_code).map(|o| o.status)
    }

    fn from_outcomes(
        interval: Interval,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        outcomes: Vec<(Instrument, InstrumentOutcome)>,
    ) -> Self {
        let mut stats = CollectionStats::new();
        stats.total = outcomes.len();
        stats.elapsed = elapsed;

        let mut map = BTreeMap::new();
        for (inst, outcome) in outcomes {
            match outcome.status {
                OutcomeStatus::Succeeded => stats.success += 1,
                OutcomeStatus::Empty => stats.empty += 1,
                OutcomeStatus::Skipped => stats.skipped += 1,
                OutcomeStatus::Failed => stats.errors += 1,
            }
            stats.total_bars += outcome.bars_written;
            stats.invalid_bars += outcome.invalid_bars;
            map.insert(inst.full_code(), outcome);
        }

        Self {
            interval,
            started_at,
            finished_at: Utc::now(),
            outcomes: map,
            stats,
        }
    }
}

/// 단일 배치 처리 요약.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// 업스트림에서 받은 봉 수
    pub fetched: usize,
    /// 검증 실패로 제외된 봉 수
    pub invalid: usize,
    /// 저장된 봉 수
    pub written: usize,
    pub cursor: Option<DateTime<Utc>>,
}

/// 증분 실행 중복 방지 플래그. drop 시 해제됩니다.
struct RunGuard(Arc<AtomicBool>);

impl RunGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 봉 동기화 오케스트레이터.
#[derive(Clone)]
pub struct SyncOrchestrator {
    registry: Arc<dyn InstrumentRegistry>,
    fetcher: Arc<dyn BarFetcher>,
    store: MarketStore,
    tracker: SyncStateTracker,
    locks: Arc<KeyedLocks>,
    options: SyncOptions,
    shutdown: CancellationToken,
    incremental_running: Arc<AtomicBool>,
    indicators: Option<IndicatorSync>,
}

impl SyncOrchestrator {
    pub fn new(
        registry: Arc<dyn InstrumentRegistry>,
        fetcher: Arc<dyn BarFetcher>,
        store: MarketStore,
        options: SyncOptions,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            fetcher,
            tracker: SyncStateTracker::new(store.clone()),
            store,
            locks: Arc::new(KeyedLocks::new()),
            options,
            shutdown,
            incremental_running: Arc::new(AtomicBool::new(false)),
            indicators: None,
        }
    }

    /// 증분 동기화 후 지표 재계산을 켭니다.
    pub fn with_indicator_sync(mut self, indicators: IndicatorSync) -> Self {
        self.indicators = Some(indicators);
        self
    }

    /// 잠금/실행 상태는 공유하고 취소 토큰만 바꾼 사본.
    ///
    /// 작업 단위 취소에 사용합니다.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        let mut cloned = self.clone();
        cloned.shutdown = token;
        cloned
    }

    pub fn store(&self) -> &MarketStore {
        &self.store
    }

    pub fn registry(&self) -> &Arc<dyn InstrumentRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &SyncStateTracker {
        &self.tracker
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// 증분 동기화가 실행 중인지 여부.
    pub fn is_incremental_running(&self) -> bool {
        self.incremental_running.load(Ordering::Acquire)
    }

    /// 한 종목의 `[start, end)` 구간을 동기화하고 저장한 봉 수를 반환합니다.
    pub async fn sync_instrument(
        &self,
        symbol: &str,
        venue: &str,
        interval: Interval,
        range: TimeRange,
    ) -> Result<usize> {
        self.sync_instrument_detailed(symbol, venue, interval, range)
            .await
            .map(|b| b.written)
    }

    /// [`sync_instrument`](Self::sync_instrument)와 같지만 배치 요약을 반환합니다.
    pub async fn sync_instrument_detailed(
        &self,
        symbol: &str,
        venue: &str,
        interval: Interval,
        range: TimeRange,
    ) -> Result<BatchSummary> {
        if symbol.trim().is_empty() || venue.trim().is_empty() {
            return Err(SyncError::InvalidInput("symbol과 venue는 필수입니다".into()));
        }
        let _guard = self
            .locks
            .acquire(LockKey::new(symbol, venue, interval))
            .await;
        self.sync_window(symbol, venue, interval, range, None).await
    }

    /// 활성 종목 전체의 `[start, end)` 구간 동기화.
    #[instrument(skip(self))]
    pub async fn sync_fleet(&self, interval: Interval, range: TimeRange) -> Result<FleetReport> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let instruments = self.registry.list_active().await?;
        info!(instruments = instruments.len(), "전체 동기화 시작");

        let outcomes: Vec<(Instrument, InstrumentOutcome)> = stream::iter(instruments)
            .map(|inst| {
                let this = self.clone();
                async move {
                    let outcome = if this.shutdown.is_cancelled() {
                        InstrumentOutcome::skipped("cancelled")
                    } else {
                        let result = this
                            .sync_instrument_detailed(&inst.symbol, &inst.venue, interval, range)
                            .await;
                        this.pace().await;
                        this.record(&inst, result)
                    };
                    (inst, outcome)
                }
            })
            .buffer_unordered(self.options.max_concurrency)
            .collect()
            .await;

        let report = FleetReport::from_outcomes(interval, started_at, timer.elapsed(), outcomes);
        report.stats.log_summary("sync_fleet");
        Ok(report)
    }

    /// 커서 이후 봉을 가져오는 증분 동기화.
    pub async fn incremental_update(&self, interval: Interval) -> Result<FleetReport> {
        self.incremental_update_at(interval, Utc::now()).await
    }

    /// `now` 기준 증분 동기화.
    ///
    /// - 커서 있음: `[cursor + interval, now)`
    /// - 커서 없음: `[now - lookback, now)`
    ///
    /// 봉 시각은 시작 시각이므로 `now`에 시작한 봉은 아직 진행 중이며 다음 실행에서 가져옵니다.
    ///
    /// 다른 증분 실행이 진행 중이면 [`SyncError::Busy`]를 반환하고,
    /// 잠금이 잡힌 종목은 `skipped`로 기록합니다.
    #[instrument(skip(self))]
    pub async fn incremental_update_at(
        &self,
        interval: Interval,
        now: DateTime<Utc>,
    ) -> Result<FleetReport> {
        let _run = RunGuard::try_acquire(&self.incremental_running)
            .ok_or_else(|| SyncError::Busy("incremental update".into()))?;

        let started_at = Utc::now();
        let timer = Instant::now();
        let instruments = self.registry.list_active().await?;
        info!(instruments = instruments.len(), %now, "증분 동기화 시작");

        let outcomes: Vec<(Instrument, InstrumentOutcome)> = stream::iter(instruments)
            .map(|inst| {
                let this = self.clone();
                async move {
                    let outcome = this.incremental_one(&inst, interval, now).await;
                    (inst, outcome)
                }
            })
            .buffer_unordered(self.options.max_concurrency)
            .collect()
            .await;

        let report = FleetReport::from_outcomes(interval, started_at, timer.elapsed(), outcomes);
        report.stats.log_summary("incremental_update");
        Ok(report)
    }

    async fn incremental_one(
        &self,
        inst: &Instrument,
        interval: Interval,
        now: DateTime<Utc>,
    ) -> InstrumentOutcome {
        if self.shutdown.is_cancelled() {
            return InstrumentOutcome::skipped("cancelled");
        }

        let key = LockKey::new(&inst.symbol, &inst.venue, interval);
        let Some(_guard) = self.locks.try_acquire(key).await else {
            debug!(instrument = %inst.full_code(), "다른 작업이 동기화 중, 건너뜀");
            return InstrumentOutcome::skipped("busy");
        };

        let result = self.incremental_window(inst, interval, now).await;
        let mut outcome = match result {
            Ok(None) => {
                let cursor = self
                    .tracker
                    .cursor(&inst.symbol, &inst.venue, interval)
                    .await
                    .ok()
                    .flatten();
                InstrumentOutcome::from_batch(BatchSummary {
                    cursor,
                    ..Default::default()
                })
            }
            Ok(Some(batch)) => InstrumentOutcome::from_batch(batch),
            Err(e) => self.record(inst, Err(e)),
        };

        if outcome.status == OutcomeStatus::Succeeded {
            if let Some(indicators) = &self.indicators {
                if indicators.interval() == interval {
                    match indicators.sync_instrument(&inst.symbol, &inst.venue, now).await {
                        Ok(written) => outcome.indicators_written = Some(written),
                        Err(e) => {
                            warn!(instrument = %inst.full_code(), error = %e, "지표 재계산 실패")
                        }
                    }
                }
            }
        }

        self.pace().await;
        outcome
    }

    /// 조회 구간이 비어 있으면 `Ok(None)`.
    async fn incremental_window(
        &self,
        inst: &Instrument,
        interval: Interval,
        now: DateTime<Utc>,
    ) -> Result<Option<BatchSummary>> {
        let cursor = self
            .tracker
            .cursor(&inst.symbol, &inst.venue, interval)
            .await?;
        let start = match cursor {
            Some(c) => c + interval.duration(),
            None => now - ChronoDuration::days(self.options.lookback_days),
        };
        if start >= now {
            debug!(instrument = %inst.full_code(), ?cursor, "이미 최신 상태");
            return Ok(None);
        }
        let range = TimeRange::new(start, now)?;
        self.sync_window(&inst.symbol, &inst.venue, interval, range, cursor)
            .await
            .map(Some)
    }

    /// 잠금을 보유한 상태에서 호출합니다.
    async fn sync_window(
        &self,
        symbol: &str,
        venue: &str,
        interval: Interval,
        range: TimeRange,
        after: Option<DateTime<Utc>>,
    ) -> Result<BatchSummary> {
        if range.is_empty() {
            return Ok(BatchSummary {
                cursor: after,
                ..Default::default()
            });
        }
        if self.shutdown.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let fetched = self.fetch_with_retry(symbol, venue, interval, range).await?;
        let prepared = prepare_batch(fetched, range, after, self.options.max_invalid_ratio)?;
        debug!(
            symbol,
            venue,
            %interval,
            fetched = prepared.fetched,
            invalid = prepared.invalid,
            valid = prepared.bars.len(),
            "배치 검증 완료"
        );

        if prepared.bars.is_empty() {
            return Ok(BatchSummary {
                fetched: prepared.fetched,
                invalid: prepared.invalid,
                written: 0,
                cursor: after,
            });
        }

        // 저장은 종료 신호와 경합하지 않음 (타임아웃만 적용)
        let outcome = tokio::time::timeout(
            self.options.write_timeout,
            self.store.write_bars_ordered(&prepared.bars),
        )
        .await
        .map_err(|_| SyncError::Timeout {
            operation: "write",
            timeout: self.options.write_timeout,
        })??;

        let failed: HashSet<DateTime<Utc>> =
            outcome.failures.iter().map(|f| f.timestamp).collect();
        let max_written = prepared
            .bars
            .iter()
            .map(|b| b.timestamp)
            .filter(|ts| !failed.contains(ts))
            .max();

        let cursor = match max_written {
            Some(ts) => Some(
                self.tracker
                    .advance(symbol, venue, interval, ts)
                    .await?
                    .cursor(),
            ),
            None => after,
        };

        if !outcome.is_complete() {
            return Err(SyncError::PartialWrite {
                written: outcome.written,
                failed: outcome.failures.len(),
            });
        }

        info!(
            symbol,
            venue,
            %interval,
            written = outcome.written,
            cursor = ?cursor,
            "봉 저장 완료"
        );
        Ok(BatchSummary {
            fetched: prepared.fetched,
            invalid: prepared.invalid,
            written: outcome.written,
            cursor,
        })
    }

    async fn fetch_with_retry(
        &self,
        symbol: &str,
        venue: &str,
        interval: Interval,
        range: TimeRange,
    ) -> Result<Vec<Bar>> {
        let timeout = self.options.fetch_timeout;
        let fetcher = &self.fetcher;
        self.options
            .retry
            .run("fetch_bars", &self.shutdown, move || async move {
                tokio::time::timeout(timeout, fetcher.fetch_bars(symbol, venue, interval, range))
                    .await
                    .map_err(|_| FetchError::Timeout(timeout))?
            })
            .await
    }

    fn record(&self, inst: &Instrument, result: Result<BatchSummary>) -> InstrumentOutcome {
        match result {
            Ok(batch) => InstrumentOutcome::from_batch(batch),
            Err(SyncError::Cancelled) => InstrumentOutcome::skipped("cancelled"),
            Err(e) => {
                warn!(
                    instrument = %inst.full_code(),
                    code = e.code(),
                    error = %e,
                    "종목 동기화 실패"
                );
                InstrumentOutcome::failed(&e)
            }
        }
    }

    /// 종목 간 딜레이 (종료 신호 시 즉시 반환).
    async fn pace(&self) {
        if self.options.request_delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = tokio::time::sleep(self.options.request_delay) => {}
        }
    }
}

/// 검증/정리된 배치.
#[derive(Debug)]
struct PreparedBatch {
    fetched: usize,
    invalid: usize,
    bars: Vec<Bar>,
}

/// 구간 밖 봉과 커서 이전 봉을 제외하고 검증합니다.
///
/// 잘못된 봉 비율은 구간 안의 봉을 기준으로 계산합니다.
fn prepare_batch(
    fetched: Vec<Bar>,
    range: TimeRange,
    after: Option<DateTime<Utc>>,
    max_invalid_ratio: f64,
) -> Result<PreparedBatch> {
    let fetched_count = fetched.len();
    let in_window: Vec<Bar> = fetched
        .into_iter()
        .filter(|b| range.contains(b.timestamp) && after.map_or(true, |c| b.timestamp > c))
        .collect();

    let total = in_window.len();
    let mut invalid = 0;
    let mut by_ts: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();
    for bar in in_window {
        match bar.validate() {
            Ok(()) => {
                by_ts.insert(bar.timestamp, bar);
            }
            Err(e) => {
                debug!(symbol = %bar.symbol, ts = %bar.timestamp, reason = e.code(), "잘못된 봉 제외");
                invalid += 1;
            }
        }
    }

    if total > 0 && invalid as f64 / total as f64 > max_invalid_ratio {
        return Err(SyncError::BatchRejected {
            invalid,
            total,
            threshold: max_invalid_ratio,
        });
    }

    Ok(PreparedBatch {
        fetched: fetched_count,
        invalid,
        bars: by_ts.into_values().collect(),
    })
}
