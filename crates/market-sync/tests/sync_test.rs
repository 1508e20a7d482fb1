//! SyncOrchestrator / Scheduler 통합 테스트 (인메모리 저장소 + 스크립트 업스트림).

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use market_core::{Bar, Instrument, Interval, TimeRange};
use market_data::{
    BarFetcher, DataError, FetchError, InstrumentRegistry, MarketStore, MemoryBackend,
    StaticRegistry,
};
use market_sync::config::ScheduleConfig;
use market_sync::modules::{
    IndicatorSync, OutcomeStatus, RetryPolicy, Scheduler, SyncOptions, SyncOrchestrator,
    TickOutcome,
};
use market_sync::SyncError;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// 심볼별로 준비된 봉을 돌려주는 업스트림.
#[derive(Default)]
struct ScriptedFetcher {
    bars: Mutex<HashMap<String, Vec<Bar>>>,
    delays: HashMap<String, Duration>,
    /// 해당 심볼 조회는 알림을 받을 때까지 대기
    gates: HashMap<String, Arc<Notify>>,
    entered: Notify,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn push(&self, bars: Vec<Bar>) {
        let mut map = self.bars.lock().unwrap();
        for bar in bars {
            map.entry(bar.symbol.clone()).or_default().push(bar);
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BarFetcher for ScriptedFetcher {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        _venue: &str,
        _interval: Interval,
        range: TimeRange,
    ) -> Result<Vec<Bar>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        if let Some(gate) = self.gates.get(symbol) {
            gate.notified().await;
        }
        if let Some(delay) = self.delays.get(symbol) {
            tokio::time::sleep(*delay).await;
        }
        let bars = self
            .bars
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default();
        Ok(bars.into_iter().filter(|b| range.contains(b.timestamp)).collect())
    }
}

/// `down`이 켜져 있으면 조회에 실패하는 레지스트리.
struct FlakyRegistry {
    inner: StaticRegistry,
    down: AtomicBool,
}

#[async_trait]
impl InstrumentRegistry for FlakyRegistry {
    async fn list_active(&self) -> market_data::Result<Vec<Instrument>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(DataError::Unavailable("registry down".to_string()));
        }
        self.inner.list_active().await
    }

    async fn get(&self, symbol: &str, venue: &str) -> market_data::Result<Option<Instrument>> {
        self.inner.get(symbol, venue).await
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 28, 0, 0, 0).unwrap()
}

fn bar(symbol: &str, ts: DateTime<Utc>) -> Bar {
    let p = Decimal::from(10);
    Bar::new(
        symbol,
        "SH",
        Interval::D1,
        ts,
        p,
        p + Decimal::ONE,
        p - Decimal::ONE,
        p,
        Decimal::from(100),
    )
}

/// low > high 인 잘못된 봉.
fn broken_bar(symbol: &str, ts: DateTime<Utc>) -> Bar {
    let mut b = bar(symbol, ts);
    b.low = Decimal::from(20);
    b
}

/// `end` 이전 `days`일의 일봉.
fn daily_bars(symbol: &str, end: DateTime<Utc>, days: i64) -> Vec<Bar> {
    (1..=days)
        .rev()
        .map(|d| bar(symbol, end - ChronoDuration::days(d)))
        .collect()
}

fn options() -> SyncOptions {
    SyncOptions {
        retry: RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2)),
        fetch_timeout: Duration::from_secs(5),
        write_timeout: Duration::from_secs(5),
        request_delay: Duration::ZERO,
        max_concurrency: 4,
        max_invalid_ratio: 0.5,
        lookback_days: 30,
    }
}

struct Harness {
    backend: Arc<MemoryBackend>,
    store: MarketStore,
    fetcher: Arc<ScriptedFetcher>,
    orchestrator: SyncOrchestrator,
}

fn harness(symbols: &[&str], fetcher: ScriptedFetcher) -> Harness {
    let backend = Arc::new(MemoryBackend::new());
    let store = MarketStore::new(backend.clone());
    let registry: Arc<dyn InstrumentRegistry> = Arc::new(StaticRegistry::new(
        symbols.iter().map(|s| Instrument::new(*s, "SH")).collect(),
    ));
    let fetcher = Arc::new(fetcher);
    let orchestrator = SyncOrchestrator::new(
        registry,
        fetcher.clone(),
        store.clone(),
        options(),
        CancellationToken::new(),
    );
    Harness {
        backend,
        store,
        fetcher,
        orchestrator,
    }
}

#[tokio::test]
async fn bootstrap_then_rerun_is_empty() {
    let h = harness(&["600519"], ScriptedFetcher::default());
    h.fetcher.push(daily_bars("600519", now(), 10));

    let report = h
        .orchestrator
        .incremental_update_at(Interval::D1, now())
        .await
        .unwrap();
    let outcome = &report.outcomes["600519.SH"];
    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    assert_eq!(outcome.bars_written, 10);
    assert_eq!(outcome.cursor, Some(now() - ChronoDuration::days(1)));
    assert_eq!(report.stats.success, 1);

    // 커서 + 1일 == now 이므로 조회 없이 empty
    let calls = h.fetcher.calls();
    let report = h
        .orchestrator
        .incremental_update_at(Interval::D1, now())
        .await
        .unwrap();
    assert_eq!(report.status_of("600519.SH"), Some(OutcomeStatus::Empty));
    assert_eq!(report.stats.empty, 1);
    assert_eq!(h.fetcher.calls(), calls);
    assert_eq!(
        h.store
            .count_bars("600519", "SH", Interval::D1, TimeRange::trailing_days(now(), 365))
            .await
            .unwrap(),
        10
    );
}

#[tokio::test]
async fn cursor_only_moves_forward() {
    let h = harness(&["600519"], ScriptedFetcher::default());
    h.fetcher.push(daily_bars("600519", now(), 5));
    h.orchestrator
        .incremental_update_at(Interval::D1, now())
        .await
        .unwrap();

    // 다음 실행: 새 봉 2개 + 커서 이전의 늦게 도착한 봉
    h.fetcher.push(vec![
        bar("600519", now()),
        bar("600519", now() + ChronoDuration::days(1)),
        bar("600519", now() - ChronoDuration::days(20)),
    ]);
    let later = now() + ChronoDuration::days(2);
    let report = h
        .orchestrator
        .incremental_update_at(Interval::D1, later)
        .await
        .unwrap();
    let outcome = &report.outcomes["600519.SH"];
    assert_eq!(outcome.bars_written, 2);
    assert_eq!(outcome.cursor, Some(now() + ChronoDuration::days(1)));

    let cursor = h
        .orchestrator
        .tracker()
        .cursor("600519", "SH", Interval::D1)
        .await
        .unwrap();
    assert_eq!(cursor, Some(now() + ChronoDuration::days(1)));
}

#[tokio::test(start_paused = true)]
async fn slow_instrument_does_not_block_fleet() {
    let mut fetcher = ScriptedFetcher::default();
    fetcher
        .delays
        .insert("000001".to_string(), Duration::from_secs(60));
    let h = harness(&["000001", "600519"], fetcher);
    h.fetcher.push(daily_bars("000001", now(), 3));
    h.fetcher.push(daily_bars("600519", now(), 3));

    let report = h
        .orchestrator
        .incremental_update_at(Interval::D1, now())
        .await
        .unwrap();

    let slow = &report.outcomes["000001.SH"];
    assert_eq!(slow.status, OutcomeStatus::Failed);
    assert_eq!(slow.error_code.as_deref(), Some("FETCH_FAILED"));
    assert_eq!(report.status_of("600519.SH"), Some(OutcomeStatus::Succeeded));
    assert_eq!(report.stats.errors, 1);
    assert_eq!(report.stats.success, 1);
    // 2회 시도 + 1회
    assert_eq!(h.fetcher.calls(), 3);
}

#[tokio::test]
async fn mostly_invalid_batch_is_rejected() {
    let h = harness(&["600519"], ScriptedFetcher::default());
    let base = now() - ChronoDuration::days(5);
    h.fetcher.push(vec![
        bar("600519", base),
        broken_bar("600519", base + ChronoDuration::days(1)),
        broken_bar("600519", base + ChronoDuration::days(2)),
        broken_bar("600519", base + ChronoDuration::days(3)),
    ]);

    let report = h
        .orchestrator
        .incremental_update_at(Interval::D1, now())
        .await
        .unwrap();
    let outcome = &report.outcomes["600519.SH"];
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.error_code.as_deref(), Some("BATCH_REJECTED"));
    assert!(h.backend.is_empty().await);
}

#[tokio::test]
async fn partial_write_keeps_cursor_at_last_stored_bar() {
    let h = harness(&["600519"], ScriptedFetcher::default());
    h.fetcher.push(daily_bars("600519", now(), 5));
    let last = now() - ChronoDuration::days(1);
    h.backend.reject_timestamp(last).await;

    let report = h
        .orchestrator
        .incremental_update_at(Interval::D1, now())
        .await
        .unwrap();
    let outcome = &report.outcomes["600519.SH"];
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.error_code.as_deref(), Some("PARTIAL_WRITE"));
    let cursor = h
        .orchestrator
        .tracker()
        .cursor("600519", "SH", Interval::D1)
        .await
        .unwrap();
    assert_eq!(cursor, Some(now() - ChronoDuration::days(2)));

    // 장애 해소 후 누락된 봉을 다시 가져옴
    h.backend.clear_rejections().await;
    let report = h
        .orchestrator
        .incremental_update_at(Interval::D1, now())
        .await
        .unwrap();
    let outcome = &report.outcomes["600519.SH"];
    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    assert_eq!(outcome.bars_written, 1);
    assert_eq!(outcome.cursor, Some(last));
}

#[tokio::test]
async fn failed_write_mid_batch_is_refetched_next_run() {
    let h = harness(&["600519"], ScriptedFetcher::default());
    h.fetcher.push(daily_bars("600519", now(), 5));
    let hole = now() - ChronoDuration::days(3);
    h.backend.reject_timestamp(hole).await;

    let report = h
        .orchestrator
        .incremental_update_at(Interval::D1, now())
        .await
        .unwrap();
    let outcome = &report.outcomes["600519.SH"];
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.error_code.as_deref(), Some("PARTIAL_WRITE"));

    // 실패 지점 이후 봉은 쓰지 않으므로 커서는 실패 시각 앞에 머묾
    let cursor = h
        .orchestrator
        .tracker()
        .cursor("600519", "SH", Interval::D1)
        .await
        .unwrap();
    assert_eq!(cursor, Some(now() - ChronoDuration::days(4)));

    h.backend.clear_rejections().await;
    let report = h
        .orchestrator
        .incremental_update_at(Interval::D1, now())
        .await
        .unwrap();
    let outcome = &report.outcomes["600519.SH"];
    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    assert_eq!(outcome.bars_written, 3);
    assert_eq!(outcome.cursor, Some(now() - ChronoDuration::days(1)));

    let range = TimeRange::new(hole, hole + ChronoDuration::days(1)).unwrap();
    let filled = h
        .store
        .read_bars("600519", "SH", Interval::D1, range)
        .await
        .unwrap();
    assert_eq!(filled.len(), 1);
}

#[tokio::test]
async fn bar_starting_at_now_is_fetched_by_next_run() {
    let h = harness(&["600519"], ScriptedFetcher::default());
    h.fetcher.push(daily_bars("600519", now(), 3));
    h.fetcher.push(vec![bar("600519", now())]);

    let report = h
        .orchestrator
        .incremental_update_at(Interval::D1, now())
        .await
        .unwrap();
    assert_eq!(report.outcomes["600519.SH"].bars_written, 3);
    assert_eq!(
        report.outcomes["600519.SH"].cursor,
        Some(now() - ChronoDuration::days(1))
    );

    let report = h
        .orchestrator
        .incremental_update_at(Interval::D1, now() + ChronoDuration::days(1))
        .await
        .unwrap();
    assert_eq!(report.outcomes["600519.SH"].bars_written, 1);
    assert_eq!(report.outcomes["600519.SH"].cursor, Some(now()));
}

#[tokio::test]
async fn full_sync_writes_requested_window_only() {
    let h = harness(&["600519"], ScriptedFetcher::default());
    h.fetcher.push(daily_bars("600519", now(), 10));

    let range = TimeRange::new(now() - ChronoDuration::days(5), now()).unwrap();
    let written = h
        .orchestrator
        .sync_instrument("600519", "SH", Interval::D1, range)
        .await
        .unwrap();
    assert_eq!(written, 5);

    // 같은 구간 재실행은 덮어쓰기
    let written = h
        .orchestrator
        .sync_instrument("600519", "SH", Interval::D1, range)
        .await
        .unwrap();
    assert_eq!(written, 5);
    assert_eq!(
        h.store
            .count_bars("600519", "SH", Interval::D1, TimeRange::trailing_days(now(), 365))
            .await
            .unwrap(),
        5
    );
}

#[tokio::test]
async fn fleet_sync_covers_active_instruments_only() {
    let backend = Arc::new(MemoryBackend::new());
    let store = MarketStore::new(backend.clone());
    let registry: Arc<dyn InstrumentRegistry> = Arc::new(StaticRegistry::new(vec![
        Instrument::new("600519", "SH"),
        Instrument::new("000001", "SH")
            .with_status(market_core::InstrumentStatus::Inactive),
    ]));
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.push(daily_bars("600519", now(), 5));
    fetcher.push(daily_bars("000001", now(), 5));
    let orchestrator = SyncOrchestrator::new(
        registry,
        fetcher.clone(),
        store,
        options(),
        CancellationToken::new(),
    );

    let range = TimeRange::new(now() - ChronoDuration::days(10), now()).unwrap();
    let report = orchestrator.sync_fleet(Interval::D1, range).await.unwrap();
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.status_of("600519.SH"), Some(OutcomeStatus::Succeeded));
    assert_eq!(report.stats.total_bars, 5);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn empty_identity_is_invalid_input() {
    let h = harness(&[], ScriptedFetcher::default());
    let range = TimeRange::new(now() - ChronoDuration::days(5), now()).unwrap();
    let err = h
        .orchestrator
        .sync_instrument("", "SH", Interval::D1, range)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidInput(_)));
}

#[tokio::test]
async fn overlapping_runs_are_rejected_or_skipped() {
    let gate = Arc::new(Notify::new());
    let mut fetcher = ScriptedFetcher::default();
    fetcher.gates.insert("000001".to_string(), gate.clone());
    let h = harness(&["000001", "600519"], fetcher);
    h.fetcher.push(daily_bars("000001", now(), 3));
    h.fetcher.push(daily_bars("600519", now(), 3));

    // 단일 종목 전체 동기화가 000001 잠금을 잡고 대기
    let range = TimeRange::new(now() - ChronoDuration::days(10), now()).unwrap();
    let full = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .sync_instrument("000001", "SH", Interval::D1, range)
                .await
        })
    };
    h.fetcher.entered.notified().await;

    let report = h
        .orchestrator
        .incremental_update_at(Interval::D1, now())
        .await
        .unwrap();
    assert_eq!(report.status_of("000001.SH"), Some(OutcomeStatus::Skipped));
    assert_eq!(report.status_of("600519.SH"), Some(OutcomeStatus::Succeeded));
    assert_eq!(report.stats.skipped, 1);

    gate.notify_one();
    assert_eq!(full.await.unwrap().unwrap(), 3);
}

#[tokio::test]
async fn concurrent_incremental_update_is_busy() {
    let gate = Arc::new(Notify::new());
    let mut fetcher = ScriptedFetcher::default();
    fetcher.gates.insert("600519".to_string(), gate.clone());
    let h = harness(&["600519"], fetcher);
    h.fetcher.push(daily_bars("600519", now(), 3));

    let first = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move { orchestrator.incremental_update_at(Interval::D1, now()).await })
    };
    h.fetcher.entered.notified().await;
    assert!(h.orchestrator.is_incremental_running());

    let err = h
        .orchestrator
        .incremental_update_at(Interval::D1, now())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Busy(_)));

    gate.notify_one();
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.stats.total_bars, 3);
    assert!(!h.orchestrator.is_incremental_running());
}

#[tokio::test]
async fn cancelled_orchestrator_skips_instruments() {
    let h = harness(&["600519"], ScriptedFetcher::default());
    h.fetcher.push(daily_bars("600519", now(), 3));
    let token = CancellationToken::new();
    token.cancel();

    let report = h
        .orchestrator
        .with_cancellation(token)
        .incremental_update_at(Interval::D1, now())
        .await
        .unwrap();
    assert_eq!(report.status_of("600519.SH"), Some(OutcomeStatus::Skipped));
    assert_eq!(h.fetcher.calls(), 0);
}

#[tokio::test]
async fn incremental_update_recomputes_indicators() {
    let h = harness(&["600519"], ScriptedFetcher::default());
    h.fetcher.push(daily_bars("600519", now(), 10));
    let orchestrator = h
        .orchestrator
        .clone()
        .with_indicator_sync(IndicatorSync::new(h.store.clone()));

    let report = orchestrator
        .incremental_update_at(Interval::D1, now())
        .await
        .unwrap();
    let written = report.outcomes["600519.SH"].indicators_written;
    assert!(matches!(written, Some(n) if n > 0), "{written:?}");
}

#[tokio::test]
async fn scheduler_fires_once_per_local_day() {
    let h = harness(&["600519"], ScriptedFetcher::default());
    // 2024-06-27 18:30 UTC = 2024-06-28 02:30 Asia/Shanghai
    let fire_at = Utc.with_ymd_and_hms(2024, 6, 27, 18, 30, 0).unwrap();
    h.fetcher.push(daily_bars("600519", fire_at, 5));

    let scheduler = Scheduler::new(
        h.orchestrator.clone(),
        ScheduleConfig {
            tick_minutes: 60,
            run_hour: 2,
            timezone: chrono_tz::Asia::Shanghai,
        },
        Interval::D1,
        CancellationToken::new(),
    );

    let before = fire_at - ChronoDuration::hours(1);
    assert_eq!(scheduler.tick(before).await, TickOutcome::Idle);
    assert_eq!(
        scheduler.tick(fire_at).await,
        TickOutcome::Completed { bars_written: 5 }
    );
    assert_eq!(
        scheduler.tick(fire_at + ChronoDuration::minutes(20)).await,
        TickOutcome::Idle
    );

    let status = scheduler.status().read().await.clone();
    assert!(status.last_success.is_some());
    assert!(!status.running);
    assert_eq!(
        status.last_run_date,
        chrono::NaiveDate::from_ymd_opt(2024, 6, 28)
    );

    // 다음 날 같은 시각에는 다시 실행
    assert_eq!(
        scheduler.tick(fire_at + ChronoDuration::days(1)).await,
        TickOutcome::Completed { bars_written: 0 }
    );
}

#[tokio::test]
async fn scheduler_retries_same_day_after_failure() {
    let registry = Arc::new(FlakyRegistry {
        inner: StaticRegistry::new(vec![Instrument::new("600519", "SH")]),
        down: AtomicBool::new(true),
    });
    let fire_at = Utc.with_ymd_and_hms(2024, 6, 27, 18, 5, 0).unwrap();
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.push(daily_bars("600519", fire_at, 3));
    let orchestrator = SyncOrchestrator::new(
        registry.clone(),
        fetcher,
        MarketStore::new(Arc::new(MemoryBackend::new())),
        options(),
        CancellationToken::new(),
    );
    let scheduler = Scheduler::new(
        orchestrator,
        ScheduleConfig {
            tick_minutes: 10,
            run_hour: 2,
            timezone: chrono_tz::Asia::Shanghai,
        },
        Interval::D1,
        CancellationToken::new(),
    );

    assert!(matches!(scheduler.tick(fire_at).await, TickOutcome::Failed(_)));
    {
        let status = scheduler.status().read().await.clone();
        assert!(status.last_run_date.is_none());
        assert!(status.last_error.is_some());
    }

    // 같은 시간대의 다음 틱에서 다시 실행
    registry.down.store(false, Ordering::SeqCst);
    assert_eq!(
        scheduler.tick(fire_at + ChronoDuration::minutes(10)).await,
        TickOutcome::Completed { bars_written: 3 }
    );
    let status = scheduler.status().read().await.clone();
    assert_eq!(
        status.last_run_date,
        chrono::NaiveDate::from_ymd_opt(2024, 6, 28)
    );
    assert!(status.last_error.is_none());
}
