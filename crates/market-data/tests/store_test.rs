//! MarketStore 통합 테스트 (인메모리 백엔드).

use chrono::{DateTime, Duration, TimeZone, Utc};
use market_core::{Bar, Indicator, IndicatorKind, Interval, TimeRange};
use market_data::{MarketStore, MemoryBackend};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::days(n)
}

fn bar(n: i64, close: Decimal) -> Bar {
    Bar::new(
        "600519",
        "SH",
        Interval::D1,
        day(n),
        close,
        close + dec!(1),
        close - dec!(1),
        close,
        dec!(1000),
    )
}

fn store() -> (Arc<MemoryBackend>, MarketStore) {
    let backend = Arc::new(MemoryBackend::new());
    (backend.clone(), MarketStore::new(backend))
}

#[tokio::test]
async fn writing_same_batch_twice_is_idempotent() {
    let (_, store) = store();
    let bars: Vec<Bar> = (0..5).map(|n| bar(n, dec!(10))).collect();

    store.write_bars(&bars).await.unwrap();
    let range = TimeRange::new(day(0), day(10)).unwrap();
    let first = store.read_bars("600519", "SH", Interval::D1, range).await.unwrap();

    store.write_bars(&bars).await.unwrap();
    let second = store.read_bars("600519", "SH", Interval::D1, range).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.len(), 5);
    assert_eq!(
        store.count_bars("600519", "SH", Interval::D1, range).await.unwrap(),
        5
    );
}

#[tokio::test]
async fn rewrite_is_last_write_wins() {
    let (_, store) = store();
    store.write_bars(&[bar(0, dec!(10))]).await.unwrap();
    store.write_bars(&[bar(0, dec!(12))]).await.unwrap();

    let latest = store
        .latest_bar("600519", "SH", Interval::D1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.close, dec!(12));
}

#[tokio::test]
async fn read_is_ascending_and_half_open() {
    let (_, store) = store();
    let bars: Vec<Bar> = [3, 0, 2, 1].iter().map(|&n| bar(n, dec!(10))).collect();
    store.write_bars(&bars).await.unwrap();

    let range = TimeRange::new(day(1), day(3)).unwrap();
    let read = store.read_bars("600519", "SH", Interval::D1, range).await.unwrap();
    let times: Vec<_> = read.iter().map(|b| b.timestamp).collect();
    assert_eq!(times, vec![day(1), day(2)]);

    let empty = TimeRange::new(day(2), day(2)).unwrap();
    assert!(store
        .read_bars("600519", "SH", Interval::D1, empty)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn series_are_isolated_by_interval_and_venue() {
    let (_, store) = store();
    store.write_bars(&[bar(0, dec!(10))]).await.unwrap();

    assert!(store
        .latest_bar("600519", "SH", Interval::M60)
        .await
        .unwrap()
        .is_none());
    assert!(store
        .latest_bar("600519", "SZ", Interval::D1)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn failed_row_does_not_roll_back_others() {
    let (backend, store) = store();
    backend.reject_timestamp(day(1)).await;

    let bars: Vec<Bar> = (0..3).map(|n| bar(n, dec!(10))).collect();
    let outcome = store.write_bars(&bars).await.unwrap();
    assert_eq!(outcome.written, 2);
    assert_eq!(outcome.failures.len(), 1);

    let range = TimeRange::new(day(0), day(3)).unwrap();
    let read = store.read_bars("600519", "SH", Interval::D1, range).await.unwrap();
    assert_eq!(read.len(), 2);
}

#[tokio::test]
async fn ordered_write_stops_at_first_failure() {
    let (backend, store) = store();
    backend.reject_timestamp(day(2)).await;

    // 입력 순서와 무관하게 시각 오름차순으로 씀
    let bars: Vec<Bar> = [4, 0, 3, 1, 2].iter().map(|n| bar(*n, dec!(10))).collect();
    let outcome = store.write_bars_ordered(&bars).await.unwrap();
    assert_eq!(outcome.written, 2);
    let failed: Vec<DateTime<Utc>> = outcome.failures.iter().map(|f| f.timestamp).collect();
    assert_eq!(failed, vec![day(2), day(3), day(4)]);

    let latest = store
        .latest_bar("600519", "SH", Interval::D1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.timestamp, day(1));
}

#[tokio::test]
async fn indicators_round_trip_by_kind() {
    let (_, store) = store();
    let ma = Indicator::new("600519", "SH", IndicatorKind::Ma, day(4))
        .with_field("ma5", dec!(10.2));
    let rsi = Indicator::new("600519", "SH", IndicatorKind::Rsi, day(4))
        .with_field("rsi6", dec!(55));
    store.write_indicators(&[ma.clone(), rsi]).await.unwrap();

    let range = TimeRange::new(day(0), day(10)).unwrap();
    let read = store
        .read_indicators("600519", "SH", IndicatorKind::Ma, range)
        .await
        .unwrap();
    assert_eq!(read, vec![ma.clone()]);

    let latest = store
        .latest_indicator("600519", "SH", IndicatorKind::Ma)
        .await
        .unwrap();
    assert_eq!(latest, Some(ma));
}
