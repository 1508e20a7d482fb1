//! 인메모리 시계열 백엔드.
//!
//! 시리즈별 정렬 맵으로 저장하므로 최신 포인트 조회가 O(log n)입니다.
//! 테스트와 `--memory` 실행에서 사용합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::TimeRange;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{SeriesBackend, WriteFailure, WriteOutcome};
use super::point::{Point, SeriesKey};
use super::query::{Order, SeriesQuery};
use crate::error::{DataError, Result};

type Series = BTreeMap<DateTime<Utc>, BTreeMap<String, Decimal>>;

/// 인메모리 백엔드.
#[derive(Default)]
pub struct MemoryBackend {
    series: RwLock<HashMap<SeriesKey, Series>>,
    /// 쓰기를 거부할 시각 (장애 주입)
    rejected: RwLock<HashSet<DateTime<Utc>>>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지정 시각의 포인트 쓰기를 실패시킵니다.
    pub async fn reject_timestamp(&self, ts: DateTime<Utc>) {
        self.rejected.write().await.insert(ts);
    }

    pub async fn clear_rejections(&self) {
        self.rejected.write().await.clear();
    }

    /// 백엔드 전체를 사용 불가 상태로 만듭니다.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 저장된 포인트 총 수.
    pub async fn len(&self) -> usize {
        self.series.read().await.values().map(|s| s.len()).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DataError::Unavailable("memory backend disabled".to_string()));
        }
        Ok(())
    }

    fn bounds(range: Option<TimeRange>) -> (Bound<DateTime<Utc>>, Bound<DateTime<Utc>>) {
        match range {
            Some(r) => (Bound::Included(r.start), Bound::Excluded(r.end)),
            None => (Bound::Unbounded, Bound::Unbounded),
        }
    }
}

#[async_trait]
impl SeriesBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn write_points(&self, points: &[Point]) -> Result<WriteOutcome> {
        self.ensure_available()?;

        let rejected = self.rejected.read().await;
        let mut series = self.series.write().await;
        let mut outcome = WriteOutcome::default();

        for point in points {
            if rejected.contains(&point.timestamp) {
                outcome.failures.push(WriteFailure {
                    key: point.key.clone(),
                    timestamp: point.timestamp,
                    reason: "write rejected".to_string(),
                });
                continue;
            }
            series
                .entry(point.key.clone())
                .or_default()
                .insert(point.timestamp, point.fields.clone());
            outcome.written += 1;
        }

        debug!(
            written = outcome.written,
            failed = outcome.failures.len(),
            "memory write"
        );
        Ok(outcome)
    }

    async fn query(&self, query: &SeriesQuery) -> Result<Vec<Point>> {
        self.ensure_available()?;
        if query.is_trivially_empty() {
            return Ok(Vec::new());
        }

        let series = self.series.read().await;
        let Some(rows) = series.get(&query.key) else {
            return Ok(Vec::new());
        };

        let to_point = |(ts, fields): (&DateTime<Utc>, &BTreeMap<String, Decimal>)| Point {
            key: query.key.clone(),
            timestamp: *ts,
            fields: fields.clone(),
        };
        let limit = query.limit.unwrap_or(usize::MAX);
        let range = rows.range(Self::bounds(query.range));

        let points = match query.order {
            Order::Asc => range.take(limit).map(to_point).collect(),
            Order::Desc => range.rev().take(limit).map(to_point).collect(),
        };
        Ok(points)
    }

    async fn latest(&self, key: &SeriesKey) -> Result<Option<Point>> {
        self.ensure_available()?;
        let series = self.series.read().await;
        Ok(series.get(key).and_then(|rows| {
            rows.last_key_value().map(|(ts, fields)| Point {
                key: key.clone(),
                timestamp: *ts,
                fields: fields.clone(),
            })
        }))
    }

    async fn count(&self, key: &SeriesKey, range: TimeRange) -> Result<u64> {
        self.ensure_available()?;
        if range.is_empty() {
            return Ok(0);
        }
        let series = self.series.read().await;
        Ok(series
            .get(key)
            .map(|rows| rows.range(Self::bounds(Some(range))).count() as u64)
            .unwrap_or(0))
    }

    async fn health_check(&self) -> Result<()> {
        self.ensure_available()
    }
}
