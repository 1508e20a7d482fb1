//! 봉/지표 전용 저장소 어댑터.
//!
//! 동기화/품질 검사 코드는 이 타입만 사용하며, 백엔드 방언은
//! [`SeriesBackend`] 구현 안에만 존재합니다.

use market_core::{Bar, Indicator, IndicatorKind, Interval, TimeRange};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::backend::{SeriesBackend, WriteOutcome};
use super::point::{Point, SeriesKey};
use super::query::SeriesQuery;
use crate::error::Result;

/// 봉/지표 저장소.
#[derive(Clone)]
pub struct MarketStore {
    backend: Arc<dyn SeriesBackend>,
}

impl MarketStore {
    pub fn new(backend: Arc<dyn SeriesBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// 봉을 upsert합니다. 일부 행이 실패해도 나머지는 반영되고 결과에 보고됩니다.
    #[instrument(skip(self, bars), fields(count = bars.len()))]
    pub async fn write_bars(&self, bars: &[Bar]) -> Result<WriteOutcome> {
        if bars.is_empty() {
            return Ok(WriteOutcome::default());
        }
        let points: Vec<Point> = bars.iter().map(Point::from_bar).collect();
        let outcome = self.backend.write_points(&points).await?;
        if !outcome.is_complete() {
            warn!(
                written = outcome.written,
                failed = outcome.failures.len(),
                "일부 봉 저장 실패"
            );
        }
        Ok(outcome)
    }

    /// 봉을 시각 오름차순으로 쓰고 첫 실패에서 멈춥니다.
    ///
    /// 실패 지점 이후 봉은 쓰지 않고 실패로 보고되므로, 최신 봉(커서)은
    /// 실패한 시각을 넘어가지 않습니다.
    #[instrument(skip(self, bars), fields(count = bars.len()))]
    pub async fn write_bars_ordered(&self, bars: &[Bar]) -> Result<WriteOutcome> {
        if bars.is_empty() {
            return Ok(WriteOutcome::default());
        }
        let points: Vec<Point> = bars.iter().map(Point::from_bar).collect();
        let outcome = self.backend.write_points_ordered(&points).await?;
        if !outcome.is_complete() {
            warn!(
                written = outcome.written,
                failed = outcome.failures.len(),
                "봉 저장 중단, 실패 이후 봉은 쓰지 않음"
            );
        }
        Ok(outcome)
    }

    /// `[start, end)` 구간의 봉을 시간 오름차순으로 반환합니다.
    pub async fn read_bars(
        &self,
        symbol: &str,
        venue: &str,
        interval: Interval,
        range: TimeRange,
    ) -> Result<Vec<Bar>> {
        let query = SeriesQuery::new(SeriesKey::bars(symbol, venue, interval)).range(range);
        let points = self.backend.query(&query).await?;
        debug!(symbol, venue, %interval, %range, rows = points.len(), "봉 조회");
        points.iter().map(Point::to_bar).collect()
    }

    /// 가장 최근 봉.
    pub async fn latest_bar(
        &self,
        symbol: &str,
        venue: &str,
        interval: Interval,
    ) -> Result<Option<Bar>> {
        let key = SeriesKey::bars(symbol, venue, interval);
        self.backend
            .latest(&key)
            .await?
            .map(|p| p.to_bar())
            .transpose()
    }

    pub async fn count_bars(
        &self,
        symbol: &str,
        venue: &str,
        interval: Interval,
        range: TimeRange,
    ) -> Result<u64> {
        self.backend
            .count(&SeriesKey::bars(symbol, venue, interval), range)
            .await
    }

    #[instrument(skip(self, indicators), fields(count = indicators.len()))]
    pub async fn write_indicators(&self, indicators: &[Indicator]) -> Result<WriteOutcome> {
        let points: Vec<Point> = indicators
            .iter()
            .filter(|i| !i.is_empty())
            .map(Point::from_indicator)
            .collect();
        if points.is_empty() {
            return Ok(WriteOutcome::default());
        }
        self.backend.write_points(&points).await
    }

    pub async fn read_indicators(
        &self,
        symbol: &str,
        venue: &str,
        kind: IndicatorKind,
        range: TimeRange,
    ) -> Result<Vec<Indicator>> {
        let query = SeriesQuery::new(SeriesKey::indicators(symbol, venue, kind)).range(range);
        let points = self.backend.query(&query).await?;
        points.iter().map(Point::to_indicator).collect()
    }

    pub async fn latest_indicator(
        &self,
        symbol: &str,
        venue: &str,
        kind: IndicatorKind,
    ) -> Result<Option<Indicator>> {
        let key = SeriesKey::indicators(symbol, venue, kind);
        self.backend
            .latest(&key)
            .await?
            .map(|p| p.to_indicator())
            .transpose()
    }

    pub async fn health_check(&self) -> Result<()> {
        self.backend.health_check().await
    }
}
