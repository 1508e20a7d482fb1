//! 시계열 저장 백엔드 추상화.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::TimeRange;
use serde::Serialize;

use super::point::{Point, SeriesKey};
use super::query::SeriesQuery;
use crate::error::Result;

/// 개별 포인트 쓰기 실패.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteFailure {
    pub key: SeriesKey,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// 배치 쓰기 결과.
///
/// 포인트별 쓰기는 서로 독립적이므로 일부 실패가 있어도 나머지는 반영됩니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteOutcome {
    pub written: usize,
    pub failures: Vec<WriteFailure>,
}

impl WriteOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// 앞선 실패로 쓰지 않은 포인트를 실패로 기록합니다.
    pub(crate) fn skip_rest<'a>(&mut self, rest: impl IntoIterator<Item = &'a Point>) {
        self.failures.extend(rest.into_iter().map(|p| WriteFailure {
            key: p.key.clone(),
            timestamp: p.timestamp,
            reason: "skipped after earlier failure".to_string(),
        }));
    }
}

/// 시계열 백엔드.
///
/// 쓰기는 `(key, timestamp)` 기준 upsert이며, 같은 키를 다시 쓰면 마지막 값이 남습니다.
#[async_trait]
pub trait SeriesBackend: Send + Sync {
    /// 백엔드 이름 (로그용).
    fn name(&self) -> &'static str;

    /// 포인트를 upsert합니다. 백엔드 전체 장애일 때만 `Err`를 반환합니다.
    async fn write_points(&self, points: &[Point]) -> Result<WriteOutcome>;

    /// 시각 오름차순으로 쓰고 첫 실패에서 멈춥니다.
    ///
    /// 실패 이후 포인트는 쓰지 않고 실패로 보고하므로, 이번 배치에서 반영된
    /// 시각은 모두 첫 실패 지점보다 앞입니다.
    async fn write_points_ordered(&self, points: &[Point]) -> Result<WriteOutcome> {
        let mut ordered: Vec<&Point> = points.iter().collect();
        ordered.sort_by_key(|p| p.timestamp);

        let mut outcome = WriteOutcome::default();
        for (i, point) in ordered.iter().enumerate() {
            let single = self.write_points(std::slice::from_ref(*point)).await?;
            outcome.written += single.written;
            if !single.is_complete() {
                outcome.failures.extend(single.failures);
                outcome.skip_rest(ordered[i + 1..].iter().copied());
                break;
            }
        }
        Ok(outcome)
    }

    /// 조회 결과는 `query.order` 순서로 정렬됩니다.
    async fn query(&self, query: &SeriesQuery) -> Result<Vec<Point>>;

    /// 가장 최근 포인트.
    async fn latest(&self, key: &SeriesKey) -> Result<Option<Point>> {
        Ok(self.query(&SeriesQuery::latest(key.clone())).await?.pop())
    }

    /// 범위 내 포인트 수.
    async fn count(&self, key: &SeriesKey, range: TimeRange) -> Result<u64>;

    async fn health_check(&self) -> Result<()>;
}
