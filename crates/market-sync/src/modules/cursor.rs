//! 동기화 커서.
//!
//! 커서는 별도로 저장하지 않고 저장소의 최신 봉 시각에서 유도합니다.
//! 따라서 쓰기가 반영되지 않은 시각으로는 커서가 이동할 수 없습니다.

use chrono::{DateTime, Utc};
use market_core::Interval;
use market_data::MarketStore;
use tracing::debug;

use crate::error::{Result, SyncError};

/// 커서 갱신 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorAdvance {
    /// 커서가 요청한 시각에 있음
    Advanced(DateTime<Utc>),
    /// 요청 시각이 현재 커서보다 과거 (변화 없음)
    Unchanged(DateTime<Utc>),
}

impl CursorAdvance {
    pub fn cursor(&self) -> DateTime<Utc> {
        match self {
            Self::Advanced(ts) | Self::Unchanged(ts) => *ts,
        }
    }
}

/// 종목×간격별 마지막 저장 시각 추적기.
#[derive(Clone)]
pub struct SyncStateTracker {
    store: MarketStore,
}

impl SyncStateTracker {
    pub fn new(store: MarketStore) -> Self {
        Self { store }
    }

    /// 마지막으로 저장된 봉 시각. 동기화한 적 없으면 `None`.
    pub async fn cursor(
        &self,
        symbol: &str,
        venue: &str,
        interval: Interval,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .store
            .latest_bar(symbol, venue, interval)
            .await?
            .map(|b| b.timestamp))
    }

    /// 커서를 `ts`로 옮깁니다.
    ///
    /// 커서는 뒤로 가지 않으며, 저장소에 아직 없는 시각이면
    /// [`SyncError::CursorNotPersisted`]를 반환합니다.
    pub async fn advance(
        &self,
        symbol: &str,
        venue: &str,
        interval: Interval,
        ts: DateTime<Utc>,
    ) -> Result<CursorAdvance> {
        let latest = self.cursor(symbol, venue, interval).await?;
        match latest {
            Some(current) if ts == current => Ok(CursorAdvance::Advanced(ts)),
            Some(current) if ts < current => {
                debug!(symbol, venue, %interval, requested = %ts, %current, "과거 시각으로의 커서 이동 무시");
                Ok(CursorAdvance::Unchanged(current))
            }
            _ => Err(SyncError::CursorNotPersisted {
                requested: ts,
                latest,
            }),
        }
    }
}
