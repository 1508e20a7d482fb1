//! 타입이 지정된 시계열 조회.
//!
//! 조회 조건은 값으로만 전달되며, 백엔드가 바인딩 파라미터로 변환합니다.

use market_core::TimeRange;
use serde::{Deserialize, Serialize};

use super::point::SeriesKey;

/// 시간 정렬 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

/// 단일 시계열 범위 조회.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesQuery {
    pub key: SeriesKey,
    /// `None`이면 전체 구간
    pub range: Option<TimeRange>,
    pub order: Order,
    /// 반환할 최대 포인트 수 (필드 행 수가 아님)
    pub limit: Option<usize>,
}

impl SeriesQuery {
    pub fn new(key: SeriesKey) -> Self {
        Self {
            key,
            range: None,
            order: Order::Asc,
            limit: None,
        }
    }

    pub fn range(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// 가장 최근 포인트 1개.
    pub fn latest(key: SeriesKey) -> Self {
        Self::new(key).order(Order::Desc).limit(1)
    }

    /// 범위가 비어 있어 결과가 없음이 확정된 조회인지 여부.
    pub fn is_trivially_empty(&self) -> bool {
        self.limit == Some(0) || self.range.map(|r| r.is_empty()).unwrap_or(false)
    }
}
