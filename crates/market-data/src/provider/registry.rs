//! 종목 레지스트리.
//!
//! 동기화/품질 검사 대상 종목 목록을 제공합니다. 이 파이프라인에서는 읽기 전용입니다.

use async_trait::async_trait;
use market_core::{Instrument, InstrumentStatus};
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument, warn};

use crate::error::Result;

/// 종목 조회 인터페이스.
#[async_trait]
pub trait InstrumentRegistry: Send + Sync {
    /// 활성 종목 목록 (symbol, venue 순 정렬).
    async fn list_active(&self) -> Result<Vec<Instrument>>;

    async fn get(&self, symbol: &str, venue: &str) -> Result<Option<Instrument>>;
}

/// `instruments` 테이블 행.
#[derive(Debug, Clone, FromRow)]
struct InstrumentRecord {
    symbol: String,
    venue: String,
    name: Option<String>,
    status: String,
}

impl InstrumentRecord {
    fn into_instrument(self) -> Instrument {
        let status = self.status.parse().unwrap_or_else(|_| {
            warn!(symbol = %self.symbol, venue = %self.venue, status = %self.status, "알 수 없는 종목 상태, inactive로 처리");
            InstrumentStatus::Inactive
        });
        let mut instrument = Instrument::new(self.symbol, self.venue).with_status(status);
        instrument.name = self.name;
        instrument
    }
}

/// PostgreSQL `instruments` 테이블 기반 레지스트리.
#[derive(Clone)]
pub struct PgInstrumentRegistry {
    pool: PgPool,
}

impl PgInstrumentRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstrumentRegistry for PgInstrumentRegistry {
    #[instrument(skip(self))]
    async fn list_active(&self) -> Result<Vec<Instrument>> {
        let records: Vec<InstrumentRecord> = sqlx::query_as(
            r#"
            SELECT symbol, venue, name, status
            FROM instruments
            WHERE status = 'active'
            ORDER BY symbol, venue
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = records.len(), "활성 종목 조회");
        Ok(records.into_iter().map(InstrumentRecord::into_instrument).collect())
    }

    async fn get(&self, symbol: &str, venue: &str) -> Result<Option<Instrument>> {
        let record: Option<InstrumentRecord> = sqlx::query_as(
            "SELECT symbol, venue, name, status FROM instruments WHERE symbol = $1 AND venue = $2",
        )
        .bind(symbol)
        .bind(venue)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(InstrumentRecord::into_instrument))
    }
}

/// 고정 목록 레지스트리.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    instruments: Vec<Instrument>,
}

impl StaticRegistry {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self { instruments }
    }
}

#[async_trait]
impl InstrumentRegistry for StaticRegistry {
    async fn list_active(&self) -> Result<Vec<Instrument>> {
        let mut active: Vec<Instrument> = self
            .instruments
            .iter()
            .filter(|i| i.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| a.id().cmp(&b.id()));
        Ok(active)
    }

    async fn get(&self, symbol: &str, venue: &str) -> Result<Option<Instrument>> {
        Ok(self
            .instruments
            .iter()
            .find(|i| i.symbol == symbol && i.venue == venue)
            .cloned())
    }
}
