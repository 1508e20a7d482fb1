//! 시장 데이터 저장 및 조회.
//!
//! 이 crate는 다음을 제공합니다:
//! - 봉/지표 시계열 저장소 어댑터 (`MarketStore`)
//! - TimescaleDB 및 인메모리 백엔드
//! - 종목 레지스트리
//! - 업스트림 봉 데이터 HTTP 클라이언트

pub mod error;
pub mod provider;
pub mod storage;

pub use error::{DataError, FetchError, Result};

pub use provider::{
    BarFetcher, HttpBarFetcher, InstrumentRegistry, PgInstrumentRegistry, StaticRegistry,
};
pub use storage::{
    Database, DatabaseConfig, MarketStore, Measurement, MemoryBackend, Order, Point,
    SeriesBackend, SeriesKey, SeriesQuery, TimescaleBackend, WriteFailure, WriteOutcome,
};
