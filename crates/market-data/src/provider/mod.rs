//! 외부 협력자 경계.
//!
//! - `InstrumentRegistry`: 종목 목록 (PostgreSQL / 고정 목록)
//! - `BarFetcher`: 업스트림 봉 데이터 (HTTP)

pub mod fetcher;
pub mod registry;

pub use fetcher::{BarFetcher, HttpBarFetcher};
pub use registry::{InstrumentRegistry, PgInstrumentRegistry, StaticRegistry};
