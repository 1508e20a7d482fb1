//! 시계열 저장소.
//!
//! - [`point`]: 봉/지표 ⇄ 포인트 변환
//! - [`query`]: 타입 기반 조회 조건
//! - [`backend`]: 백엔드 트레이트
//! - [`memory`], [`timescale`]: 백엔드 구현
//! - [`market`]: 봉/지표 전용 어댑터

pub mod backend;
pub mod market;
pub mod memory;
pub mod point;
pub mod query;
pub mod timescale;

pub use backend::{SeriesBackend, WriteFailure, WriteOutcome};
pub use market::MarketStore;
pub use memory::MemoryBackend;
pub use point::{Measurement, Point, SeriesKey};
pub use query::{Order, SeriesQuery};
pub use timescale::{Database, DatabaseConfig, TimescaleBackend};
