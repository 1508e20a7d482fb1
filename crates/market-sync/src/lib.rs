//! 시장 봉 데이터 동기화 서비스.
//!
//! 이 crate는 다음을 제공합니다:
//! - 종목별/전체 봉 동기화와 커서 기반 증분 동기화
//! - 일일 스케줄러
//! - 동기화 후 기술 지표 재계산
//! - 동기화/품질 검사 트리거용 HTTP API

pub mod api;
pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::ServiceConfig;
pub use error::{Result, SyncError};
pub use stats::CollectionStats;
