//! # Market Core
//!
//! 시장 데이터 동기화 파이프라인의 핵심 도메인 타입을 제공합니다.
//!
//! - 종목(Instrument) 및 종목 상태
//! - 봉 데이터(Bar)와 유효성 검증 규칙
//! - 기술 지표(Indicator) 레코드
//! - 봉 간격(Interval)과 반개구간 시간 범위(TimeRange)
//! - 로깅 인프라

pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
