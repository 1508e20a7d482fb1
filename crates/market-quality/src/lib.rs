//! 저장된 봉 데이터의 품질 검사.
//!
//! - 완전도(completeness): 기대 거래일 대비 실제 봉 수
//! - 연속성(continuity): 봉 사이 공백
//! - 이상치(anomalies): 가격 규칙 위반, 급등락, 거래량 0
//! - 신선도(freshness): 최신 봉의 지연
//!
//! 전체 활성 종목에 대한 리포트는 [`QualityChecker::generate_report`]로 생성합니다.

pub mod checker;
pub mod checks;
pub mod error;
pub mod types;

pub use checker::{QualityChecker, QualityConfig};
pub use error::{QualityError, Result};
pub use types::{
    CheckKind, CheckResult, CheckStatus, Finding, QualityReport, ReportSummary, SkippedInstrument,
};
