//! 저장/동기화 대상 레코드.

mod bar;
mod indicator;

pub use bar::*;
pub use indicator::*;
