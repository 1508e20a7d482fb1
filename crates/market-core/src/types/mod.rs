//! 파이프라인 전반에서 사용되는 공통 타입.

mod instrument;
mod interval;
mod range;

pub use instrument::*;
pub use interval::*;
pub use range::*;
