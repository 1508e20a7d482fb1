//! 품질 검사 오류 타입.

use market_data::DataError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QualityError {
    /// 저장소/레지스트리 조회 실패
    #[error("데이터 조회 실패: {0}")]
    Data(#[from] DataError),

    /// 등록되지 않은 종목
    #[error("종목을 찾을 수 없습니다: {symbol}.{venue}")]
    UnknownInstrument { symbol: String, venue: String },
}

pub type Result<T> = std::result::Result<T, QualityError>;
