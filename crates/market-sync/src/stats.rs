//! 동기화 실행 통계.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 동기화 실행 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 대상 종목 수
    pub total: usize,
    /// 성공 종목 수 (봉 1개 이상 저장)
    pub success: usize,
    /// 실패 종목 수
    pub errors: usize,
    /// 건너뛴 종목 수 (이미 최신, 실행 중, 종료 신호)
    pub skipped: usize,
    /// 빈 데이터 (조회 성공, 저장할 봉 없음)
    pub empty: usize,
    /// 저장된 총 봉 수
    pub total_bars: usize,
    /// 검증에서 제외된 봉 수
    pub invalid_bars: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            errors = self.errors,
            skipped = self.skipped,
            empty = self.empty,
            total_bars = self.total_bars,
            invalid_bars = self.invalid_bars,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "동기화 완료"
        );
    }
}
