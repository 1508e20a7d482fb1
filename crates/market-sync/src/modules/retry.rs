//! 업스트림 조회 재시도 (지수 백오프).

use market_data::FetchError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::SyncError;

/// 재시도 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 첫 재시도 대기
    pub base: Duration,
    /// 대기 상한
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_millis(500),
            max: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            max,
        }
    }

    /// `attempt`번째 실패 후 대기 시간: `min(base × 2^(attempt-1), max)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base.saturating_mul(1u32 << exp).min(self.max)
    }

    /// 재시도 가능한 에러에 한해 백오프 후 다시 시도합니다.
    ///
    /// 시도와 대기 모두 `shutdown`과 경합하며, 취소되면 [`SyncError::Cancelled`]입니다.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &str,
        shutdown: &CancellationToken,
        mut op: F,
    ) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = tokio::select! {
                _ = shutdown.cancelled() => return Err(SyncError::Cancelled),
                r = op() => r,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "조회 실패, 재시도 대기"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => return Err(SyncError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => {
                    return Err(SyncError::Fetch {
                        attempts: attempt,
                        source: e,
                    })
                }
            }
        }
    }
}
