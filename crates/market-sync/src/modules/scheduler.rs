//! 일일 증분 동기화 스케줄러.
//!
//! 주기적으로 깨어나 설정된 시간대의 현지 시각이 실행 시각이고
//! 오늘 아직 실행하지 않았으면 증분 동기화를 실행합니다.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use market_core::Interval;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::orchestrator::SyncOrchestrator;
use crate::config::ScheduleConfig;
use crate::error::SyncError;

/// 스케줄러 상태 (헬스 체크에 노출).
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    pub last_tick: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    /// 마지막 실행의 현지 날짜
    pub last_run_date: Option<NaiveDate>,
    pub running: bool,
    pub last_error: Option<String>,
}

pub type SharedSchedulerStatus = Arc<RwLock<SchedulerStatus>>;

/// 틱 처리 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// 실행 시각 아님
    Idle,
    /// 실행 완료 (저장된 봉 수)
    Completed { bars_written: usize },
    /// 다른 증분 실행이 진행 중
    Busy,
    Failed(String),
}

/// 실행할 때면 현지 날짜를 반환합니다.
pub fn should_fire(
    now: DateTime<Utc>,
    tz: Tz,
    run_hour: u32,
    last_run_date: Option<NaiveDate>,
) -> Option<NaiveDate> {
    let local = now.with_timezone(&tz);
    let today = local.date_naive();
    if local.hour() == run_hour && last_run_date != Some(today) {
        Some(today)
    } else {
        None
    }
}

/// 증분 동기화 스케줄러.
pub struct Scheduler {
    orchestrator: SyncOrchestrator,
    config: ScheduleConfig,
    interval: Interval,
    status: SharedSchedulerStatus,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(
        orchestrator: SyncOrchestrator,
        config: ScheduleConfig,
        interval: Interval,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            orchestrator,
            config,
            interval,
            status: Arc::new(RwLock::new(SchedulerStatus::default())),
            shutdown,
        }
    }

    pub fn status(&self) -> SharedSchedulerStatus {
        self.status.clone()
    }

    /// 종료 신호까지 루프를 돕니다.
    ///
    /// 실행 중 종료 신호가 오면 현재 종목까지 처리한 뒤 빠져나옵니다.
    pub async fn run(self) {
        info!(
            tick_minutes = self.config.tick_minutes,
            run_hour = self.config.run_hour,
            timezone = %self.config.timezone,
            interval = %self.interval,
            "스케줄러 시작"
        );

        let mut ticker = tokio::time::interval(self.config.tick());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("종료 신호 수신, 스케줄러 종료");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick(Utc::now()).await;
                }
            }
        }
    }

    /// 한 번의 틱 처리.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickOutcome {
        let fire_date = {
            let mut status = self.status.write().await;
            status.last_tick = Some(now);
            if status.running {
                None
            } else {
                let date = should_fire(
                    now,
                    self.config.timezone,
                    self.config.run_hour,
                    status.last_run_date,
                );
                if date.is_some() {
                    status.running = true;
                }
                date
            }
        };

        let Some(date) = fire_date else {
            return TickOutcome::Idle;
        };

        info!(%date, "예약된 증분 동기화 실행");
        let result = self
            .orchestrator
            .incremental_update_at(self.interval, now)
            .await;

        let mut status = self.status.write().await;
        status.running = false;
        match result {
            Ok(report) => {
                status.last_run_date = Some(date);
                status.last_success = Some(Utc::now());
                status.last_error = None;
                TickOutcome::Completed {
                    bars_written: report.stats.total_bars,
                }
            }
            Err(SyncError::Busy(_)) => {
                status.last_run_date = Some(date);
                warn!("증분 동기화가 이미 실행 중, 이번 틱 건너뜀");
                TickOutcome::Busy
            }
            Err(e) => {
                // 실행 날짜를 남기지 않아 다음 틱에 다시 시도
                error!(error = %e, "예약된 증분 동기화 실패");
                status.last_error = Some(e.to_string());
                TickOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_should_fire_once_per_local_day() {
        let tz = chrono_tz::Asia::Shanghai;
        // 2024-06-27 18:30 UTC = 2024-06-28 02:30 (UTC+8)
        let now = Utc.with_ymd_and_hms(2024, 6, 27, 18, 30, 0).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();

        assert_eq!(should_fire(now, tz, 2, None), Some(today));
        assert_eq!(should_fire(now, tz, 2, Some(today)), None);
        assert_eq!(
            should_fire(now, tz, 2, NaiveDate::from_ymd_opt(2024, 6, 27)),
            Some(today)
        );
        assert_eq!(should_fire(now, tz, 3, None), None);
    }
}
