//! 핸들러 공유 상태.

use chrono::{DateTime, Utc};
use market_core::Interval;
use market_quality::QualityChecker;

use crate::modules::{JobRegistry, SharedSchedulerStatus, SyncOrchestrator};

/// 애플리케이션 공유 상태.
///
/// `Arc<AppState>`로 감싸 axum `State` extractor로 주입합니다.
pub struct AppState {
    /// 봉 동기화 오케스트레이터
    pub orchestrator: SyncOrchestrator,
    /// 품질 검사기 (동기화 잠금과 무관)
    pub checker: QualityChecker,
    /// 백그라운드 작업 레지스트리
    pub jobs: JobRegistry,
    /// 스케줄러 상태
    pub scheduler: SharedSchedulerStatus,
    /// 요청에 간격이 없을 때 사용
    pub default_interval: Interval,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        orchestrator: SyncOrchestrator,
        checker: QualityChecker,
        jobs: JobRegistry,
        scheduler: SharedSchedulerStatus,
        default_interval: Interval,
    ) -> Self {
        Self {
            orchestrator,
            checker,
            jobs,
            scheduler,
            default_interval,
            started_at: Utc::now(),
        }
    }

    /// 저장소 연결 상태 확인.
    pub async fn is_store_healthy(&self) -> bool {
        self.orchestrator.store().health_check().await.is_ok()
    }
}
