//! 백그라운드 작업 레지스트리.
//!
//! 제출 시 작업 ID를 돌려주고, 상태는 조회로 확인하며, 취소는 명시적으로 요청합니다.
//! 취소는 작업에 전달된 토큰을 통해 협조적으로 이루어집니다.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SyncError;

/// 보관하는 완료 작업 수 기본값
const DEFAULT_RETENTION: usize = 100;

/// 작업 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// 작업 상태 스냅샷.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub id: Uuid,
    pub kind: String,
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 제출된 작업 핸들.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub id: Uuid,
}

struct JobEntry {
    status: JobStatus,
    token: CancellationToken,
}

#[derive(Default)]
struct JobTable {
    jobs: HashMap<Uuid, JobEntry>,
    /// 제출 순서
    order: VecDeque<Uuid>,
}

impl JobTable {
    /// 보관 한도를 넘은 완료 작업을 오래된 순으로 제거합니다.
    fn evict(&mut self, retention: usize) {
        let finished = self
            .jobs
            .values()
            .filter(|j| j.status.state.is_finished())
            .count();
        let mut excess = finished.saturating_sub(retention);
        if excess == 0 {
            return;
        }

        let jobs = &mut self.jobs;
        self.order.retain(|id| {
            if excess == 0 {
                return true;
            }
            let finished = jobs
                .get(id)
                .map(|j| j.status.state.is_finished())
                .unwrap_or(true);
            if finished {
                jobs.remove(id);
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
}

/// 작업 레지스트리. 복제본은 같은 테이블을 공유합니다.
#[derive(Clone)]
pub struct JobRegistry {
    table: Arc<RwLock<JobTable>>,
    shutdown: CancellationToken,
    retention: usize,
}

impl JobRegistry {
    /// `shutdown`이 취소되면 모든 작업 토큰도 취소됩니다.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self::with_retention(shutdown, DEFAULT_RETENTION)
    }

    pub fn with_retention(shutdown: CancellationToken, retention: usize) -> Self {
        Self {
            table: Arc::new(RwLock::new(JobTable::default())),
            shutdown,
            retention,
        }
    }

    /// 작업을 제출합니다. `task`는 작업 전용 취소 토큰을 받습니다.
    pub async fn submit<F, Fut>(&self, kind: &str, task: F) -> JobHandle
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<Value, SyncError>> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let token = self.shutdown.child_token();
        let status = JobStatus {
            id,
            kind: kind.to_string(),
            state: JobState::Pending,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        };

        {
            let mut table = self.table.write().await;
            table.jobs.insert(
                id,
                JobEntry {
                    status,
                    token: token.clone(),
                },
            );
            table.order.push_back(id);
            table.evict(self.retention);
        }

        let future = task(token.clone());
        let registry = self.clone();
        tokio::spawn(async move {
            registry
                .update(id, |s| {
                    s.state = JobState::Running;
                    s.started_at = Some(Utc::now());
                })
                .await;

            let result = future.await;

            registry
                .update(id, |s| {
                    s.finished_at = Some(Utc::now());
                    match result {
                        Ok(value) => {
                            s.state = if token.is_cancelled() {
                                JobState::Cancelled
                            } else {
                                JobState::Succeeded
                            };
                            s.result = Some(value);
                        }
                        Err(SyncError::Cancelled) => s.state = JobState::Cancelled,
                        Err(e) => {
                            warn!(job_id = %id, error = %e, "작업 실패");
                            s.state = JobState::Failed;
                            s.error = Some(e.to_string());
                        }
                    }
                })
                .await;
            info!(job_id = %id, "작업 종료");
        });

        info!(job_id = %id, kind, "작업 제출");
        JobHandle { id }
    }

    async fn update(&self, id: Uuid, f: impl FnOnce(&mut JobStatus)) {
        let mut table = self.table.write().await;
        if let Some(entry) = table.jobs.get_mut(&id) {
            f(&mut entry.status);
        }
    }

    pub async fn status(&self, id: Uuid) -> Option<JobStatus> {
        self.table
            .read()
            .await
            .jobs
            .get(&id)
            .map(|e| e.status.clone())
    }

    /// 실행 중인 작업에 취소를 요청합니다.
    ///
    /// 작업이 없거나 이미 끝났으면 `false`.
    pub async fn cancel(&self, id: Uuid) -> bool {
        let table = self.table.read().await;
        match table.jobs.get(&id) {
            Some(entry) if !entry.status.state.is_finished() => {
                entry.token.cancel();
                info!(job_id = %id, "작업 취소 요청");
                true
            }
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
