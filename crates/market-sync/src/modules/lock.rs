//! 종목×간격 단위 실행 잠금.

use market_core::{InstrumentId, Interval};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 잠금 키.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    pub instrument: InstrumentId,
    pub interval: Interval,
}

impl LockKey {
    pub fn new(symbol: &str, venue: &str, interval: Interval) -> Self {
        Self {
            instrument: InstrumentId::new(symbol, venue),
            interval,
        }
    }
}

/// 잠금 보유 중에는 같은 키의 조회/저장/커서 갱신이 겹치지 않습니다.
pub type SyncGuard = OwnedMutexGuard<()>;

/// 키별 비동기 뮤텍스 모음.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, key: LockKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(key).or_default().clone()
    }

    /// 잠금을 얻을 때까지 대기합니다.
    pub async fn acquire(&self, key: LockKey) -> SyncGuard {
        self.slot(key).await.lock_owned().await
    }

    /// 이미 잠겨 있으면 `None`.
    pub async fn try_acquire(&self, key: LockKey) -> Option<SyncGuard> {
        self.slot(key).await.try_lock_owned().ok()
    }
}
