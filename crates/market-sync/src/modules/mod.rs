//! 동기화 모듈.

pub mod cursor;
pub mod indicator_sync;
pub mod indicators;
pub mod jobs;
pub mod lock;
pub mod orchestrator;
pub mod retry;
pub mod scheduler;

pub use cursor::{CursorAdvance, SyncStateTracker};
pub use indicator_sync::{IndicatorSync, IndicatorSyncOptions};
pub use indicators::IndicatorCalculator;
pub use jobs::{JobHandle, JobRegistry, JobState, JobStatus};
pub use lock::{KeyedLocks, LockKey};
pub use orchestrator::{
    BatchSummary, FleetReport, InstrumentOutcome, OutcomeStatus, SyncOptions, SyncOrchestrator,
};
pub use retry::RetryPolicy;
pub use scheduler::{should_fire, Scheduler, SchedulerStatus, SharedSchedulerStatus, TickOutcome};
