//! API 라우트.

pub mod health;
pub mod jobs;
pub mod quality;
pub mod sync;

pub use health::health_router;
pub use jobs::jobs_router;
pub use quality::quality_router;
pub use sync::sync_router;
