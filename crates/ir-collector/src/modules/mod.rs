//! 연동 동기화 모듈.

pub mod eligibility;
pub mod integration_sync;
pub mod worker;

pub use eligibility::{is_eligible, should_attempt};
pub use integration_sync::{IntegrationSyncer, SyncDeps, SyncOptions};
pub use worker::{SyncJob, WorkerContext, WorkerPool};
