//! Integration data sync pipeline for IR workspaces.
//!
//! 이 crate는 워크스페이스별 외부 연동(은행, 결제, 분석)에서 지표를 가져와
//! 저장하는 정기 동기화 작업을 제공합니다:
//! - 활성화 플래그와 당일 체크포인트 기반 대상 선정
//! - bounded 큐 + 고정 워커 풀로 작업 분배
//! - 실패한 연동만 다음 실행에서 재시도

pub mod config;
pub mod error;
pub mod modules;
pub mod registry;
pub mod repository;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use modules::{IntegrationSyncer, SyncDeps, SyncOptions};
pub use registry::ProviderRegistry;
pub use stats::SyncStats;
