//! 동기화 파이프라인이 사용하는 외부 협력자 인터페이스.
//!
//! 오케스트레이터와 워커는 아래 trait만 알고, 저장소 구현(PostgreSQL 등)은
//! 실행 진입점에서 주입합니다.

mod catalog;
mod checkpoint;
mod data_point;
mod secret;

use async_trait::async_trait;
use chrono::NaiveDate;
use ir_core::{
    CheckpointTransition, IntegrationDataPoint, NewSyncCheckpoint, SyncCheckpoint, Workspace,
    WorkspaceIntegration,
};
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

use crate::Result;

pub use catalog::PgWorkspaceCatalog;
pub use checkpoint::PgCheckpointStore;
pub use data_point::PgDataPointSink;
pub use secret::PgSecretResolver;

/// `migrations/`의 스키마를 적용합니다. 이미 적용된 버전은 건너뜁니다.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// 워크스페이스/연동 카탈로그.
#[async_trait]
pub trait WorkspaceCatalog: Send + Sync {
    /// 전체 워크스페이스 목록. 실패하면 실행 전체가 중단됩니다.
    async fn list_workspaces(&self) -> Result<Vec<Workspace>>;

    /// 워크스페이스에 연결된 연동 목록 (비활성 포함).
    async fn list_integrations(&self, workspace: &Workspace) -> Result<Vec<WorkspaceIntegration>>;
}

/// 토큰 참조값을 실제 자격증명으로 교환합니다.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, token_ref: &str) -> Result<SecretString>;
}

/// 일 단위 동기화 체크포인트 저장소.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// 해당 날짜의 가장 최근 체크포인트 (생성 시각 내림차순 첫 행).
    async fn find_latest(
        &self,
        workspace_id: Uuid,
        integration_id: Uuid,
        sync_date: NaiveDate,
    ) -> Result<Option<SyncCheckpoint>>;

    /// `Pending` 체크포인트를 새로 삽입합니다.
    async fn insert(&self, checkpoint: NewSyncCheckpoint) -> Result<SyncCheckpoint>;

    /// `Pending` 체크포인트를 종결 상태로 전이합니다.
    ///
    /// 대상이 없거나 이미 종결된 행이면 에러를 반환합니다.
    async fn update_status(&self, id: Uuid, transition: CheckpointTransition) -> Result<()>;

    /// 특정 날짜의 모든 체크포인트 (운영자 점검용).
    async fn list_for_date(&self, sync_date: NaiveDate) -> Result<Vec<SyncCheckpoint>>;
}

/// 연동 차트 저장소.
#[async_trait]
pub trait DataPointSink: Send + Sync {
    /// (차트, 포인트 이름) 기준으로 업서트하고 연동의 `last_fetched_at`도 함께 저장합니다.
    ///
    /// 저장된 포인트 수를 반환합니다.
    async fn add_data_points(
        &self,
        integration: &WorkspaceIntegration,
        points: &[IntegrationDataPoint],
    ) -> Result<usize>;
}
