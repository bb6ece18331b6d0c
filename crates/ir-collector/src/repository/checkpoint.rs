//! 동기화 체크포인트 PostgreSQL 저장소.
//!
//! 시도할 때마다 `integration_sync_checkpoints`에 행을 추가하고,
//! 재시도 판단은 (워크스페이스, 연동, 날짜)의 가장 최근 행으로 합니다.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use ir_core::{CheckpointStatus, CheckpointTransition, NewSyncCheckpoint, SyncCheckpoint};
use sqlx::PgPool;
use uuid::Uuid;

use super::CheckpointStore;
use crate::error::CollectorError;
use crate::Result;

const CHECKPOINT_COLUMNS: &str = "id, workspace_id, integration_id, sync_date, status, \
     last_sync_attempt_at, last_successful_sync_at, error_message, created_at, updated_at";

/// DB에서 조회한 체크포인트 row
#[derive(sqlx::FromRow)]
struct CheckpointRow {
    id: Uuid,
    workspace_id: Uuid,
    integration_id: Uuid,
    sync_date: NaiveDate,
    status: String,
    last_sync_attempt_at: DateTime<Utc>,
    last_successful_sync_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CheckpointRow> for SyncCheckpoint {
    type Error = CollectorError;

    fn try_from(row: CheckpointRow) -> Result<Self> {
        let status: CheckpointStatus = row.status.parse().map_err(CollectorError::Checkpoint)?;
        Ok(SyncCheckpoint {
            id: row.id,
            workspace_id: row.workspace_id,
            integration_id: row.integration_id,
            sync_date: row.sync_date,
            status,
            last_sync_attempt_at: row.last_sync_attempt_at,
            last_successful_sync_at: row.last_successful_sync_at,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL 체크포인트 저장소.
#[derive(Clone)]
pub struct PgCheckpointStore {
    pool: PgPool,
}

impl PgCheckpointStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for PgCheckpointStore {
    async fn find_latest(
        &self,
        workspace_id: Uuid,
        integration_id: Uuid,
        sync_date: NaiveDate,
    ) -> Result<Option<SyncCheckpoint>> {
        let row: Option<CheckpointRow> = sqlx::query_as(&format!(
            r#"
            SELECT {CHECKPOINT_COLUMNS}
            FROM integration_sync_checkpoints
            WHERE workspace_id = $1 AND integration_id = $2 AND sync_date = $3
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(workspace_id)
        .bind(integration_id)
        .bind(sync_date)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SyncCheckpoint::try_from).transpose()
    }

    async fn insert(&self, checkpoint: NewSyncCheckpoint) -> Result<SyncCheckpoint> {
        let row: CheckpointRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO integration_sync_checkpoints
                (id, workspace_id, integration_id, sync_date, status,
                 last_sync_attempt_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6, $6)
            RETURNING {CHECKPOINT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(checkpoint.workspace_id)
        .bind(checkpoint.integration_id)
        .bind(checkpoint.sync_date)
        .bind(CheckpointStatus::Pending.as_str())
        .bind(checkpoint.attempted_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn update_status(&self, id: Uuid, transition: CheckpointTransition) -> Result<()> {
        let query = match &transition {
            CheckpointTransition::Succeeded { synced_at } => sqlx::query(
                r#"
                UPDATE integration_sync_checkpoints
                SET status = $1, error_message = NULL,
                    last_successful_sync_at = $2, updated_at = $2
                WHERE id = $3 AND status = 'pending'
                "#,
            )
            .bind(transition.status().as_str())
            .bind(*synced_at)
            .bind(id),
            CheckpointTransition::Failed { message, failed_at } => sqlx::query(
                r#"
                UPDATE integration_sync_checkpoints
                SET status = $1, error_message = $2, updated_at = $3
                WHERE id = $4 AND status = 'pending'
                "#,
            )
            .bind(transition.status().as_str())
            .bind(message.as_str())
            .bind(*failed_at)
            .bind(id),
        };

        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(CollectorError::Checkpoint(format!(
                "pending 체크포인트가 아닙니다: {}",
                id
            )));
        }
        Ok(())
    }

    async fn list_for_date(&self, sync_date: NaiveDate) -> Result<Vec<SyncCheckpoint>> {
        let rows: Vec<CheckpointRow> = sqlx::query_as(&format!(
            r#"
            SELECT {CHECKPOINT_COLUMNS}
            FROM integration_sync_checkpoints
            WHERE sync_date = $1
            ORDER BY workspace_id, integration_id, created_at
            "#
        ))
        .bind(sync_date)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SyncCheckpoint::try_from).collect()
    }
}
