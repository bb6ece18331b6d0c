//! 워크스페이스/연동 카탈로그 PostgreSQL 구현.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ir_core::{Integration, IntegrationKind, Workspace, WorkspaceIntegration};
use sqlx::PgPool;
use uuid::Uuid;

use super::WorkspaceCatalog;
use crate::error::CollectorError;
use crate::Result;

/// 워크스페이스 연동 + 카탈로그 JOIN row
#[derive(sqlx::FromRow)]
struct WorkspaceIntegrationRow {
    id: Uuid,
    workspace_id: Uuid,
    enabled: bool,
    active: bool,
    access_token_ref: Option<String>,
    last_fetched_at: Option<DateTime<Utc>>,
    integration_id: Uuid,
    integration_name: String,
    provider_name: String,
    kind: String,
    integration_enabled: bool,
}

impl From<WorkspaceIntegrationRow> for WorkspaceIntegration {
    fn from(row: WorkspaceIntegrationRow) -> Self {
        let kind = row.kind.parse().unwrap_or_else(|_| {
            tracing::warn!(kind = %row.kind, integration_id = %row.integration_id, "알 수 없는 연동 분류");
            IntegrationKind::Other
        });

        WorkspaceIntegration {
            id: row.id,
            workspace_id: row.workspace_id,
            integration: Integration {
                id: row.integration_id,
                name: row.integration_name,
                provider_name: row.provider_name,
                kind,
                enabled: row.integration_enabled,
            },
            enabled: row.enabled,
            active: row.active,
            access_token_ref: row.access_token_ref,
            last_fetched_at: row.last_fetched_at,
        }
    }
}

/// PostgreSQL 카탈로그.
#[derive(Clone)]
pub struct PgWorkspaceCatalog {
    pool: PgPool,
}

impl PgWorkspaceCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkspaceCatalog for PgWorkspaceCatalog {
    async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT id, name
            FROM workspaces
            WHERE deleted_at IS NULL
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CollectorError::Catalog(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| Workspace::new(id, name))
            .collect())
    }

    async fn list_integrations(&self, workspace: &Workspace) -> Result<Vec<WorkspaceIntegration>> {
        let rows: Vec<WorkspaceIntegrationRow> = sqlx::query_as(
            r#"
            SELECT
                wi.id, wi.workspace_id, wi.enabled, wi.active,
                wi.access_token_ref, wi.last_fetched_at,
                i.id AS integration_id, i.name AS integration_name,
                i.provider_name, i.kind, i.enabled AS integration_enabled
            FROM workspace_integrations wi
            JOIN integrations i ON i.id = wi.integration_id
            WHERE wi.workspace_id = $1
            ORDER BY wi.created_at, wi.id
            "#,
        )
        .bind(workspace.id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CollectorError::Catalog(e.to_string()))?;

        Ok(rows.into_iter().map(WorkspaceIntegration::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::test_pool;

    #[tokio::test]
    async fn list_integrations_joins_catalog_flags() {
        let pool = match test_pool().await {
            Some(p) => p,
            None => return,
        };
        let catalog = PgWorkspaceCatalog::new(pool.clone());
        let (ws, integ, wi) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        sqlx::query("INSERT INTO workspaces (id, name) VALUES ($1, 'Acme')")
            .bind(ws)
            .execute(&pool)
            .await
            .expect("workspace");
        sqlx::query(
            "INSERT INTO integrations (id, name, provider_name, kind, enabled)
             VALUES ($1, 'Stripe', 'stripe', 'payments', false)",
        )
        .bind(integ)
        .execute(&pool)
        .await
        .expect("integration");
        sqlx::query(
            "INSERT INTO workspace_integrations (id, workspace_id, integration_id, access_token_ref)
             VALUES ($1, $2, $3, 'ref-1')",
        )
        .bind(wi)
        .bind(ws)
        .bind(integ)
        .execute(&pool)
        .await
        .expect("workspace integration");

        let workspaces = catalog.list_workspaces().await.expect("list workspaces");
        let workspace = workspaces
            .into_iter()
            .find(|w| w.id == ws)
            .expect("inserted workspace listed");

        let integrations = catalog
            .list_integrations(&workspace)
            .await
            .expect("list integrations");
        assert_eq!(integrations.len(), 1);
        let item = &integrations[0];
        assert_eq!(item.integration.kind, IntegrationKind::Payments);
        assert!(item.enabled && item.active);
        assert!(!item.integration.enabled);
        assert!(!item.is_syncable());
        assert_eq!(item.access_token_ref.as_deref(), Some("ref-1"));
    }
}
