//! 연동 데이터 포인트 PostgreSQL 저장소.

use async_trait::async_trait;
use chrono::Utc;
use ir_core::{latest_per_key, IntegrationDataPoint, WorkspaceIntegration};
use sqlx::PgPool;
use uuid::Uuid;

use super::DataPointSink;
use crate::error::CollectorError;
use crate::Result;

/// PostgreSQL 데이터 포인트 저장소.
///
/// 포인트 업서트와 `workspace_integrations.last_fetched_at` 갱신을
/// 하나의 트랜잭션으로 처리합니다.
#[derive(Clone)]
pub struct PgDataPointSink {
    pool: PgPool,
}

impl PgDataPointSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataPointSink for PgDataPointSink {
    async fn add_data_points(
        &self,
        integration: &WorkspaceIntegration,
        points: &[IntegrationDataPoint],
    ) -> Result<usize> {
        let persist = |e: sqlx::Error| CollectorError::Persistence(e.to_string());
        let now = Utc::now();
        let batch = latest_per_key(points);

        let mut tx = self.pool.begin().await.map_err(persist)?;

        for point in &batch {
            sqlx::query(
                r#"
                INSERT INTO integration_data_points
                    (id, workspace_integration_id, chart_key, point_name,
                     value, metadata, provider, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
                ON CONFLICT (workspace_integration_id, chart_key, point_name)
                DO UPDATE SET
                    value = EXCLUDED.value,
                    metadata = EXCLUDED.metadata,
                    provider = EXCLUDED.provider,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(integration.id)
            .bind(&point.chart_key)
            .bind(&point.point_name)
            .bind(point.value)
            .bind(&point.metadata)
            .bind(&point.provider)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(persist)?;
        }

        sqlx::query(
            r#"
            UPDATE workspace_integrations
            SET last_fetched_at = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(integration.last_fetched_at)
        .bind(now)
        .bind(integration.id)
        .execute(&mut *tx)
        .await
        .map_err(persist)?;

        tx.commit().await.map_err(persist)?;

        tracing::debug!(
            workspace_integration_id = %integration.id,
            points = batch.len(),
            "데이터 포인트 저장 완료"
        );

        Ok(batch.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::test_pool;
    use ir_core::{Integration, IntegrationKind};
    use serde_json::json;

    async fn seed_integration(pool: &PgPool) -> WorkspaceIntegration {
        let (ws, integ, wi) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        sqlx::query("INSERT INTO workspaces (id, name) VALUES ($1, 'Acme')")
            .bind(ws)
            .execute(pool)
            .await
            .expect("workspace");
        sqlx::query(
            "INSERT INTO integrations (id, name, provider_name, kind) VALUES ($1, 'Stripe', 'stripe', 'payments')",
        )
        .bind(integ)
        .execute(pool)
        .await
        .expect("integration");
        sqlx::query(
            "INSERT INTO workspace_integrations (id, workspace_id, integration_id) VALUES ($1, $2, $3)",
        )
        .bind(wi)
        .bind(ws)
        .bind(integ)
        .execute(pool)
        .await
        .expect("workspace integration");

        WorkspaceIntegration {
            id: wi,
            workspace_id: ws,
            integration: Integration {
                id: integ,
                name: "Stripe".to_string(),
                provider_name: "stripe".to_string(),
                kind: IntegrationKind::Payments,
                enabled: true,
            },
            enabled: true,
            active: true,
            access_token_ref: None,
            last_fetched_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_existing_point() {
        let pool = match test_pool().await {
            Some(p) => p,
            None => return,
        };
        let sink = PgDataPointSink::new(pool.clone());
        let integration = seed_integration(&pool).await;

        let first = vec![
            IntegrationDataPoint::new("mrr", "2024-01", 100, "stripe"),
            IntegrationDataPoint::new("mrr", "2024-02", 200, "stripe"),
        ];
        assert_eq!(sink.add_data_points(&integration, &first).await.expect("first"), 2);

        let second = vec![IntegrationDataPoint::new("mrr", "2024-01", 150, "stripe")
            .with_metadata(json!({"currency": "usd"}))];
        assert_eq!(sink.add_data_points(&integration, &second).await.expect("second"), 1);

        let rows: Vec<(String, i64, serde_json::Value)> = sqlx::query_as(
            "SELECT point_name, value, metadata FROM integration_data_points
             WHERE workspace_integration_id = $1 ORDER BY point_name",
        )
        .bind(integration.id)
        .fetch_all(&pool)
        .await
        .expect("select");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "2024-01");
        assert_eq!(rows[0].1, 150);
        assert_eq!(rows[0].2, json!({"currency": "usd"}));
        assert_eq!(rows[1].1, 200);
    }

    #[tokio::test]
    async fn stores_last_fetched_at_with_points() {
        let pool = match test_pool().await {
            Some(p) => p,
            None => return,
        };
        let sink = PgDataPointSink::new(pool.clone());
        let integration = seed_integration(&pool).await;

        sink.add_data_points(&integration, &[]).await.expect("empty batch");

        let (stored,): (Option<chrono::DateTime<Utc>>,) =
            sqlx::query_as("SELECT last_fetched_at FROM workspace_integrations WHERE id = $1")
                .bind(integration.id)
                .fetch_one(&pool)
                .await
                .expect("select");
        assert!(stored.is_some());
    }
}
