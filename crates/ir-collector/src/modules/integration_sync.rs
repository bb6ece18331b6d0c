//! 연동 데이터 동기화 오케스트레이터.
//!
//! 워크스페이스마다 연동을 나열하고, 활성화 플래그와 당일 체크포인트로
//! 대상을 고른 뒤 클라이언트와 자격증명을 준비하여 워커 풀에 넘깁니다.
//!
//! ## 실패 격리
//! - 워크스페이스 목록 조회 실패: 실행 전체 에러
//! - 한 워크스페이스의 연동 목록 조회 실패: 해당 워크스페이스만 건너뜀
//! - 클라이언트 미등록, 시크릿 조회 실패, 체크포인트 조회 실패: 해당 연동만 건너뜀
//! - 수집/저장 실패, 제공자 패닉: 체크포인트를 `Failed`로 기록 (워커)
//! - 워커 풀이 닫혀 작업을 넣지 못함: 풀을 비운 뒤 실행 전체 에러

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use ir_core::{IdGenerator, SyncMode, UuidGenerator, Workspace, WorkspaceIntegration};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use super::eligibility::is_eligible;
use super::worker::{SyncJob, WorkerContext, WorkerPool};
use crate::error::CollectorError;
use crate::registry::ProviderRegistry;
use crate::repository::{CheckpointStore, DataPointSink, SecretResolver, WorkspaceCatalog};
use crate::stats::SyncStats;
use crate::Result;

/// 동기화 실행 옵션.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// 동시에 작업을 처리할 워커 수
    pub worker_count: usize,
    /// 큐 용량 = 워크스페이스 수 × 이 값 (최소 1)
    pub queue_factor: usize,
    /// 재시도 대상 판단 모드
    pub mode: SyncMode,
    /// 제공자 호출 제한 시간
    pub fetch_timeout: Option<Duration>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            worker_count: 10,
            queue_factor: 3,
            mode: SyncMode::ResumeFailed,
            fetch_timeout: None,
        }
    }
}

impl SyncOptions {
    fn queue_capacity(&self, workspace_count: usize) -> usize {
        workspace_count.saturating_mul(self.queue_factor).max(1)
    }
}

/// 동기화에 필요한 외부 협력자 묶음.
#[derive(Clone)]
pub struct SyncDeps {
    pub catalog: Arc<dyn WorkspaceCatalog>,
    pub secrets: Arc<dyn SecretResolver>,
    pub registry: ProviderRegistry,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub sink: Arc<dyn DataPointSink>,
    pub id_generator: Arc<dyn IdGenerator>,
}

impl SyncDeps {
    /// 기본 `UuidGenerator`로 구성합니다.
    pub fn new(
        catalog: Arc<dyn WorkspaceCatalog>,
        secrets: Arc<dyn SecretResolver>,
        registry: ProviderRegistry,
        checkpoints: Arc<dyn CheckpointStore>,
        sink: Arc<dyn DataPointSink>,
    ) -> Self {
        Self {
            catalog,
            secrets,
            registry,
            checkpoints,
            sink,
            id_generator: Arc::new(UuidGenerator),
        }
    }
}

/// 연동 동기화 실행기.
///
/// 같은 인스턴스로 `run_sync`를 여러 번 호출할 수 있지만, 동시 실행은
/// 호출 측 스케줄러가 막아야 합니다.
pub struct IntegrationSyncer {
    deps: SyncDeps,
    options: SyncOptions,
}

impl IntegrationSyncer {
    pub fn new(deps: SyncDeps, options: SyncOptions) -> Self {
        Self { deps, options }
    }

    /// 모든 워크스페이스의 연동을 한 번 동기화합니다.
    ///
    /// 워커가 모두 끝난 뒤 반환합니다.
    ///
    /// # Errors
    ///
    /// - 워크스페이스 목록 조회 실패
    /// - `CollectorError::Cancelled`: 실행 중 취소됨 (진행 중이던 체크포인트는 `Pending`으로 남음)
    /// - `CollectorError::PoolClosed`: 워커가 모두 종료되어 남은 작업을 넣지 못함
    pub async fn run_sync(&self, cancel: CancellationToken) -> Result<SyncStats> {
        let started = Instant::now();
        let today = Utc::now().date_naive();

        info!(sync_date = %today, mode = self.options.mode.as_str(), "연동 동기화 시작");

        let workspaces = self.deps.catalog.list_workspaces().await?;
        let capacity = self.options.queue_capacity(workspaces.len());

        let pool = WorkerPool::spawn(
            self.options.worker_count,
            capacity,
            WorkerContext {
                checkpoints: Arc::clone(&self.deps.checkpoints),
                sink: Arc::clone(&self.deps.sink),
                id_generator: Arc::clone(&self.deps.id_generator),
                fetch_timeout: self.options.fetch_timeout,
                cancel: cancel.clone(),
            },
        );

        let mut stats = SyncStats::new();
        let mut submit_error = None;

        'workspaces: for workspace in &workspaces {
            if cancel.is_cancelled() {
                break;
            }
            stats.workspaces += 1;

            let listed = self
                .deps
                .catalog
                .list_integrations(workspace)
                .instrument(ir_core::sync_span!("list_integrations", workspace.id))
                .await;
            let integrations = match listed {
                Ok(integrations) => integrations,
                Err(e) => {
                    warn!(
                        workspace_id = %workspace.id,
                        error = %e,
                        "연동 목록 조회 실패, 워크스페이스 건너뜀"
                    );
                    stats.workspace_errors += 1;
                    continue;
                }
            };

            for integration in integrations {
                stats.integrations += 1;

                let Some(job) = self
                    .prepare_job(workspace, integration, today, &mut stats)
                    .await
                else {
                    continue;
                };

                match pool.submit(job).await {
                    Ok(()) => stats.enqueued += 1,
                    Err(CollectorError::Cancelled) => break 'workspaces,
                    Err(e) => {
                        error!(error = %e, "작업 등록 실패, 남은 연동 건너뜀");
                        submit_error = Some(e);
                        break 'workspaces;
                    }
                }
            }
        }

        let worker_stats = pool.finish().await;
        stats.merge(&worker_stats);
        stats.elapsed = started.elapsed();
        stats.log_summary("연동 동기화");

        if cancel.is_cancelled() {
            warn!("연동 동기화 취소됨");
            return Err(CollectorError::Cancelled);
        }
        if let Some(e) = submit_error {
            return Err(e);
        }

        Ok(stats)
    }

    /// 연동 하나를 검사하고 작업을 만듭니다. 건너뛰면 `None`.
    async fn prepare_job(
        &self,
        workspace: &Workspace,
        integration: WorkspaceIntegration,
        today: NaiveDate,
        stats: &mut SyncStats,
    ) -> Option<SyncJob> {
        let integration_id = integration.integration_id();

        if !integration.is_syncable() {
            debug!(
                workspace_id = %workspace.id,
                integration_id = %integration_id,
                catalog_enabled = integration.integration.enabled,
                enabled = integration.enabled,
                active = integration.active,
                "비활성 연동"
            );
            stats.gated += 1;
            return None;
        }

        match is_eligible(
            self.deps.checkpoints.as_ref(),
            workspace.id,
            integration_id,
            today,
            self.options.mode,
        )
        .await
        {
            Ok(true) => {}
            Ok(false) => {
                stats.ineligible += 1;
                return None;
            }
            Err(e) => {
                warn!(
                    workspace_id = %workspace.id,
                    integration_id = %integration_id,
                    error = %e,
                    "체크포인트 조회 실패, 연동 건너뜀"
                );
                stats.skipped += 1;
                return None;
            }
        }

        let client = match self.deps.registry.get(integration.provider_name()) {
            Ok(client) => client,
            Err(e) => {
                warn!(
                    workspace_id = %workspace.id,
                    integration_id = %integration_id,
                    error = %e,
                    "제공자 클라이언트 없음, 연동 건너뜀"
                );
                stats.skipped += 1;
                return None;
            }
        };

        let credential = match self.resolve_credential(&integration).await {
            Ok(credential) => credential,
            Err(e) => {
                warn!(
                    workspace_id = %workspace.id,
                    integration_id = %integration_id,
                    error = %e,
                    "자격증명 조회 실패, 연동 건너뜀"
                );
                stats.skipped += 1;
                return None;
            }
        };

        Some(SyncJob {
            workspace: workspace.clone(),
            integration,
            client,
            credential,
            sync_date: today,
        })
    }

    async fn resolve_credential(&self, integration: &WorkspaceIntegration) -> Result<SecretString> {
        let token_ref = integration
            .access_token_ref
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| CollectorError::Secret("액세스 토큰 참조가 없습니다".to_string()))?;

        self.deps.secrets.resolve(token_ref).await
    }
}
