//! 동기화 작업 워커 풀.
//!
//! 오케스트레이터 하나가 bounded 큐에 작업을 넣고, 고정된 수의 워커가
//! 큐를 공유하여 작업을 하나씩 처리합니다. 작업마다 순서는 항상
//! `Pending` 삽입 → 수집 → 저장 → 종결 전이입니다.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use ir_core::{
    CheckpointStatus, CheckpointTransition, FetchRequest, IdGenerator, IntegrationDataPoint,
    NewSyncCheckpoint, ProviderClient, Workspace, WorkspaceIntegration,
};
use secrecy::SecretString;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn, Instrument};
use uuid::Uuid;

use crate::error::CollectorError;
use crate::repository::{CheckpointStore, DataPointSink};
use crate::stats::SyncStats;
use crate::Result;

/// 워커 하나가 처리할 동기화 작업.
pub struct SyncJob {
    pub workspace: Workspace,
    pub integration: WorkspaceIntegration,
    pub client: Arc<dyn ProviderClient>,
    pub credential: SecretString,
    /// 실행 시작 시 정한 UTC 날짜
    pub sync_date: NaiveDate,
}

impl std::fmt::Debug for SyncJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncJob")
            .field("workspace_id", &self.workspace.id)
            .field("integration_id", &self.integration.integration_id())
            .field("provider", &self.integration.provider_name())
            .field("sync_date", &self.sync_date)
            .finish()
    }
}

/// 워커가 공유하는 협력자.
#[derive(Clone)]
pub struct WorkerContext {
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub sink: Arc<dyn DataPointSink>,
    pub id_generator: Arc<dyn IdGenerator>,
    /// 제공자 호출 제한 시간 (`None`이면 무제한)
    pub fetch_timeout: Option<Duration>,
    pub cancel: CancellationToken,
}

/// 실행마다 새로 만드는 워커 풀.
pub struct WorkerPool {
    sender: mpsc::Sender<SyncJob>,
    workers: JoinSet<SyncStats>,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// `worker_count`개의 워커와 용량 `capacity`의 작업 큐를 만듭니다.
    ///
    /// 두 값 모두 최소 1로 보정합니다.
    pub fn spawn(worker_count: usize, capacity: usize, ctx: WorkerContext) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let cancel = ctx.cancel.clone();

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count.max(1) {
            let receiver = Arc::clone(&receiver);
            let ctx = ctx.clone();
            workers.spawn(run_worker(worker_id, receiver, ctx));
        }

        debug!(workers = worker_count.max(1), capacity = capacity.max(1), "워커 풀 시작");

        Self {
            sender,
            workers,
            cancel,
        }
    }

    /// 작업을 큐에 넣습니다. 큐가 가득 차면 자리가 날 때까지 기다립니다.
    ///
    /// # Errors
    ///
    /// - `CollectorError::Cancelled`: 대기 중 실행이 취소됨
    /// - `CollectorError::PoolClosed`: 모든 워커가 종료됨
    pub async fn submit(&self, job: SyncJob) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CollectorError::Cancelled),
            sent = self.sender.send(job) => sent.map_err(|_| CollectorError::PoolClosed),
        }
    }

    /// 큐를 닫고 모든 워커가 끝날 때까지 기다린 뒤 워커 통계를 합산합니다.
    pub async fn finish(self) -> SyncStats {
        let WorkerPool {
            sender,
            mut workers,
            ..
        } = self;
        drop(sender);

        let mut total = SyncStats::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(stats) => total.merge(&stats),
                Err(e) => error!(error = %e, "워커 태스크 비정상 종료"),
            }
        }
        total
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<SyncJob>>>,
    ctx: WorkerContext,
) -> SyncStats {
    let mut stats = SyncStats::new();

    loop {
        let job = {
            let mut rx = receiver.lock().await;
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => None,
                job = rx.recv() => job,
            }
        };

        let Some(job) = job else {
            break;
        };

        let span = ir_core::sync_span!(
            "sync_job",
            job.workspace.id,
            job.integration.integration_id(),
            job.integration.provider_name()
        );
        process_job(&ctx, job, &mut stats).instrument(span).await;
    }

    debug!(
        worker_id,
        succeeded = stats.succeeded,
        failed = stats.failed,
        abandoned = stats.abandoned,
        "워커 종료"
    );
    stats
}

/// 작업 하나를 끝까지 처리합니다.
///
/// 수집과 저장은 별도 태스크에서 실행합니다. 제공자 클라이언트가 패닉해도
/// 워커는 계속 동작하고 체크포인트는 `Failed`로 기록됩니다.
async fn process_job(ctx: &WorkerContext, job: SyncJob, stats: &mut SyncStats) {
    let SyncJob {
        workspace,
        integration,
        client,
        credential,
        sync_date,
    } = job;

    let pending = NewSyncCheckpoint::pending(
        workspace.id,
        integration.integration_id(),
        sync_date,
        Utc::now(),
    );
    let checkpoint = match ctx.checkpoints.insert(pending).await {
        Ok(checkpoint) => checkpoint,
        Err(e) => {
            error!(error = %e, "체크포인트 생성 실패, 작업 중단");
            stats.abandoned += 1;
            return;
        }
    };

    let mut transfer = tokio::spawn(
        fetch_and_persist(ctx.clone(), workspace.id, integration, client, credential)
            .in_current_span(),
    );

    let joined = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => {
            transfer.abort();
            warn!(checkpoint_id = %checkpoint.id, "작업 중 취소됨, 체크포인트는 pending으로 남음");
            stats.abandoned += 1;
            return;
        }
        joined = &mut transfer => joined,
    };

    match joined {
        Ok(Ok(saved)) => {
            let transition = CheckpointTransition::succeeded(Utc::now());
            if finish_checkpoint(ctx, checkpoint.id, transition, stats).await {
                stats.data_points += saved;
            }
        }
        Ok(Err(e)) => {
            let transition = CheckpointTransition::failed(e.to_string(), Utc::now());
            finish_checkpoint(ctx, checkpoint.id, transition, stats).await;
        }
        Err(e) if e.is_panic() => {
            let message = panic_message(e.into_panic());
            error!(checkpoint_id = %checkpoint.id, panic = %message, "수집 작업 패닉");
            let transition = CheckpointTransition::failed(format!("panic: {}", message), Utc::now());
            finish_checkpoint(ctx, checkpoint.id, transition, stats).await;
        }
        Err(e) => {
            warn!(checkpoint_id = %checkpoint.id, error = %e, "수집 작업 중단됨");
            stats.abandoned += 1;
        }
    }
}

/// 제공자에서 포인트를 가져와 저장하고 저장된 포인트 수를 반환합니다.
async fn fetch_and_persist(
    ctx: WorkerContext,
    workspace_id: Uuid,
    mut integration: WorkspaceIntegration,
    client: Arc<dyn ProviderClient>,
    credential: SecretString,
) -> Result<usize> {
    let request = FetchRequest {
        integration_id: integration.integration_id(),
        workspace_id,
        id_generator: ctx.id_generator.as_ref(),
        last_fetched_at: integration.last_fetched_at,
    };

    let points =
        match fetch_with_timeout(client.as_ref(), &credential, request, ctx.fetch_timeout).await {
            Ok(points) => points,
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "데이터 수집 실패");
                return Err(e);
            }
        };

    integration.last_fetched_at = Some(Utc::now());

    match ctx.sink.add_data_points(&integration, &points).await {
        Ok(saved) => {
            debug!(points = saved, "데이터 포인트 저장 완료");
            Ok(saved)
        }
        Err(e) => {
            warn!(error = %e, "데이터 포인트 저장 실패");
            Err(e)
        }
    }
}

async fn fetch_with_timeout(
    client: &dyn ProviderClient,
    credential: &SecretString,
    request: FetchRequest<'_>,
    limit: Option<Duration>,
) -> Result<Vec<IntegrationDataPoint>> {
    let fetch = client.fetch_data_points(credential, request);
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fetch).await {
            Ok(fetched) => fetched.map_err(CollectorError::from),
            Err(_) => Err(CollectorError::Timeout(limit)),
        },
        None => fetch.await.map_err(CollectorError::from),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 종결 전이를 기록하고 통계를 갱신합니다. 기록에 성공하면 `true`.
async fn finish_checkpoint(
    ctx: &WorkerContext,
    checkpoint_id: Uuid,
    transition: CheckpointTransition,
    stats: &mut SyncStats,
) -> bool {
    let status = transition.status();
    match ctx.checkpoints.update_status(checkpoint_id, transition).await {
        Ok(()) => {
            match status {
                CheckpointStatus::Success => stats.succeeded += 1,
                CheckpointStatus::Failed => stats.failed += 1,
                CheckpointStatus::Pending => {}
            }
            true
        }
        Err(e) => {
            error!(
                checkpoint_id = %checkpoint_id,
                status = status.as_str(),
                error = %e,
                "체크포인트 갱신 실패"
            );
            stats.abandoned += 1;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use ir_core::{Integration, IntegrationKind, ProviderError, SyncCheckpoint, UuidGenerator};

    #[derive(Default)]
    struct MemoryCheckpoints {
        rows: StdMutex<Vec<SyncCheckpoint>>,
    }

    #[async_trait]
    impl CheckpointStore for MemoryCheckpoints {
        async fn find_latest(&self, _: Uuid, _: Uuid, _: NaiveDate) -> Result<Option<SyncCheckpoint>> {
            Ok(None)
        }

        async fn insert(&self, new: NewSyncCheckpoint) -> Result<SyncCheckpoint> {
            let row = SyncCheckpoint {
                id: Uuid::new_v4(),
                workspace_id: new.workspace_id,
                integration_id: new.integration_id,
                sync_date: new.sync_date,
                status: CheckpointStatus::Pending,
                last_sync_attempt_at: new.attempted_at,
                last_successful_sync_at: None,
                error_message: None,
                created_at: new.attempted_at,
                updated_at: new.attempted_at,
            };
            self.rows.lock().unwrap().push(row.clone());
            Ok(row)
        }

        async fn update_status(&self, id: Uuid, transition: CheckpointTransition) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|r| r.id == id && r.status == CheckpointStatus::Pending)
                .ok_or_else(|| CollectorError::Checkpoint("not pending".into()))?;
            row.apply(&transition);
            Ok(())
        }

        async fn list_for_date(&self, _: NaiveDate) -> Result<Vec<SyncCheckpoint>> {
            Ok(self.rows.lock().unwrap().clone())
        }
    }

    struct CountingSink(AtomicUsize);

    #[async_trait]
    impl DataPointSink for CountingSink {
        async fn add_data_points(
            &self,
            _integration: &WorkspaceIntegration,
            points: &[IntegrationDataPoint],
        ) -> Result<usize> {
            self.0.fetch_add(points.len(), Ordering::SeqCst);
            Ok(points.len())
        }
    }

    enum Behavior {
        Points(usize),
        Fail,
        Hang,
        Panic,
    }

    struct ScriptedClient(Behavior);

    #[async_trait]
    impl ProviderClient for ScriptedClient {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn fetch_data_points(
            &self,
            _credential: &SecretString,
            _request: FetchRequest<'_>,
        ) -> std::result::Result<Vec<IntegrationDataPoint>, ProviderError> {
            match self.0 {
                Behavior::Points(n) => Ok((0..n)
                    .map(|i| IntegrationDataPoint::new("mrr", format!("2024-{:02}", i + 1), 100, "scripted"))
                    .collect()),
                Behavior::Fail => Err(ProviderError::Authentication("token revoked".into())),
                Behavior::Hang => {
                    std::future::pending::<()>().await;
                    Ok(vec![])
                }
                Behavior::Panic => panic!("provider bug"),
            }
        }
    }

    fn job(behavior: Behavior) -> SyncJob {
        let workspace = Workspace::new(Uuid::new_v4(), "Acme");
        let integration = WorkspaceIntegration {
            id: Uuid::new_v4(),
            workspace_id: workspace.id,
            integration: Integration {
                id: Uuid::new_v4(),
                name: "Scripted".into(),
                provider_name: "scripted".into(),
                kind: IntegrationKind::Other,
                enabled: true,
            },
            enabled: true,
            active: true,
            access_token_ref: Some("ref".into()),
            last_fetched_at: None,
        };
        SyncJob {
            workspace,
            integration,
            client: Arc::new(ScriptedClient(behavior)),
            credential: SecretString::from("token".to_string()),
            sync_date: Utc::now().date_naive(),
        }
    }

    fn context(
        checkpoints: Arc<MemoryCheckpoints>,
        sink: Arc<CountingSink>,
        fetch_timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> WorkerContext {
        WorkerContext {
            checkpoints,
            sink,
            id_generator: Arc::new(UuidGenerator),
            fetch_timeout,
            cancel,
        }
    }

    #[tokio::test]
    async fn test_pool_processes_every_job_once() {
        let checkpoints = Arc::new(MemoryCheckpoints::default());
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        let pool = WorkerPool::spawn(
            3,
            2,
            context(checkpoints.clone(), sink.clone(), None, CancellationToken::new()),
        );

        for _ in 0..5 {
            pool.submit(job(Behavior::Points(2))).await.unwrap();
        }
        pool.submit(job(Behavior::Fail)).await.unwrap();
        let stats = pool.finish().await;

        assert_eq!(stats.succeeded, 5);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.data_points, 10);
        assert_eq!(sink.0.load(Ordering::SeqCst), 10);

        let rows = checkpoints.rows.lock().unwrap();
        assert_eq!(rows.len(), 6);
        let failed: Vec<_> = rows.iter().filter(|r| r.status == CheckpointStatus::Failed).collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].error_message.as_deref().unwrap().contains("token revoked"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_marks_failed() {
        let checkpoints = Arc::new(MemoryCheckpoints::default());
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        let pool = WorkerPool::spawn(
            1,
            1,
            context(
                checkpoints.clone(),
                sink,
                Some(Duration::from_secs(5)),
                CancellationToken::new(),
            ),
        );

        pool.submit(job(Behavior::Hang)).await.unwrap();
        let stats = pool.finish().await;

        assert_eq!(stats.failed, 1);
        let rows = checkpoints.rows.lock().unwrap();
        assert_eq!(rows[0].status, CheckpointStatus::Failed);
        assert!(rows[0].error_message.as_deref().unwrap().contains("timeout after 5s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_second_timeout_keeps_precision() {
        let checkpoints = Arc::new(MemoryCheckpoints::default());
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        let pool = WorkerPool::spawn(
            1,
            1,
            context(
                checkpoints.clone(),
                sink,
                Some(Duration::from_millis(250)),
                CancellationToken::new(),
            ),
        );

        pool.submit(job(Behavior::Hang)).await.unwrap();
        pool.finish().await;

        let rows = checkpoints.rows.lock().unwrap();
        let message = rows[0].error_message.as_deref().unwrap();
        assert!(message.contains("250ms"), "unexpected message: {message}");
        assert!(!message.contains("0s"));
    }

    #[tokio::test]
    async fn test_panicking_client_does_not_kill_worker() {
        let checkpoints = Arc::new(MemoryCheckpoints::default());
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        let pool = WorkerPool::spawn(
            1,
            4,
            context(checkpoints.clone(), sink.clone(), None, CancellationToken::new()),
        );

        pool.submit(job(Behavior::Panic)).await.unwrap();
        for _ in 0..3 {
            pool.submit(job(Behavior::Points(1))).await.unwrap();
        }
        let stats = pool.finish().await;

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.succeeded, 3);
        assert_eq!(stats.abandoned, 0);
        assert_eq!(sink.0.load(Ordering::SeqCst), 3);

        let rows = checkpoints.rows.lock().unwrap();
        assert!(rows.iter().all(|r| r.status != CheckpointStatus::Pending));
        let failed = rows.iter().find(|r| r.status == CheckpointStatus::Failed).unwrap();
        assert!(failed.error_message.as_deref().unwrap().contains("provider bug"));
    }

    #[tokio::test]
    async fn test_cancel_leaves_in_flight_job_pending() {
        let checkpoints = Arc::new(MemoryCheckpoints::default());
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        let cancel = CancellationToken::new();
        let pool = WorkerPool::spawn(1, 1, context(checkpoints.clone(), sink, None, cancel.clone()));

        pool.submit(job(Behavior::Hang)).await.unwrap();
        while checkpoints.rows.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        let stats = pool.finish().await;

        assert_eq!(stats.abandoned, 1);
        assert_eq!(stats.succeeded + stats.failed, 0);
        let rows = checkpoints.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, CheckpointStatus::Pending);
    }

    #[tokio::test]
    async fn test_submit_after_cancel_is_rejected() {
        let checkpoints = Arc::new(MemoryCheckpoints::default());
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        let cancel = CancellationToken::new();
        let pool = WorkerPool::spawn(1, 1, context(checkpoints, sink, None, cancel.clone()));

        cancel.cancel();
        let result = pool.submit(job(Behavior::Points(1))).await;
        assert!(matches!(result, Err(CollectorError::Cancelled)));
        pool.finish().await;
    }
}
