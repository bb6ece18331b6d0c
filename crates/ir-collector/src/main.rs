//! Integration sync collector CLI.

use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use ir_collector::repository::{
    run_migrations, CheckpointStore, PgCheckpointStore, PgDataPointSink, PgSecretResolver,
    PgWorkspaceCatalog,
};
use ir_collector::{CollectorConfig, CollectorError, IntegrationSyncer, ProviderRegistry, SyncDeps};
use ir_core::{CredentialEncryptor, LogConfig, SyncMode};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "ir-collector")]
#[command(about = "IR Platform Integration Sync Collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 연동 동기화 1회 실행
    Run {
        /// 실행 모드 (resume_failed, failed_only). 생략하면 SYNC_MODE 사용
        #[arg(long)]
        mode: Option<SyncMode>,
    },

    /// 데몬 모드: 주기적으로 연동 동기화 실행
    Daemon,

    /// 특정 날짜의 체크포인트 조회
    Checkpoints {
        /// 조회 날짜 (YYYY-MM-DD, 기본값: 오늘 UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 로깅 초기화
    let default_level = format!("ir_collector={0},ir_core={0}", cli.log_level);
    ir_core::init_logging(LogConfig::from_env(default_level)).map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!("IR Integration Collector 시작");

    // 설정 로드
    let mut config = CollectorConfig::from_env()?;
    tracing::debug!(
        worker_count = config.sync.worker_count,
        queue_factor = config.sync.queue_factor,
        mode = config.sync.mode.as_str(),
        "설정 로드 완료"
    );

    // DB 연결
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("데이터베이스 연결 실패")?;
    tracing::info!("데이터베이스 연결 성공");

    run_migrations(&pool).await.context("스키마 마이그레이션 실패")?;
    tracing::debug!("스키마 마이그레이션 완료");

    // Ctrl-C → 실행 취소
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("종료 신호 수신, 진행 중인 작업 취소");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Run { mode } => {
            if let Some(mode) = mode {
                config.sync.mode = mode;
            }
            let syncer = build_syncer(&pool, &config)?;
            syncer.run_sync(cancel).await?;
        }
        Commands::Daemon => {
            let syncer = build_syncer(&pool, &config)?;
            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}분) ===",
                config.daemon.interval_minutes
            );

            let mut interval = tokio::time::interval(config.daemon.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        match syncer.run_sync(cancel.clone()).await {
                            Ok(_) => {}
                            Err(CollectorError::Cancelled) => break,
                            Err(e) => tracing::error!("연동 동기화 실패: {}", e),
                        }

                        tracing::info!(
                            "=== 동기화 완료, 다음 실행: {}분 후 ===",
                            config.daemon.interval_minutes
                        );
                    }
                }
            }
        }
        Commands::Checkpoints { date } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let store = PgCheckpointStore::new(pool.clone());
            let rows = store.list_for_date(date).await?;

            tracing::info!(sync_date = %date, count = rows.len(), "체크포인트 조회");
            for row in &rows {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    row.workspace_id,
                    row.integration_id,
                    row.status,
                    row.last_sync_attempt_at.format("%H:%M:%S"),
                    row.error_message.as_deref().unwrap_or("-")
                );
            }
        }
    }

    pool.close().await;
    tracing::info!("IR Integration Collector 종료");

    Ok(())
}

/// PostgreSQL 저장소와 등록된 제공자 클라이언트로 실행기를 구성합니다.
fn build_syncer(pool: &PgPool, config: &CollectorConfig) -> anyhow::Result<IntegrationSyncer> {
    let encryptor = CredentialEncryptor::new(config.master_key()?.expose_secret())
        .context("암호화 키 로드 실패")?;

    let registry = provider_registry();
    if registry.is_empty() {
        tracing::warn!("등록된 제공자 클라이언트가 없습니다. 모든 연동을 건너뜁니다");
    } else {
        tracing::info!(providers = ?registry.provider_names(), "제공자 클라이언트 등록");
    }

    let deps = SyncDeps::new(
        Arc::new(PgWorkspaceCatalog::new(pool.clone())),
        Arc::new(PgSecretResolver::new(pool.clone(), Arc::new(encryptor))),
        registry,
        Arc::new(PgCheckpointStore::new(pool.clone())),
        Arc::new(PgDataPointSink::new(pool.clone())),
    );

    Ok(IntegrationSyncer::new(deps, config.sync.to_options()))
}

/// 제공자 클라이언트 등록 지점.
///
/// 제공자별 API 클라이언트는 별도 crate에서 `ProviderClient`를 구현하고
/// 여기서 `register`합니다.
fn provider_registry() -> ProviderRegistry {
    ProviderRegistry::new()
}
