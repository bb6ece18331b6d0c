//! 환경변수 기반 설정 모듈.

use std::time::Duration;

use ir_core::SyncMode;
use secrecy::SecretString;

use crate::error::CollectorError;
use crate::modules::SyncOptions;
use crate::Result;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// 연동 토큰 복호화용 마스터 키 (Base64). 동기화 실행에만 필요
    pub encryption_master_key: Option<SecretString>,
    /// 연동 동기화 설정
    pub sync: SyncConfig,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// 연동 동기화 설정
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 워커 수
    pub worker_count: usize,
    /// 작업 큐 용량 = 워크스페이스 수 × 이 값
    pub queue_factor: usize,
    /// 실행 모드
    pub mode: SyncMode,
    /// 제공자 호출 제한 시간 (초, 0이면 무제한)
    pub fetch_timeout_secs: u64,
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 실행 주기 (분 단위)
    pub interval_minutes: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            CollectorError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })?;

        let encryption_master_key = std::env::var("ENCRYPTION_MASTER_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from);

        let mode = match std::env::var("SYNC_MODE") {
            Ok(raw) => raw.parse().map_err(CollectorError::Config)?,
            Err(_) => SyncMode::default(),
        };

        Ok(Self {
            database_url,
            encryption_master_key,
            sync: SyncConfig {
                worker_count: env_var_parse("SYNC_WORKER_COUNT", 10),
                queue_factor: env_var_parse("SYNC_QUEUE_FACTOR", 3),
                mode,
                fetch_timeout_secs: env_var_parse("SYNC_FETCH_TIMEOUT_SECS", 0),
            },
            daemon: DaemonConfig {
                interval_minutes: env_var_parse("DAEMON_INTERVAL_MINUTES", 24 * 60),
            },
        })
    }

    /// 동기화 실행에 필요한 마스터 키를 반환합니다.
    ///
    /// # Errors
    ///
    /// `ENCRYPTION_MASTER_KEY`가 설정되지 않았으면 `CollectorError::Config`.
    pub fn master_key(&self) -> Result<&SecretString> {
        self.encryption_master_key.as_ref().ok_or_else(|| {
            CollectorError::Config(
                "ENCRYPTION_MASTER_KEY 환경변수가 설정되지 않았습니다".to_string(),
            )
        })
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            worker_count: 10,
            queue_factor: 3,
            mode: SyncMode::default(),
            fetch_timeout_secs: 0,
        }
    }
}

impl SyncConfig {
    /// 제공자 호출 제한 시간을 Duration으로 반환
    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_secs > 0).then(|| Duration::from_secs(self.fetch_timeout_secs))
    }

    /// 오케스트레이터 옵션으로 변환
    pub fn to_options(&self) -> SyncOptions {
        SyncOptions {
            worker_count: self.worker_count,
            queue_factor: self.queue_factor,
            mode: self.mode,
            fetch_timeout: self.fetch_timeout(),
        }
    }
}

impl DaemonConfig {
    /// 실행 주기를 Duration으로 반환 (최소 1분)
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1).saturating_mul(60))
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
