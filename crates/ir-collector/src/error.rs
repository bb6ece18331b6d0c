//! 에러 타입 정의.

use std::time::Duration;

use ir_core::{CryptoError, ProviderError};
use thiserror::Error;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 데이터베이스 에러
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 워크스페이스/연동 카탈로그 조회 실패
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// 체크포인트 저장소 에러
    #[error("Checkpoint store error: {0}")]
    Checkpoint(String),

    /// 시크릿 조회 실패
    #[error("Secret resolution failed: {0}")]
    Secret(String),

    /// 레지스트리에 등록되지 않은 제공자
    #[error("Provider client not found: {0}")]
    ProviderNotFound(String),

    /// 데이터 제공자 에러
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// 데이터 포인트 저장 실패
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// 수집 제한 시간 초과
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// 실행 취소
    #[error("Sync run cancelled")]
    Cancelled,

    /// 워커가 모두 종료되어 작업을 넣을 수 없음
    #[error("Worker pool closed")]
    PoolClosed,

    /// 암호화 에러
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// 스키마 마이그레이션 실패
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl CollectorError {
    /// 다음 실행에서 재시도하면 성공할 수 있는 에러인지 여부
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_transient(),
            Self::Timeout(_) | Self::Database(_) => true,
            _ => false,
        }
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
