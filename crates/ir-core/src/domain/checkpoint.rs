//! 일 단위 동기화 체크포인트 상태 머신.
//!
//! (워크스페이스, 연동, 날짜)마다 시도할 때마다 행이 하나씩 추가되며,
//! 재시도 판단은 당일 가장 최근 행 하나만 봅니다.
//!
//! ```text
//!  (행 없음) ──insert──▶ Pending ──┬──▶ Success
//!                                  └──▶ Failed
//! ```
//!
//! 크래시로 `Pending`에 멈춘 행은 다음 실행에서 재시도 대상이 됩니다.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 체크포인트 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStatus {
    /// 워커가 처리 중 (또는 처리 중 중단됨)
    Pending,
    /// 수집 및 저장 완료
    Success,
    /// 수집 또는 저장 실패
    Failed,
}

impl CheckpointStatus {
    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CheckpointStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown checkpoint status: {}", s)),
        }
    }
}

/// 저장된 체크포인트 행.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub integration_id: Uuid,
    /// 동기화 기준 날짜 (UTC)
    pub sync_date: NaiveDate,
    pub status: CheckpointStatus,
    pub last_sync_attempt_at: DateTime<Utc>,
    pub last_successful_sync_at: Option<DateTime<Utc>>,
    /// 실패 시에만 설정
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 작업 시작 시 삽입할 `Pending` 체크포인트.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSyncCheckpoint {
    pub workspace_id: Uuid,
    pub integration_id: Uuid,
    pub sync_date: NaiveDate,
    pub attempted_at: DateTime<Utc>,
}

impl NewSyncCheckpoint {
    pub fn pending(
        workspace_id: Uuid,
        integration_id: Uuid,
        sync_date: NaiveDate,
        attempted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            workspace_id,
            integration_id,
            sync_date,
            attempted_at,
        }
    }
}

/// `Pending` 체크포인트의 종결 전이.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointTransition {
    /// 성공: 에러 메시지를 지우고 마지막 성공 시각을 기록
    Succeeded { synced_at: DateTime<Utc> },
    /// 실패: 에러 메시지를 기록
    Failed {
        message: String,
        failed_at: DateTime<Utc>,
    },
}

impl CheckpointTransition {
    pub fn succeeded(synced_at: DateTime<Utc>) -> Self {
        Self::Succeeded { synced_at }
    }

    pub fn failed(message: impl Into<String>, failed_at: DateTime<Utc>) -> Self {
        Self::Failed {
            message: message.into(),
            failed_at,
        }
    }

    /// 전이 후 상태.
    pub fn status(&self) -> CheckpointStatus {
        match self {
            Self::Succeeded { .. } => CheckpointStatus::Success,
            Self::Failed { .. } => CheckpointStatus::Failed,
        }
    }

    /// 전이 시각 (`updated_at`에 기록).
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::Succeeded { synced_at } => *synced_at,
            Self::Failed { failed_at, .. } => *failed_at,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Succeeded { .. } => None,
            Self::Failed { message, .. } => Some(message),
        }
    }
}

impl SyncCheckpoint {
    /// 전이를 적용합니다. 인메모리 저장소와 테스트에서 사용합니다.
    pub fn apply(&mut self, transition: &CheckpointTransition) {
        self.status = transition.status();
        self.updated_at = transition.at();
        match transition {
            CheckpointTransition::Succeeded { synced_at } => {
                self.error_message = None;
                self.last_successful_sync_at = Some(*synced_at);
            }
            CheckpointTransition::Failed { message, .. } => {
                self.error_message = Some(message.clone());
            }
        }
    }
}

/// 실행 모드.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// 정기 실행 (기본값): 실패했거나 중단된(`Pending`) 연동을 재시도
    #[default]
    ResumeFailed,
    /// 수동 재실행: 명시적으로 실패한 연동만 재시도
    FailedOnly,
}

impl SyncMode {
    /// 당일 최신 체크포인트 상태를 보고 동기화를 시도할지 결정합니다.
    ///
    /// * `None` - 오늘 첫 시도이므로 항상 시도
    pub fn should_attempt(&self, latest: Option<CheckpointStatus>) -> bool {
        match (latest, self) {
            (None, _) => true,
            (Some(CheckpointStatus::Failed), _) => true,
            (Some(CheckpointStatus::Pending), SyncMode::ResumeFailed) => true,
            (Some(CheckpointStatus::Pending), SyncMode::FailedOnly) => false,
            (Some(CheckpointStatus::Success), _) => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResumeFailed => "resume_failed",
            Self::FailedOnly => "failed_only",
        }
    }
}

impl std::str::FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "resume_failed" | "resume" => Ok(Self::ResumeFailed),
            "failed_only" | "force" => Ok(Self::FailedOnly),
            _ => Err(format!("Unknown sync mode: {}", s)),
        }
    }
}
