//! 당일 동기화 대상 여부 판단.

use chrono::NaiveDate;
use ir_core::{CheckpointStatus, SyncMode};
use uuid::Uuid;

use crate::repository::CheckpointStore;
use crate::Result;

/// 최신 체크포인트 상태와 실행 모드로 시도 여부를 결정합니다.
pub fn should_attempt(latest: Option<CheckpointStatus>, mode: SyncMode) -> bool {
    mode.should_attempt(latest)
}

/// (워크스페이스, 연동, 날짜)의 최신 체크포인트를 읽고 시도 여부를 반환합니다.
///
/// # Errors
///
/// 체크포인트 조회 실패는 그대로 반환하며, 호출 측은 해당 연동만 건너뜁니다.
pub async fn is_eligible(
    checkpoints: &dyn CheckpointStore,
    workspace_id: Uuid,
    integration_id: Uuid,
    sync_date: NaiveDate,
    mode: SyncMode,
) -> Result<bool> {
    let latest = checkpoints
        .find_latest(workspace_id, integration_id, sync_date)
        .await?;

    let eligible = should_attempt(latest.as_ref().map(|c| c.status), mode);
    if !eligible {
        tracing::debug!(
            workspace_id = %workspace_id,
            integration_id = %integration_id,
            status = ?latest.map(|c| c.status),
            mode = mode.as_str(),
            "오늘 이미 처리된 연동"
        );
    }
    Ok(eligible)
}
