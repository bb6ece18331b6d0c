//! 동기화 실행 통계.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 한 번의 동기화 실행 통계.
///
/// 워커는 각자 통계를 쌓고 종료 시 오케스트레이터가 합산합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// 처리한 워크스페이스 수
    pub workspaces: usize,
    /// 목록 조회에 실패해 건너뛴 워크스페이스 수
    pub workspace_errors: usize,
    /// 살펴본 연동 수
    pub integrations: usize,
    /// 활성화 플래그로 걸러진 연동 수
    pub gated: usize,
    /// 오늘 이미 처리되어 제외된 연동 수
    pub ineligible: usize,
    /// 클라이언트/시크릿/체크포인트 조회 문제로 건너뛴 연동 수
    pub skipped: usize,
    /// 큐에 넣은 작업 수
    pub enqueued: usize,
    /// 성공한 작업 수
    pub succeeded: usize,
    /// 실패한 작업 수
    pub failed: usize,
    /// 체크포인트 생성 실패 또는 취소로 중단된 작업 수
    pub abandoned: usize,
    /// 저장된 데이터 포인트 수
    pub data_points: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 워커 통계를 합산합니다.
    pub fn merge(&mut self, other: &SyncStats) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.abandoned += other.abandoned;
        self.data_points += other.data_points;
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        let finished = self.succeeded + self.failed;
        if finished == 0 {
            0.0
        } else {
            (self.succeeded as f64 / finished as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            workspaces = self.workspaces,
            workspace_errors = self.workspace_errors,
            integrations = self.integrations,
            gated = self.gated,
            ineligible = self.ineligible,
            skipped = self.skipped,
            enqueued = self.enqueued,
            succeeded = self.succeeded,
            failed = self.failed,
            abandoned = self.abandoned,
            data_points = self.data_points,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "동기화 완료"
        );
    }
}
