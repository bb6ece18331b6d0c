//! 워크스페이스와 연동 카탈로그 타입.
//!
//! - `Workspace` - 연동과 데이터를 소유하는 테넌트
//! - `Integration` - 카탈로그에 등록된 외부 데이터 제공자
//! - `WorkspaceIntegration` - 워크스페이스별 연동 활성화 레코드

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 테넌트(조직) 단위 워크스페이스.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
}

impl Workspace {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// 연동 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationKind {
    /// 은행 계좌 (잔고, 현금 흐름)
    Banking,
    /// 결제 (매출, MRR)
    Payments,
    /// 분석 (트래픽, 활성 사용자)
    Analytics,
    /// 그 외
    Other,
}

impl IntegrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Banking => "banking",
            Self::Payments => "payments",
            Self::Analytics => "analytics",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for IntegrationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "banking" => Ok(Self::Banking),
            "payments" => Ok(Self::Payments),
            "analytics" => Ok(Self::Analytics),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown integration kind: {}", s)),
        }
    }
}

/// 카탈로그 수준 연동 정의.
///
/// `enabled`가 꺼져 있으면 워크스페이스 설정과 무관하게 전역적으로 비활성화됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub id: Uuid,
    pub name: String,
    /// Provider 레지스트리 조회 키 (대소문자 무시)
    pub provider_name: String,
    pub kind: IntegrationKind,
    pub enabled: bool,
}

/// 워크스페이스별 연동 활성화 레코드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceIntegration {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub integration: Integration,
    /// 워크스페이스에서 연동을 켰는지 여부
    pub enabled: bool,
    /// 연결이 살아 있는지 여부 (토큰 만료 등으로 꺼질 수 있음)
    pub active: bool,
    /// 시크릿 저장소의 불투명 참조값
    pub access_token_ref: Option<String>,
    /// 마지막으로 데이터를 가져온 시각 (증분 수집 기준점)
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl WorkspaceIntegration {
    /// 카탈로그 활성화, 워크스페이스 활성화, 연결 활성 상태를 모두 만족하는지 확인합니다.
    pub fn is_syncable(&self) -> bool {
        self.integration.enabled && self.enabled && self.active
    }

    /// 카탈로그 연동 ID.
    pub fn integration_id(&self) -> Uuid {
        self.integration.id
    }

    pub fn provider_name(&self) -> &str {
        &self.integration.provider_name
    }
}
