//! 외부 데이터 제공자 클라이언트 추상화.
//!
//! 은행, 결제, 분석 서비스마다 이 trait를 구현하면 동기화 파이프라인은
//! 제공자별 API 형식을 몰라도 데이터 포인트를 수집할 수 있습니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use thiserror::Error;
use uuid::Uuid;

use super::IntegrationDataPoint;

// =============================================================================
// 에러 타입
// =============================================================================

/// Provider 에러.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 네트워크 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 인증 실패
    #[error("인증 실패: {0}")]
    Authentication(String),

    /// 요청 한도 초과
    #[error("요청 한도 초과: {0}")]
    RateLimit(String),

    /// API 에러
    #[error("API 에러: {0}")]
    Api(String),

    /// 파싱 에러
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 기타 에러
    #[error("기타 에러: {0}")]
    Other(String),
}

impl ProviderError {
    /// 다음 실행에서 재시도해도 의미가 있는 에러인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Network(_) | ProviderError::RateLimit(_))
    }
}

// =============================================================================
// ID 생성기
// =============================================================================

/// 클라이언트가 새 엔티티(차트 등)를 만들 때 사용할 ID 생성기.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Uuid;
}

/// UUID v4 생성기.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

// =============================================================================
// ProviderClient Trait
// =============================================================================

/// 단일 수집 요청.
pub struct FetchRequest<'a> {
    pub integration_id: Uuid,
    pub workspace_id: Uuid,
    pub id_generator: &'a dyn IdGenerator,
    /// 증분 수집을 지원하는 제공자가 사용하는 마지막 수집 시각
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for FetchRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchRequest")
            .field("integration_id", &self.integration_id)
            .field("workspace_id", &self.workspace_id)
            .field("last_fetched_at", &self.last_fetched_at)
            .finish()
    }
}

/// 외부 데이터 제공자 클라이언트 trait.
///
/// # 구현 예시
///
/// ```ignore
/// pub struct StripeClient {
///     http: reqwest::Client,
/// }
///
/// #[async_trait]
/// impl ProviderClient for StripeClient {
///     fn provider_name(&self) -> &str {
///         "stripe"
///     }
///
///     async fn fetch_data_points(
///         &self,
///         credential: &SecretString,
///         request: FetchRequest<'_>,
///     ) -> Result<Vec<IntegrationDataPoint>, ProviderError> {
///         // Stripe API 호출 후 MRR 포인트로 변환
///     }
/// }
/// ```
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// 레지스트리 등록 키로 쓰이는 제공자 이름.
    fn provider_name(&self) -> &str;

    /// 제공자에서 데이터 포인트를 가져옵니다.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Authentication`: 토큰 만료/취소
    /// - `ProviderError::Network`: 연결 실패
    /// - `ProviderError::Api`: 제공자 API 에러
    async fn fetch_data_points(
        &self,
        credential: &SecretString,
        request: FetchRequest<'_>,
    ) -> Result<Vec<IntegrationDataPoint>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    /// 테스트용 MockProvider.
    struct MockProvider {
        should_fail: bool,
    }

    #[async_trait]
    impl ProviderClient for MockProvider {
        fn provider_name(&self) -> &str {
            "mock"
        }

        async fn fetch_data_points(
            &self,
            credential: &SecretString,
            request: FetchRequest<'_>,
        ) -> Result<Vec<IntegrationDataPoint>, ProviderError> {
            if self.should_fail {
                return Err(ProviderError::Authentication("token revoked".to_string()));
            }
            let chart = request.id_generator.next_id();
            Ok(vec![IntegrationDataPoint::new(
                chart.to_string(),
                "2024-01",
                credential.expose_secret().len() as i64,
                self.provider_name(),
            )])
        }
    }

    fn request(generator: &dyn IdGenerator) -> FetchRequest<'_> {
        FetchRequest {
            integration_id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            id_generator: generator,
            last_fetched_at: None,
        }
    }

    #[tokio::test]
    async fn test_mock_provider_success() {
        let provider = MockProvider { should_fail: false };
        let generator = UuidGenerator;
        let secret = SecretString::from("abcd".to_string());

        let points = provider
            .fetch_data_points(&secret, request(&generator))
            .await
            .unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 4);
        assert_eq!(points[0].provider, "mock");
    }

    #[tokio::test]
    async fn test_mock_provider_error() {
        let provider = MockProvider { should_fail: true };
        let generator = UuidGenerator;
        let secret = SecretString::from("abcd".to_string());

        let result = provider.fetch_data_points(&secret, request(&generator)).await;
        let err = result.unwrap_err();
        assert!(matches!(err, ProviderError::Authentication(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_uuid_generator_unique() {
        let generator = UuidGenerator;
        assert_ne!(generator.next_id(), generator.next_id());
    }
}
