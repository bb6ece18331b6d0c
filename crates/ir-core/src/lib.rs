//! # IR Core
//!
//! 인베스터 릴레이션 플랫폼의 연동(integration) 동기화에 사용되는 핵심 타입을 제공합니다:
//! - 워크스페이스 및 연동 카탈로그 모델
//! - 일 단위 동기화 체크포인트 상태 머신
//! - 연동 데이터 포인트 (차트 시계열 샘플)
//! - 외부 데이터 제공자(Provider) 클라이언트 추상화
//! - 로깅 인프라
//! - 자격증명 암호화

pub mod crypto;
pub mod domain;
pub mod logging;

pub use crypto::{CredentialEncryptor, CryptoError};
pub use domain::*;
pub use logging::*;
