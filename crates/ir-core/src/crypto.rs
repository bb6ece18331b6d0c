//! # 암호화 모듈
//!
//! 연동 액세스 토큰을 AES-256-GCM으로 암호화/복호화합니다.
//!
//! ## 보안 고려사항
//! - 마스터 키는 환경변수(`ENCRYPTION_MASTER_KEY`)에서 Base64로 로드
//! - 토큰마다 고유한 nonce (12바이트) 사용, 암호문과 함께 저장
//! - 복호화 결과는 `SecretString`으로만 반환하여 로그 노출을 막음

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// 암호화 에러
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid master key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid nonce length: expected 12 bytes, got {0}")]
    InvalidNonceLength(usize),

    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),

    #[error("UTF-8 decode error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
}

/// AES-256-GCM nonce 크기 (바이트)
pub const NONCE_SIZE: usize = 12;

/// AES-256 키 크기 (바이트)
pub const KEY_SIZE: usize = 32;

/// 암호화된 토큰 (암호문 + nonce).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedSecret {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
}

/// 자격증명 암호화 관리자
pub struct CredentialEncryptor {
    cipher: Aes256Gcm,
}

impl CredentialEncryptor {
    /// Base64 마스터 키로 생성합니다.
    ///
    /// ```ignore
    /// let key = std::env::var("ENCRYPTION_MASTER_KEY")?;
    /// let encryptor = CredentialEncryptor::new(&key)?;
    /// ```
    pub fn new(master_key: &str) -> Result<Self, CryptoError> {
        let key_bytes = base64::engine::general_purpose::STANDARD.decode(master_key.trim())?;
        if key_bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength(key_bytes.len()));
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(Self { cipher })
    }

    /// 토큰을 암호화합니다.
    pub fn seal(&self, secret: &SecretString) -> Result<SealedSecret, CryptoError> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), secret.expose_secret().as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(SealedSecret { ciphertext, nonce })
    }

    /// 암호문을 복호화합니다.
    pub fn open(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<SecretString, CryptoError> {
        if nonce.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidNonceLength(nonce.len()));
        }

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        Ok(SecretString::from(String::from_utf8(plaintext)?))
    }
}

/// 새로운 마스터 키 생성 (초기 설정용)
///
/// # Example
/// ```
/// let key = ir_core::crypto::generate_master_key();
/// assert!(ir_core::CredentialEncryptor::new(&key).is_ok());
/// ```
pub fn generate_master_key() -> String {
    let mut key = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    base64::engine::general_purpose::STANDARD.encode(key)
}
