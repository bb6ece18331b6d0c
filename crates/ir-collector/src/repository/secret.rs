//! 암호화된 연동 토큰 조회.

use std::sync::Arc;

use async_trait::async_trait;
use ir_core::CredentialEncryptor;
use secrecy::SecretString;
use sqlx::PgPool;

use super::SecretResolver;
use crate::error::CollectorError;
use crate::Result;

/// `integration_secrets` 테이블에서 토큰을 읽어 복호화합니다.
#[derive(Clone)]
pub struct PgSecretResolver {
    pool: PgPool,
    encryptor: Arc<CredentialEncryptor>,
}

impl PgSecretResolver {
    pub fn new(pool: PgPool, encryptor: Arc<CredentialEncryptor>) -> Self {
        Self { pool, encryptor }
    }
}

#[async_trait]
impl SecretResolver for PgSecretResolver {
    async fn resolve(&self, token_ref: &str) -> Result<SecretString> {
        let row: Option<(Vec<u8>, Vec<u8>)> = sqlx::query_as(
            r#"
            SELECT ciphertext, nonce
            FROM integration_secrets
            WHERE token_ref = $1
            "#,
        )
        .bind(token_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CollectorError::Secret(e.to_string()))?;

        let (ciphertext, nonce) = row.ok_or_else(|| {
            CollectorError::Secret(format!("토큰을 찾을 수 없습니다: {}", token_ref))
        })?;

        self.encryptor
            .open(&ciphertext, &nonce)
            .map_err(|e| CollectorError::Secret(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::test_pool;
    use ir_core::crypto::generate_master_key;
    use secrecy::ExposeSecret;
    use uuid::Uuid;

    #[tokio::test]
    async fn resolves_sealed_token() {
        let pool = match test_pool().await {
            Some(p) => p,
            None => return,
        };
        let encryptor =
            Arc::new(CredentialEncryptor::new(&generate_master_key()).expect("encryptor"));
        let resolver = PgSecretResolver::new(pool.clone(), encryptor.clone());

        let token_ref = format!("ref-{}", Uuid::new_v4());
        let sealed = encryptor
            .seal(&SecretString::from("sk_live_123".to_string()))
            .expect("seal");
        sqlx::query("INSERT INTO integration_secrets (token_ref, ciphertext, nonce) VALUES ($1, $2, $3)")
            .bind(&token_ref)
            .bind(&sealed.ciphertext)
            .bind(sealed.nonce.as_slice())
            .execute(&pool)
            .await
            .expect("insert secret");

        let secret = resolver.resolve(&token_ref).await.expect("resolve");
        assert_eq!(secret.expose_secret(), "sk_live_123");

        let missing = resolver.resolve("ref-missing").await;
        assert!(matches!(missing, Err(CollectorError::Secret(_))));
    }
}
