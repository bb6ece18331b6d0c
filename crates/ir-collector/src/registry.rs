//! 제공자 클라이언트 레지스트리.
//!
//! 연동의 제공자 이름(대소문자 무시)으로 수집 클라이언트를 찾습니다.

use std::collections::HashMap;
use std::sync::Arc;

use ir_core::ProviderClient;

use crate::error::CollectorError;
use crate::Result;

/// 제공자 이름 → 클라이언트 매핑.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    clients: HashMap<String, Arc<dyn ProviderClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 클라이언트를 `provider_name()` 키로 등록합니다. 같은 이름이 있으면 교체합니다.
    pub fn register(&mut self, client: Arc<dyn ProviderClient>) -> &mut Self {
        let key = normalize(client.provider_name());
        if self.clients.insert(key.clone(), client).is_some() {
            tracing::warn!(provider = %key, "제공자 클라이언트 교체");
        }
        self
    }

    pub fn with(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.register(client);
        self
    }

    /// 제공자 이름으로 클라이언트를 조회합니다.
    ///
    /// # Errors
    ///
    /// 등록되지 않은 이름이면 `CollectorError::ProviderNotFound`.
    pub fn get(&self, provider_name: &str) -> Result<Arc<dyn ProviderClient>> {
        self.clients
            .get(&normalize(provider_name))
            .cloned()
            .ok_or_else(|| CollectorError::ProviderNotFound(provider_name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// 등록된 제공자 이름 (정렬됨).
    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
