//! Shared-store backing for per-tenant JSON config (spec §6 "Shared store":
//! JSON get/set under key `${tenantcfg-prefix}:${tenantId}`), grounded on
//! the same `redis` connection-manager pattern as
//! `voxgate_capacity::redis_store`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{ConfigError, Result};

#[async_trait]
pub trait TenantConfigStore: Send + Sync {
    async fn get_raw(&self, tenant_id: &str) -> Result<Option<String>>;
    async fn put_raw(&self, tenant_id: &str, json: &str) -> Result<()>;
}

/// Production backend: one Redis key per tenant under the configured prefix.
pub struct RedisTenantConfigStore {
    conn: redis::aio::ConnectionManager,
    key_prefix: String,
}

impl RedisTenantConfigStore {
    pub async fn connect(redis_url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| ConfigError::Backend(e.to_string()))?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| ConfigError::Backend(e.to_string()))?;
        Ok(Self {
            conn,
            key_prefix: key_prefix.into(),
        })
    }

    fn key(&self, tenant_id: &str) -> String {
        format!("{}:{}", self.key_prefix, tenant_id)
    }
}

#[async_trait]
impl TenantConfigStore for RedisTenantConfigStore {
    async fn get_raw(&self, tenant_id: &str) -> Result<Option<String>> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.get(self.key(tenant_id))
            .await
            .map_err(|e| ConfigError::Backend(e.to_string()))
    }

    async fn put_raw(&self, tenant_id: &str, json: &str) -> Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.set(self.key(tenant_id), json)
            .await
            .map_err(|e| ConfigError::Backend(e.to_string()))
    }
}

/// In-memory store used by tests and by the CLI's `--dry-run` mode.
#[derive(Default)]
pub struct InProcessTenantConfigStore {
    entries: Mutex<HashMap<String, String>>,
}

impl InProcessTenantConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantConfigStore for InProcessTenantConfigStore {
    async fn get_raw(&self, tenant_id: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(tenant_id).cloned())
    }

    async fn put_raw(&self, tenant_id: &str, json: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(tenant_id.to_string(), json.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_process_store_round_trips() {
        let store = InProcessTenantConfigStore::new();
        assert_eq!(store.get_raw("acme").await.unwrap(), None);
        store.put_raw("acme", "{\"a\":1}").await.unwrap();
        assert_eq!(store.get_raw("acme").await.unwrap(), Some("{\"a\":1}".to_string()));
    }
}
