//! `load`/`get`/`set`/`unset`/`merge` (spec §4.10), round-tripping
//! `TenantConfig` through `serde_json::Value` so dot-path operations can
//! reach any field, then validating the result against the schema.

use serde_json::Value;
use std::sync::Arc;

use crate::dotpath;
use crate::error::{ConfigError, Result};
use crate::schema::TenantConfig;
use crate::store::TenantConfigStore;

/// Fetch and schema-validate a tenant's config.
pub async fn load(store: &Arc<dyn TenantConfigStore>, tenant_id: &str) -> Result<TenantConfig> {
    let raw = store
        .get_raw(tenant_id)
        .await?
        .ok_or_else(|| ConfigError::NotFound(tenant_id.to_string()))?;
    let config: TenantConfig = serde_json::from_str(&raw)?;
    config.validate()?;
    Ok(config)
}

pub fn get(config: &TenantConfig, dot_path: &str) -> Result<Value> {
    let root = serde_json::to_value(config)?;
    dotpath::get(&root, dot_path)
        .cloned()
        .ok_or_else(|| ConfigError::InvalidPath(dot_path.to_string()))
}

/// Type-inferred scalar or JSON-subtree `set`, validated post-merge.
pub fn set(config: &TenantConfig, dot_path: &str, literal_or_json: &str) -> Result<TenantConfig> {
    let mut root = serde_json::to_value(config)?;
    dotpath::set(&mut root, dot_path, dotpath::infer_literal(literal_or_json))?;
    let updated: TenantConfig = serde_json::from_value(root)?;
    updated.validate()?;
    Ok(updated)
}

pub fn unset(config: &TenantConfig, dot_path: &str) -> Result<TenantConfig> {
    let mut root = serde_json::to_value(config)?;
    dotpath::unset(&mut root, dot_path)?;
    let updated: TenantConfig = serde_json::from_value(root)?;
    updated.validate()?;
    Ok(updated)
}

/// Deep JSON merge of an arbitrary patch document, validated post-merge.
pub fn merge(config: &TenantConfig, patch: Value) -> Result<TenantConfig> {
    let mut root = serde_json::to_value(config)?;
    dotpath::merge(&mut root, patch);
    let updated: TenantConfig = serde_json::from_value(root)?;
    updated.validate()?;
    Ok(updated)
}

pub async fn store(store: &Arc<dyn TenantConfigStore>, config: &TenantConfig) -> Result<()> {
    let raw = serde_json::to_string(config)?;
    store.put_raw(&config.tenant_id, &raw).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InProcessTenantConfigStore;
    use serde_json::json;

    fn sample() -> TenantConfig {
        serde_json::from_value(json!({
            "contractVersion": "v1",
            "tenantId": "acme",
            "dids": ["+15551234567"],
            "webhookSecretRef": "secrets/acme/webhook",
            "caps": {"maxConcurrentCallsTenant": 20, "maxCallsPerMinuteTenant": 30},
            "stt": {"mode": "disabled", "chunkMs": 20},
            "tts": {"mode": "kokoro_http", "kokoroUrl": "https://tts.example/synth"},
            "audio": {}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn load_round_trips_through_the_store() {
        let backing: Arc<dyn TenantConfigStore> = Arc::new(InProcessTenantConfigStore::new());
        let cfg = sample();
        store(&backing, &cfg).await.unwrap();
        let loaded = load(&backing, "acme").await.unwrap();
        assert_eq!(loaded, cfg);
    }

    #[tokio::test]
    async fn load_missing_tenant_errors() {
        let backing: Arc<dyn TenantConfigStore> = Arc::new(InProcessTenantConfigStore::new());
        assert!(load(&backing, "ghost").await.is_err());
    }

    #[test]
    fn get_reads_a_nested_field() {
        let cfg = sample();
        assert_eq!(get(&cfg, "caps.maxConcurrentCallsTenant").unwrap(), json!(20));
    }

    #[test]
    fn set_type_infers_and_validates() {
        let cfg = sample();
        let updated = set(&cfg, "caps.maxConcurrentCallsTenant", "50").unwrap();
        assert_eq!(updated.caps.max_concurrent_calls_tenant, 50);
    }

    #[test]
    fn set_rejects_a_value_that_fails_validation() {
        let cfg = sample();
        assert!(set(&cfg, "tts.mode", "something_else").is_err());
    }

    #[test]
    fn unset_removes_an_optional_field() {
        let cfg = sample();
        let updated = unset(&cfg, "stt.language").unwrap();
        assert_eq!(updated.stt.language, None);
    }

    #[test]
    fn merge_deep_merges_a_patch_document() {
        let cfg = sample();
        let updated = merge(&cfg, json!({"caps": {"maxCallsPerMinuteTenant": 99}})).unwrap();
        assert_eq!(updated.caps.max_calls_per_minute_tenant, 99);
        assert_eq!(updated.caps.max_concurrent_calls_tenant, 20);
    }
}
