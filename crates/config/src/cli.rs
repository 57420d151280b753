//! `voxgate-server config {get,set,unset,merge,validate} --tenant <id>
//! [--dry-run]` (spec §4.10). Exposed as a `clap::Subcommand` so the server
//! binary can nest it under its own top-level `Cli`.

use std::sync::Arc;

use clap::{Args, Subcommand};
use serde_json::Value;

use crate::api;
use crate::error::Result;
use crate::store::TenantConfigStore;

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigSubcommand {
    /// Print the value at a dot path.
    Get {
        #[arg(long)]
        tenant: String,
        path: String,
    },
    /// Type-inferred scalar or JSON-subtree set at a dot path.
    Set {
        #[arg(long)]
        tenant: String,
        path: String,
        value: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove the leaf or subtree at a dot path.
    Unset {
        #[arg(long)]
        tenant: String,
        path: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Deep JSON merge of a patch document.
    Merge {
        #[arg(long)]
        tenant: String,
        patch: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Schema-validate the tenant's stored config without changing it.
    Validate {
        #[arg(long)]
        tenant: String,
    },
}

/// Runs the subcommand and returns the process exit code (0 on success, 1
/// on validation/error), printing the result (or dry-run diff) to stdout.
pub async fn run(store: &Arc<dyn TenantConfigStore>, args: ConfigArgs) -> i32 {
    match run_inner(store, args).await {
        Ok(output) => {
            println!("{output}");
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

fn diff(before: &crate::schema::TenantConfig, after: &crate::schema::TenantConfig) -> Result<String> {
    let before = serde_json::to_string_pretty(before)?;
    let after = serde_json::to_string_pretty(after)?;
    Ok(format!("--- before\n{before}\n--- after (not persisted, dry-run)\n{after}"))
}

async fn run_inner(store: &Arc<dyn TenantConfigStore>, args: ConfigArgs) -> Result<String> {
    match args.command {
        ConfigSubcommand::Get { tenant, path } => {
            let config = api::load(store, &tenant).await?;
            let value = api::get(&config, &path)?;
            Ok(serde_json::to_string_pretty(&value)?)
        }
        ConfigSubcommand::Set { tenant, path, value, dry_run } => {
            let config = api::load(store, &tenant).await?;
            let updated = api::set(&config, &path, &value)?;
            apply_or_diff(store, &config, updated, dry_run).await
        }
        ConfigSubcommand::Unset { tenant, path, dry_run } => {
            let config = api::load(store, &tenant).await?;
            let updated = api::unset(&config, &path)?;
            apply_or_diff(store, &config, updated, dry_run).await
        }
        ConfigSubcommand::Merge { tenant, patch, dry_run } => {
            let config = api::load(store, &tenant).await?;
            let patch: Value = serde_json::from_str(&patch)?;
            let updated = api::merge(&config, patch)?;
            apply_or_diff(store, &config, updated, dry_run).await
        }
        ConfigSubcommand::Validate { tenant } => {
            api::load(store, &tenant).await?;
            Ok("valid".to_string())
        }
    }
}

async fn apply_or_diff(
    store: &Arc<dyn TenantConfigStore>,
    before: &crate::schema::TenantConfig,
    after: crate::schema::TenantConfig,
    dry_run: bool,
) -> Result<String> {
    if dry_run {
        return diff(before, &after);
    }
    api::store(store, &after).await?;
    Ok("ok".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InProcessTenantConfigStore;
    use serde_json::json;

    async fn seeded_store() -> Arc<dyn TenantConfigStore> {
        let backing: Arc<dyn TenantConfigStore> = Arc::new(InProcessTenantConfigStore::new());
        let config: crate::schema::TenantConfig = serde_json::from_value(json!({
            "contractVersion": "v1",
            "tenantId": "acme",
            "dids": ["+15551234567"],
            "webhookSecretRef": "secrets/acme/webhook",
            "caps": {"maxConcurrentCallsTenant": 20, "maxCallsPerMinuteTenant": 30},
            "stt": {"mode": "disabled", "chunkMs": 20},
            "tts": {"mode": "kokoro_http", "kokoroUrl": "https://tts.example/synth"},
            "audio": {}
        }))
        .unwrap();
        api::store(&backing, &config).await.unwrap();
        backing
    }

    #[tokio::test]
    async fn get_exits_zero_and_prints_the_value() {
        let store = seeded_store().await;
        let code = run(
            &store,
            ConfigArgs {
                command: ConfigSubcommand::Get {
                    tenant: "acme".to_string(),
                    path: "caps.maxConcurrentCallsTenant".to_string(),
                },
            },
        )
        .await;
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn dry_run_set_does_not_persist() {
        let store = seeded_store().await;
        let code = run(
            &store,
            ConfigArgs {
                command: ConfigSubcommand::Set {
                    tenant: "acme".to_string(),
                    path: "caps.maxConcurrentCallsTenant".to_string(),
                    value: "99".to_string(),
                    dry_run: true,
                },
            },
        )
        .await;
        assert_eq!(code, 0);
        let config = api::load(&store, "acme").await.unwrap();
        assert_eq!(config.caps.max_concurrent_calls_tenant, 20);
    }

    #[tokio::test]
    async fn set_without_dry_run_persists() {
        let store = seeded_store().await;
        let code = run(
            &store,
            ConfigArgs {
                command: ConfigSubcommand::Set {
                    tenant: "acme".to_string(),
                    path: "caps.maxConcurrentCallsTenant".to_string(),
                    value: "99".to_string(),
                    dry_run: false,
                },
            },
        )
        .await;
        assert_eq!(code, 0);
        let config = api::load(&store, "acme").await.unwrap();
        assert_eq!(config.caps.max_concurrent_calls_tenant, 99);
    }

    #[tokio::test]
    async fn set_with_an_invalid_value_exits_one() {
        let store = seeded_store().await;
        let code = run(
            &store,
            ConfigArgs {
                command: ConfigSubcommand::Set {
                    tenant: "acme".to_string(),
                    path: "tts.mode".to_string(),
                    value: "something_else".to_string(),
                    dry_run: false,
                },
            },
        )
        .await;
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn validate_on_an_unknown_tenant_exits_one() {
        let store = seeded_store().await;
        let code = run(
            &store,
            ConfigArgs {
                command: ConfigSubcommand::Validate {
                    tenant: "ghost".to_string(),
                },
            },
        )
        .await;
        assert_eq!(code, 1);
    }
}
