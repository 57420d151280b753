//! Tenant Config schema v1 (spec §6 "Tenant Config").

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapsConfig {
    pub max_concurrent_calls_tenant: u32,
    pub max_calls_per_minute_tenant: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_calls_global: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SttTenantConfig {
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whisper_url: Option<String>,
    pub chunk_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TtsTenantConfig {
    pub mode: String,
    pub kokoro_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioTenantConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_managed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    pub contract_version: String,
    pub tenant_id: String,
    #[serde(default)]
    pub dids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
    pub caps: CapsConfig,
    pub stt: SttTenantConfig,
    pub tts: TtsTenantConfig,
    #[serde(default)]
    pub audio: AudioTenantConfig,
}

impl TenantConfig {
    /// Schema validation run after every mutating operation (spec §4.10).
    pub fn validate(&self) -> Result<()> {
        if self.contract_version != "v1" {
            return Err(ConfigError::Validation(format!(
                "unsupported contractVersion {:?}, expected \"v1\"",
                self.contract_version
            )));
        }
        if self.tenant_id.trim().is_empty() {
            return Err(ConfigError::Validation("tenantId must not be empty".to_string()));
        }
        for did in &self.dids {
            if !did.starts_with('+') || !did[1..].chars().all(|c| c.is_ascii_digit()) || did.len() < 8 {
                return Err(ConfigError::Validation(format!("did {did:?} is not E.164")));
            }
        }
        match (&self.webhook_secret_ref, &self.webhook_secret) {
            (None, None) => {
                return Err(ConfigError::Validation(
                    "exactly one of webhookSecretRef or webhookSecret is required".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ConfigError::Validation(
                    "webhookSecretRef and webhookSecret are mutually exclusive".to_string(),
                ))
            }
            _ => {}
        }
        if self.caps.max_concurrent_calls_tenant == 0 {
            return Err(ConfigError::Validation("caps.maxConcurrentCallsTenant must be > 0".to_string()));
        }
        if self.caps.max_calls_per_minute_tenant == 0 {
            return Err(ConfigError::Validation("caps.maxCallsPerMinuteTenant must be > 0".to_string()));
        }
        if self.stt.mode.trim().is_empty() {
            return Err(ConfigError::Validation("stt.mode must not be empty".to_string()));
        }
        if self.stt.mode == "whisper_http" && self.stt.whisper_url.is_none() {
            return Err(ConfigError::Validation(
                "stt.whisperUrl is required when stt.mode is \"whisper_http\"".to_string(),
            ));
        }
        if self.tts.mode != "kokoro_http" {
            return Err(ConfigError::Validation(format!(
                "unsupported tts.mode {:?}, expected \"kokoro_http\"",
                self.tts.mode
            )));
        }
        if self.tts.kokoro_url.trim().is_empty() {
            return Err(ConfigError::Validation("tts.kokoroUrl must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> TenantConfig {
        TenantConfig {
            contract_version: "v1".to_string(),
            tenant_id: "acme".to_string(),
            dids: vec!["+15551234567".to_string()],
            webhook_secret_ref: Some("secrets/acme/webhook".to_string()),
            webhook_secret: None,
            caps: CapsConfig {
                max_concurrent_calls_tenant: 20,
                max_calls_per_minute_tenant: 30,
                max_concurrent_calls_global: None,
            },
            stt: SttTenantConfig {
                mode: "whisper_http".to_string(),
                whisper_url: Some("https://stt.example/transcribe".to_string()),
                chunk_ms: 20,
                language: None,
                config: None,
            },
            tts: TtsTenantConfig {
                mode: "kokoro_http".to_string(),
                kokoro_url: "https://tts.example/synth".to_string(),
                voice: None,
                format: None,
                sample_rate: None,
            },
            audio: AudioTenantConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn rejects_non_e164_did() {
        let mut cfg = valid();
        cfg.dids = vec!["5551234567".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_both_webhook_secret_forms() {
        let mut cfg = valid();
        cfg.webhook_secret = Some("inline".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_neither_webhook_secret_form() {
        let mut cfg = valid();
        cfg.webhook_secret_ref = None;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_kokoro_tts_mode() {
        let mut cfg = valid();
        cfg.tts.mode = "other".to_string();
        assert!(cfg.validate().is_err());
    }
}
