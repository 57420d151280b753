//! Process-level environment toggles that sit outside
//! `voxgate_core::config::RuntimeConfig` (spec §6): bind address, the
//! shared Redis store, the external collaborator base URLs, and CORS.

use voxgate_core::config::RuntimeConfig;

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub redis_url: Option<String>,
    pub cors_allowed_origins: Vec<String>,

    pub carrier_base_url: String,
    pub carrier_api_key: Option<String>,

    pub llm_url: String,

    pub tts_kokoro_url: String,

    pub stt_whisper_url: String,

    pub audio_storage_dir: String,
    pub audio_public_base_url: String,

    pub runtime: RuntimeConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let cors = env_string("CORS_ALLOWED_ORIGINS", "");
        Self {
            bind_addr: env_string("BIND_ADDR", "0.0.0.0:8080"),
            redis_url: env_opt_string("REDIS_URL"),
            cors_allowed_origins: cors
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            carrier_base_url: env_string("CARRIER_BASE_URL", "https://api.carrier.example"),
            carrier_api_key: env_opt_string("CARRIER_API_KEY"),
            llm_url: env_string("LLM_URL", "http://localhost:9000/reply"),
            tts_kokoro_url: env_string("TTS_KOKORO_URL", "http://localhost:8880/synth"),
            stt_whisper_url: env_string("STT_WHISPER_URL", "http://localhost:9001/transcribe"),
            audio_storage_dir: env_string("AUDIO_STORAGE_DIR", "./voxgate-audio"),
            audio_public_base_url: env_string("AUDIO_PUBLIC_BASE_URL", "http://localhost:8080/audio"),
            runtime: RuntimeConfig::from_env(),
        }
    }
}
