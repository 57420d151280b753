//! Process-wide runtime configuration loaded once from the environment
//! toggles enumerated in spec §6. Tenant-level overrides (schema v1) layer
//! on top of this at the `voxgate-config` / `voxgate-session` boundary --
//! this module only knows about the process-wide defaults.

use std::time::Duration;

/// Which transport a given deployment is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Pstn,
    WebRtcHd,
}

impl TransportMode {
    fn from_env_str(s: &str) -> Self {
        match s {
            "webrtc_hd" | "webrtc" => TransportMode::WebRtcHd,
            _ => TransportMode::Pstn,
        }
    }
}

/// Which media track(s) the carrier stream is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTrack {
    Inbound,
    Outbound,
    Both,
}

impl StreamTrack {
    fn from_env_str(s: &str) -> Self {
        match s {
            "outbound" => StreamTrack::Outbound,
            "both_tracks" | "both" => StreamTrack::Both,
            _ => StreamTrack::Inbound,
        }
    }

    pub fn accepts(self, observed: StreamTrack) -> bool {
        matches!(self, StreamTrack::Both) || self == observed
    }
}

/// AMR-WB specific toggles (§4.1, §4.2, §6).
#[derive(Debug, Clone)]
pub struct AmrWbConfig {
    pub require_be: bool,
    pub default_be: bool,
    pub allow_octet_fallback: bool,
    pub stream_strict: bool,
    pub stream_discard_carryover: bool,
    pub min_decode_frames: usize,
    pub max_buffer_ms: u64,
    pub stream_chunk_frames: usize,
}

impl Default for AmrWbConfig {
    fn default() -> Self {
        Self {
            require_be: true,
            default_be: true,
            allow_octet_fallback: false,
            stream_strict: false,
            stream_discard_carryover: true,
            min_decode_frames: 10,
            max_buffer_ms: 500,
            stream_chunk_frames: 10,
        }
    }
}

/// STT / turn-taking toggles (§4.5, §4.6, §6).
#[derive(Debug, Clone)]
pub struct SttConfig {
    pub silence_ms: u64,
    pub chunk_ms: u64,
    pub emit_ms: u64,
    pub post_playback_grace_min_ms: u64,
    pub post_playback_grace_max_ms: u64,
    pub post_playback_grace_fixed_ms: Option<u64>,
    pub aec_enabled: bool,
    pub late_final_grace_ms: u64,
    pub playback_guard_ms: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            silence_ms: 700,
            chunk_ms: 20,
            emit_ms: 100,
            post_playback_grace_min_ms: 1200,
            post_playback_grace_max_ms: 1500,
            post_playback_grace_fixed_ms: None,
            aec_enabled: true,
            late_final_grace_ms: 1500,
            playback_guard_ms: 300,
        }
    }
}

impl SttConfig {
    /// Resolve `STT_POST_PLAYBACK_GRACE_MS` per the decided order (open
    /// question 3, §9): fixed wins when set and positive, else
    /// `min_ms + growth` clamped to `max_ms`, where growth scales with the
    /// number of consecutive dead-air reprompts already issued this call.
    pub fn post_playback_grace_ms(&self, consecutive_reprompts: u32) -> u64 {
        if let Some(fixed) = self.post_playback_grace_fixed_ms {
            if fixed > 0 {
                return fixed;
            }
        }
        let growth = u64::from(consecutive_reprompts) * 100;
        (self.post_playback_grace_min_ms + growth).min(self.post_playback_grace_max_ms)
    }
}

/// Dead-air reprompt toggles (§4.6, §6).
#[derive(Debug, Clone)]
pub struct DeadAirConfig {
    pub dead_air_ms: u64,
    pub dead_air_no_frames_ms: u64,
}

impl Default for DeadAirConfig {
    fn default() -> Self {
        Self {
            dead_air_ms: 8_000,
            dead_air_no_frames_ms: 3_000,
        }
    }
}

/// Capacity admission toggles (§4.8, §6).
#[derive(Debug, Clone)]
pub struct CapacityConfig {
    pub global_concurrency_cap: u32,
    pub tenant_concurrency_cap_default: u32,
    pub tenant_calls_per_min_cap_default: u32,
    pub ttl_seconds: u64,
    pub cap_prefix: String,
    pub tenantmap_prefix: String,
    pub tenantcfg_prefix: String,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            global_concurrency_cap: 500,
            tenant_concurrency_cap_default: 20,
            tenant_calls_per_min_cap_default: 30,
            ttl_seconds: 600,
            cap_prefix: "cap".to_string(),
            tenantmap_prefix: "tenantmap".to_string(),
            tenantcfg_prefix: "tenantcfg".to_string(),
        }
    }
}

/// Playback pipeline toggles (§6).
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    pub profile: String,
    pub pstn_sample_rate: u32,
    pub enable_highpass: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            pstn_sample_rate: 8_000,
            enable_highpass: false,
        }
    }
}

/// Top-level process-wide configuration, resolved once at startup and
/// shared by `Arc` thereafter.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub transport_mode: TransportMode,
    pub stream_track: StreamTrack,
    pub target_sample_rate_hz: u32,
    pub amrwb: AmrWbConfig,
    pub stt: SttConfig,
    pub dead_air: DeadAirConfig,
    pub capacity: CapacityConfig,
    pub playback: PlaybackConfig,
    pub watchdog_timeout: Duration,
    pub idle_ttl: Duration,
    pub idle_sweep_interval: Duration,
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            transport_mode: TransportMode::Pstn,
            stream_track: StreamTrack::Inbound,
            target_sample_rate_hz: 16_000,
            amrwb: AmrWbConfig::default(),
            stt: SttConfig::default(),
            dead_air: DeadAirConfig::default(),
            capacity: CapacityConfig::default(),
            playback: PlaybackConfig::default(),
            watchdog_timeout: Duration::from_secs(8),
            idle_ttl: Duration::from_secs(600),
            idle_sweep_interval: Duration::from_secs(60),
        }
    }
}

impl RuntimeConfig {
    /// Load every documented environment toggle (§6), falling back to the
    /// spec's stated defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            transport_mode: TransportMode::from_env_str(
                &env_string("TRANSPORT_MODE", "pstn"),
            ),
            stream_track: StreamTrack::from_env_str(
                &env_string("TELNYX_STREAM_TRACK", "inbound"),
            ),
            target_sample_rate_hz: env_u32(
                "TELNYX_TARGET_SAMPLE_RATE",
                defaults.target_sample_rate_hz,
            ),
            amrwb: AmrWbConfig {
                require_be: env_bool("AMRWB_REQUIRE_BE", defaults.amrwb.require_be),
                default_be: env_bool("TELNYX_AMRWB_DEFAULT_BE", defaults.amrwb.default_be),
                allow_octet_fallback: env_bool(
                    "AMRWB_ALLOW_OCTET_FALLBACK",
                    defaults.amrwb.allow_octet_fallback,
                ),
                stream_strict: env_bool("AMRWB_STREAM_STRICT", defaults.amrwb.stream_strict),
                stream_discard_carryover: env_bool(
                    "AMRWB_STREAM_DISCARD_CARRYOVER",
                    defaults.amrwb.stream_discard_carryover,
                ),
                min_decode_frames: env_usize(
                    "AMRWB_MIN_DECODE_FRAMES",
                    defaults.amrwb.min_decode_frames,
                ),
                max_buffer_ms: env_u64("AMRWB_MAX_BUFFER_MS", defaults.amrwb.max_buffer_ms),
                stream_chunk_frames: env_usize(
                    "AMRWB_STREAM_CHUNK_FRAMES",
                    defaults.amrwb.stream_chunk_frames,
                ),
            },
            stt: SttConfig {
                silence_ms: env_u64("STT_SILENCE_MS", defaults.stt.silence_ms),
                chunk_ms: env_u64("STT_CHUNK_MS", defaults.stt.chunk_ms),
                emit_ms: env_u64("STT_EMIT_MS", defaults.stt.emit_ms).clamp(80, 200),
                post_playback_grace_min_ms: env_u64(
                    "STT_POST_PLAYBACK_GRACE_MIN_MS",
                    defaults.stt.post_playback_grace_min_ms,
                ),
                post_playback_grace_max_ms: env_u64(
                    "STT_POST_PLAYBACK_GRACE_MAX_MS",
                    defaults.stt.post_playback_grace_max_ms,
                ),
                post_playback_grace_fixed_ms: std::env::var("STT_POST_PLAYBACK_GRACE_MS")
                    .ok()
                    .and_then(|v| v.parse().ok()),
                aec_enabled: env_bool("STT_AEC_ENABLED", defaults.stt.aec_enabled),
                late_final_grace_ms: env_u64(
                    "STT_LATE_FINAL_GRACE_MS",
                    defaults.stt.late_final_grace_ms,
                ),
                playback_guard_ms: env_u64(
                    "STT_PLAYBACK_GUARD_MS",
                    defaults.stt.playback_guard_ms,
                ),
            },
            dead_air: DeadAirConfig {
                dead_air_ms: env_u64("DEAD_AIR_MS", defaults.dead_air.dead_air_ms),
                dead_air_no_frames_ms: env_u64(
                    "DEAD_AIR_NO_FRAMES_MS",
                    defaults.dead_air.dead_air_no_frames_ms,
                ),
            },
            capacity: CapacityConfig {
                global_concurrency_cap: env_u32(
                    "GLOBAL_CONCURRENCY_CAP",
                    defaults.capacity.global_concurrency_cap,
                ),
                tenant_concurrency_cap_default: env_u32(
                    "TENANT_CONCURRENCY_CAP_DEFAULT",
                    defaults.capacity.tenant_concurrency_cap_default,
                ),
                tenant_calls_per_min_cap_default: env_u32(
                    "TENANT_CALLS_PER_MIN_CAP_DEFAULT",
                    defaults.capacity.tenant_calls_per_min_cap_default,
                ),
                ttl_seconds: env_u64("CAPACITY_TTL_SECONDS", defaults.capacity.ttl_seconds),
                cap_prefix: env_string("CAP_PREFIX", &defaults.capacity.cap_prefix),
                tenantmap_prefix: env_string(
                    "TENANTMAP_PREFIX",
                    &defaults.capacity.tenantmap_prefix,
                ),
                tenantcfg_prefix: env_string(
                    "TENANTCFG_PREFIX",
                    &defaults.capacity.tenantcfg_prefix,
                ),
            },
            playback: PlaybackConfig {
                profile: env_string("PLAYBACK_PROFILE", &defaults.playback.profile),
                pstn_sample_rate: env_u32(
                    "PLAYBACK_PSTN_SAMPLE_RATE",
                    defaults.playback.pstn_sample_rate,
                ),
                enable_highpass: env_bool(
                    "PLAYBACK_ENABLE_HIGHPASS",
                    defaults.playback.enable_highpass,
                ),
            },
            watchdog_timeout: defaults.watchdog_timeout,
            idle_ttl: Duration::from_secs(
                env_u64("IDLE_TTL_MINUTES", defaults.idle_ttl.as_secs() / 60) * 60,
            ),
            idle_sweep_interval: defaults.idle_sweep_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn emit_ms_is_clamped_to_80_200() {
        std::env::set_var("STT_EMIT_MS", "5000");
        let cfg = RuntimeConfig::from_env();
        assert_eq!(cfg.stt.emit_ms, 200);
        std::env::remove_var("STT_EMIT_MS");
    }

    #[test]
    fn post_playback_grace_prefers_fixed_value() {
        let mut stt = SttConfig::default();
        stt.post_playback_grace_fixed_ms = Some(900);
        assert_eq!(stt.post_playback_grace_ms(5), 900);
    }

    #[test]
    fn post_playback_grace_falls_back_to_growth_formula_when_unset() {
        let stt = SttConfig::default();
        assert_eq!(stt.post_playback_grace_ms(0), stt.post_playback_grace_min_ms);
        let grown = stt.post_playback_grace_ms(10);
        assert!(grown > stt.post_playback_grace_min_ms);
        assert!(grown <= stt.post_playback_grace_max_ms);
    }

    #[test]
    fn stream_track_both_accepts_either() {
        assert!(StreamTrack::Both.accepts(StreamTrack::Inbound));
        assert!(StreamTrack::Both.accepts(StreamTrack::Outbound));
        assert!(StreamTrack::Inbound.accepts(StreamTrack::Inbound));
        assert!(!StreamTrack::Inbound.accepts(StreamTrack::Outbound));
    }
}
