//! Process-wide logging setup, grounded on `tracing` + `tracing-subscriber`
//! with an `EnvFilter` sourced from `RUST_LOG`.

use tracing_subscriber::{fmt, EnvFilter};

/// Logging configuration resolved once at process start.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter applied when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Render logs as single-line JSON instead of the default pretty format.
    /// Controlled by `VOXGATE_LOG_JSON=1`.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Build a config from the environment, following the same toggles the
    /// rest of the system reads its configuration from (see
    /// `voxgate_core::config`).
    pub fn from_env() -> Self {
        Self {
            default_filter: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            json: std::env::var("VOXGATE_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

/// Install the global tracing subscriber. Safe to call once per process;
/// subsequent calls are a no-op (mirrors `tracing_subscriber::fmt().try_init()`
/// semantics) so tests that spin up multiple components don't panic on
/// re-init.
pub fn init_logging(config: LoggingConfig) {
    let filter = EnvFilter::try_new(&config.default_filter)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt::Subscriber::builder().with_env_filter(filter);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(err) = result {
        tracing::trace!("tracing subscriber already initialized: {err}");
    }
}
