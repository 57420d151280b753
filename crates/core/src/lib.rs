//! Shared primitives used across the voxgate telephony bridge crates:
//! call/tenant identifiers, an error-context helper, process-wide logging
//! setup, environment-driven runtime configuration, and a small metrics
//! registry. None of this carries call-media logic itself -- see
//! `voxgate-codec`, `voxgate-media`, `voxgate-stt`, `voxgate-session` and
//! `voxgate-capacity` for that.

pub mod config;
pub mod error;
pub mod ids;
pub mod logging;
pub mod metrics;
pub mod time;

pub use config::RuntimeConfig;
pub use error::{ErrorContext, ErrorExt};
pub use ids::{CallId, TenantId};
pub use metrics::MetricsRegistry;
