//! Tenant Config schema v1 (spec §6, §4.10): load/get/set/unset/merge
//! dot-path operations over a per-tenant JSON document backed by the shared
//! store, schema validation, and the `voxgate-server config` CLI.

pub mod api;
pub mod cli;
pub mod dotpath;
pub mod error;
pub mod schema;
pub mod store;

pub use api::{get, load, merge, set, unset};
pub use cli::{ConfigArgs, ConfigSubcommand};
pub use error::{ConfigError, Result};
pub use schema::{AudioTenantConfig, CapsConfig, SttTenantConfig, TenantConfig, TtsTenantConfig};
pub use store::{InProcessTenantConfigStore, RedisTenantConfigStore, TenantConfigStore};
