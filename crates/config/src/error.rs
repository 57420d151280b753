use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("tenant config backend error: {0}")]
    Backend(String),
    #[error("no tenant config found for tenant {0}")]
    NotFound(String),
    #[error("invalid dot path: {0}")]
    InvalidPath(String),
    #[error("invalid value for path {path}: {reason}")]
    InvalidValue { path: String, reason: String },
    #[error("schema validation failed: {0}")]
    Validation(String),
    #[error("malformed tenant config JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
