//! Capacity-store error taxonomy (spec §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("capacity store backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, CapacityError>;
