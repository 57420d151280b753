//! Media-local error taxonomy (spec §7 "Media" + "Protocol/parse").

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("no usable media payload candidate found")]
    NoCandidate,

    #[error("base64 payload decode failed: {0}")]
    InvalidBase64(String),

    #[error("decoded payload below minimum length gate ({got} < {min})")]
    BelowMinimumLength { got: usize, min: usize },

    #[error("WAV far-end reference invalid: {0}")]
    InvalidWav(String),

    #[error("AEC engine unavailable: {0}")]
    AecUnavailable(String),
}

pub type Result<T> = std::result::Result<T, MediaError>;
