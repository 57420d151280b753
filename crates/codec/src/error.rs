//! Codec-local error taxonomy (spec §7 "Codec" + "Protocol/parse").
//!
//! These are classified, not exhaustive: callers in `voxgate-media` match on
//! the broad `kind()` (buffering / decode_failed / format_rejected) rather
//! than every individual variant, per spec §4.2.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("not enough frames buffered yet")]
    Buffering,

    #[error("decode failed: {0}")]
    DecodeFailed(String),

    #[error("unsupported or rejected format: {0}")]
    FormatRejected(String),

    #[error("malformed RTP header: {0}")]
    MalformedRtp(String),

    #[error("AMR-WB parse error: {0}")]
    AmrWbParse(String),

    #[error("AMR-WB decoder subprocess unavailable: {0}")]
    SubprocessUnavailable(String),

    #[error("AMR-WB decoder subprocess produced {0} dangling byte(s) that don't align to a PCM16 sample")]
    Carryover(usize),
}

/// Broad error classification used by callers to decide whether to count,
/// wait, or disable the codec (spec §4.2, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Buffering,
    DecodeFailed,
    FormatRejected,
}

impl CodecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::Buffering => ErrorKind::Buffering,
            CodecError::FormatRejected(_) | CodecError::SubprocessUnavailable(_) => {
                ErrorKind::FormatRejected
            }
            CodecError::DecodeFailed(_)
            | CodecError::MalformedRtp(_)
            | CodecError::AmrWbParse(_)
            | CodecError::Carryover(_) => ErrorKind::DecodeFailed,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
