//! STT-local error taxonomy (spec §7 "STT/LLM/TTS/Carrier collaborators").

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SttError {
    #[error("STT request failed: {0}")]
    RequestFailed(String),

    #[error("WAV encode failed: {0}")]
    WavEncodeFailed(String),
}

pub type Result<T> = std::result::Result<T, SttError>;
