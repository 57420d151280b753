//! Session-local error taxonomy (spec §7 "Carrier action" + "STT/LLM/TTS").

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("carrier action failed: {0}")]
    CarrierAction(String),

    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("TTS synthesis failed: {0}")]
    TtsRequest(String),

    #[error("WAV store failed: {0}")]
    WavStore(String),

    #[error("capacity store error: {0}")]
    Capacity(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
