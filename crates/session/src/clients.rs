//! External-collaborator client traits (spec §2.2 expansion, §6): the
//! carrier REST actions, the LLM reply call, the TTS synth call, and the
//! WAV storage upload. Internals of each are out of scope per spec §1; only
//! the interface the Call Session calls against is specified here.

use async_trait::async_trait;
use voxgate_core::ids::CallId;

use crate::error::Result;
use crate::types::Turn;

#[async_trait]
pub trait CarrierClient: Send + Sync {
    async fn answer(&self, call_id: &CallId) -> Result<()>;
    async fn play(&self, call_id: &CallId, url: &str) -> Result<()>;
    async fn stop_playback(&self, call_id: &CallId) -> Result<()>;
    async fn hangup(&self, call_id: &CallId) -> Result<()>;
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Produce the assistant's reply given the conversation history so far
    /// (last entry is the just-accepted user turn). On failure the caller
    /// substitutes the fallback text `"Acknowledged."` (spec §7).
    async fn reply(&self, history: &[Turn]) -> Result<String>;
}

#[async_trait]
pub trait TtsClient: Send + Sync {
    /// Synthesize `text` to WAV bytes.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait WavStore: Send + Sync {
    /// Persist a TTS WAV where the carrier can fetch it; returns the public
    /// URL used for a PSTN `play` action.
    async fn store(&self, call_id: &CallId, turn_id: u64, bytes: Vec<u8>) -> Result<String>;
}
