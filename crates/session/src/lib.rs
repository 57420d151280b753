//! Call Session state machine (spec §4.6) and Session Manager (spec §4.7):
//! answer/listen/think/speak/end transitions, FINAL-only turn policy,
//! barge-in, playback-end authority, dead-air reprompts, late-final grace,
//! per-call work queues, webhook dispatch, teardown, and the idle sweeper.

pub mod clients;
pub mod error;
pub mod manager;
pub mod playback;
pub mod runtime;
pub mod state_machine;
pub mod types;

pub use clients::{CarrierClient, LlmClient, TtsClient, WavStore};
pub use error::{Result, SessionError};
pub use manager::{SessionManager, Task};
pub use runtime::{SessionClients, SessionRuntime};
pub use state_machine::{CallSession, SessionAction, SessionConfig};
pub use types::{
    CallSessionState, PlaybackAuthority, PlaybackState, Role, Transcript, TranscriptSource, Transport, Turn,
};
