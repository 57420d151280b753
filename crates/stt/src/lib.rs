//! Chunked STT driver (spec §4.5): VAD, pre-roll, utterance lifecycle,
//! in-flight request tracking, pause/resume gating.

pub mod driver;
pub mod error;
pub mod request;
pub mod vad;

pub use driver::{
    DriverConfig, DriverEvent, InFlightCounter, ListenerGate, SttDriver, SttResponse, SttTransport,
    TranscriptSource,
};
pub use error::{Result, SttError};
