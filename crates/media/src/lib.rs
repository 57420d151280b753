//! Media ingest (spec §4.3) and far-end reference + echo cancellation
//! (spec §4.4). Turns raw per-frame carrier/WebRTC input into validated
//! PCM16 chunks of 80-200 ms, and drives a pull-side AEC against a TTS
//! playback reference ring.

pub mod candidate;
pub mod echo;
pub mod error;
pub mod health;
pub mod ingest;

pub use error::{MediaError, Result};
pub use ingest::{IngestConfig, IngestEvent, MediaIngest, Transport};
