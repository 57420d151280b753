//! Per-call codec decoding (spec §4.2) and AMR-WB depacketization/repacking
//! (spec §4.1). Every decoder here is a stateless/stateful PCM16 producer;
//! none of them do any transport or session bookkeeping -- that lives in
//! `voxgate-media` and `voxgate-session` respectively.

pub mod amrwb;
pub mod error;
pub mod g711;
pub mod g722;
pub mod opus;
pub mod resample;
pub mod traits;

pub use amrwb::{AmrWbBufferConfig, AmrWbDecoder, Policy as AmrWbPolicy, SubprocessConfig as AmrWbSubprocessConfig};
pub use error::{CodecError, Result};
pub use traits::{DecodeHints, DecodeOutcome, Decoder};
