//! The common decoder contract every per-codec implementation satisfies
//! (spec §4.2): `decode(payload, hints) -> {pcm16, sampleRateHz,
//! decodedFrames, decodeFailures}` or an error classified as buffering /
//! decode_failed / format_rejected.

use crate::error::Result;

/// Per-call, per-decode hints a codec may need (forced-BE policy for
/// AMR-WB, expected track, etc). Most codecs ignore most fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeHints {
    /// Sticky "never strip CMR, never repack to octet-aligned" policy set
    /// by Media Ingest when PSTN + AMR-WB is detected (spec §4.3).
    pub force_be: bool,
}

/// Successful decode result.
#[derive(Debug, Clone, Default)]
pub struct DecodeOutcome {
    pub pcm16: Vec<i16>,
    pub sample_rate_hz: u32,
    pub decoded_frames: u32,
    pub decode_failures: u32,
}

impl DecodeOutcome {
    pub fn silence(sample_rate_hz: u32, samples: usize) -> Self {
        Self {
            pcm16: vec![0; samples],
            sample_rate_hz,
            decoded_frames: 0,
            decode_failures: 0,
        }
    }
}

/// A per-call codec decoder. `decode` returns `Ok(None)` when the payload
/// was consumed but produced no emittable PCM yet (e.g. AMR-WB still
/// buffering below `min_frames`) -- not an error condition.
pub trait Decoder: Send {
    fn decode(&mut self, payload: &[u8], hints: DecodeHints) -> Result<Option<DecodeOutcome>>;

    /// Target output sample rate this decoder instance was constructed for.
    fn target_sample_rate_hz(&self) -> u32;
}
