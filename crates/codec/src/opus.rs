//! Opus decode. Spec §4.2: "packet-level decoder initialized at 48 kHz;
//! downmix to mono; dedicated 48 -> 16 kHz resampler (3:1 averaging) when
//! target is 16 kHz."

use crate::error::{CodecError, Result};
use crate::resample::downsample_3to1_averaging;
use crate::traits::{DecodeHints, DecodeOutcome, Decoder};

const OPUS_SAMPLE_RATE_HZ: u32 = 48_000;
/// 48 kHz / 20 ms frame, mono.
const OPUS_FRAME_SAMPLES: usize = (OPUS_SAMPLE_RATE_HZ as usize / 1000) * 20;

#[cfg(feature = "opus-codec")]
pub struct OpusDecoder {
    inner: opus::Decoder,
    target_sample_rate_hz: u32,
}

#[cfg(feature = "opus-codec")]
impl OpusDecoder {
    pub fn new(target_sample_rate_hz: u32) -> Result<Self> {
        let inner = opus::Decoder::new(OPUS_SAMPLE_RATE_HZ, opus::Channels::Mono)
            .map_err(|e| CodecError::DecodeFailed(format!("opus decoder init: {e}")))?;
        Ok(Self {
            inner,
            target_sample_rate_hz,
        })
    }
}

#[cfg(feature = "opus-codec")]
impl Decoder for OpusDecoder {
    fn decode(&mut self, payload: &[u8], _hints: DecodeHints) -> Result<Option<DecodeOutcome>> {
        if payload.is_empty() {
            return Ok(None);
        }
        let mut pcm48k = vec![0i16; OPUS_FRAME_SAMPLES * 6]; // headroom for fec/plc frames
        let decoded = self
            .inner
            .decode(payload, &mut pcm48k, false)
            .map_err(|e| CodecError::DecodeFailed(format!("opus decode: {e}")))?;
        pcm48k.truncate(decoded);

        let pcm16 = if self.target_sample_rate_hz == OPUS_SAMPLE_RATE_HZ {
            pcm48k
        } else if self.target_sample_rate_hz * 3 == OPUS_SAMPLE_RATE_HZ {
            downsample_3to1_averaging(&pcm48k)
        } else {
            return Err(CodecError::FormatRejected(format!(
                "unsupported opus target rate {}",
                self.target_sample_rate_hz
            )));
        };

        Ok(Some(DecodeOutcome {
            pcm16,
            sample_rate_hz: self.target_sample_rate_hz,
            decoded_frames: 1,
            decode_failures: 0,
        }))
    }

    fn target_sample_rate_hz(&self) -> u32 {
        self.target_sample_rate_hz
    }
}

/// Detects an Opus-in-RTP-Ogg container prefix (`OggS`) arriving where a
/// bare Opus packet was expected -- spec §7 calls this out explicitly as a
/// distinguishable codec error ("Opus container detected when packets
/// expected").
pub fn looks_like_ogg_container(payload: &[u8]) -> bool {
    payload.starts_with(b"OggS")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_ogg_container_prefix() {
        assert!(looks_like_ogg_container(b"OggS\x00restofheader"));
        assert!(!looks_like_ogg_container(&[0x01, 0x02, 0x03]));
    }

    #[cfg(feature = "opus-codec")]
    #[test]
    fn rejects_unsupported_target_rate() {
        let mut decoder = OpusDecoder::new(44_100).unwrap();
        // Any non-empty payload triggers the rate check after a (possibly
        // failing) decode attempt is skipped via the early length guard;
        // use a minimal DTX payload so libopus itself doesn't error first.
        let err = decoder.decode(&[0xF8], DecodeHints::default());
        assert!(err.is_err());
    }
}
