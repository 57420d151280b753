//! Far-end reference ring and pull-side echo cancellation (spec §4.4).
//!
//! Push side: TTS WAV -> validated PCM16 -> 16 kHz -> 640-byte (20 ms)
//! frames -> bounded FIFO. Pull side: one far-end frame pulled per 20 ms
//! near-end frame; when both are available and AEC is loaded, run the
//! canceller; otherwise pass the near-end frame through unchanged.

use std::collections::VecDeque;
use std::sync::OnceLock;

use voxgate_codec::resample::linear_resample;

use crate::error::{MediaError, Result};

const FAR_END_FRAME_SAMPLES: usize = 320; // 20ms @ 16kHz
const FAR_END_FIFO_CAPACITY: usize = 750; // ~15s
const AEC_FILTER_TAIL_SAMPLES: usize = 2560; // 160ms

static AEC_AVAILABLE: OnceLock<bool> = OnceLock::new();

/// Resolve process-wide AEC availability once, at first use. Unavailability
/// (the external Speex DSP library failing to load) disables echo
/// cancellation for the whole process rather than per call.
pub fn aec_available() -> bool {
    *AEC_AVAILABLE.get_or_init(|| {
        match try_load_speex() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "AEC engine unavailable, echo cancellation disabled");
                false
            }
        }
    })
}

// Speex DSP isn't vendored in this workspace; this stub always reports
// unavailable so the process-wide flag resolves deterministically without
// requiring a system library at build time.
fn try_load_speex() -> std::result::Result<(), String> {
    Err("libspeexdsp not linked in this build".to_string())
}

/// Validate a WAV byte stream as PCM16 mono, decode, and resample to 16 kHz.
pub fn decode_far_end_wav(bytes: &[u8]) -> Result<Vec<i16>> {
    let cursor = std::io::Cursor::new(bytes);
    let mut reader =
        hound::WavReader::new(cursor).map_err(|e| MediaError::InvalidWav(e.to_string()))?;
    let spec = reader.spec();
    if spec.channels != 1 || spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(MediaError::InvalidWav(format!(
            "expected mono 16-bit PCM, got {} channel(s) / {} bit(s) / {:?}",
            spec.channels, spec.bits_per_sample, spec.sample_format
        )));
    }
    let samples: std::result::Result<Vec<i16>, _> = reader.samples::<i16>().collect();
    let samples = samples.map_err(|e| MediaError::InvalidWav(e.to_string()))?;
    Ok(linear_resample(&samples, spec.sample_rate, 16_000))
}

/// Bounded FIFO of 20 ms far-end reference frames, fed by the TTS playback
/// chain and drained by the AEC processor in the same call's worker.
pub struct FarEndRing {
    frames: VecDeque<Vec<i16>>,
    carryover: Vec<i16>,
}

impl FarEndRing {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::with_capacity(FAR_END_FIFO_CAPACITY),
            carryover: Vec::new(),
        }
    }

    /// Push decoded, resampled far-end PCM16, slicing into exact 20 ms
    /// frames and dropping the oldest queued frame when the FIFO is full.
    pub fn push(&mut self, pcm16: &[i16]) {
        self.carryover.extend_from_slice(pcm16);
        while self.carryover.len() >= FAR_END_FRAME_SAMPLES {
            let frame: Vec<i16> = self.carryover.drain(..FAR_END_FRAME_SAMPLES).collect();
            if self.frames.len() == FAR_END_FIFO_CAPACITY {
                self.frames.pop_front();
            }
            self.frames.push_back(frame);
        }
    }

    pub fn pull(&mut self) -> Option<Vec<i16>> {
        self.frames.pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.carryover.clear();
    }
}

impl Default for FarEndRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the pull-side echo cancellation step. Buffers near-end samples
/// to exact 20 ms alignment and, when both a near-end and far-end frame are
/// available and AEC is loaded, subtracts the estimated echo; otherwise
/// passes the near-end frame through unchanged.
pub struct EchoCanceller {
    far_end: FarEndRing,
    near_end_carryover: Vec<i16>,
    enabled: bool,
    playback_was_active: bool,
}

impl EchoCanceller {
    pub fn new() -> Self {
        Self {
            far_end: FarEndRing::new(),
            near_end_carryover: Vec::new(),
            enabled: aec_available(),
            playback_was_active: false,
        }
    }

    pub fn far_end_mut(&mut self) -> &mut FarEndRing {
        &mut self.far_end
    }

    /// Reset internal state on every playback-start/stop transition.
    pub fn note_playback_active(&mut self, active: bool) {
        if active != self.playback_was_active {
            self.near_end_carryover.clear();
            self.far_end.clear();
            self.playback_was_active = active;
        }
    }

    /// Process near-end PCM16, buffering to 20 ms alignment. Returns
    /// processed 20 ms frames ready for the STT/VAD pipeline; any leftover
    /// samples stay buffered for the next call.
    pub fn process(&mut self, near_end: &[i16]) -> Vec<Vec<i16>> {
        self.near_end_carryover.extend_from_slice(near_end);
        let mut out = Vec::new();
        while self.near_end_carryover.len() >= FAR_END_FRAME_SAMPLES {
            let frame: Vec<i16> = self
                .near_end_carryover
                .drain(..FAR_END_FRAME_SAMPLES)
                .collect();
            out.push(self.cancel_one(frame));
        }
        out
    }

    fn cancel_one(&mut self, near: Vec<i16>) -> Vec<i16> {
        if !self.enabled {
            return near;
        }
        match self.far_end.pull() {
            Some(far) => subtract_estimated_echo(&near, &far),
            None => near,
        }
    }
}

impl Default for EchoCanceller {
    fn default() -> Self {
        Self::new()
    }
}

/// Stand-in normalized least-mean-squares echo subtraction over the last
/// [`AEC_FILTER_TAIL_SAMPLES`] of far-end history. A real deployment links
/// `libspeexdsp`'s `speex_echo_cancellation`; this keeps the same framing
/// contract (640-byte frames in, 640-byte frames out) for callers.
fn subtract_estimated_echo(near: &[i16], far: &[i16]) -> Vec<i16> {
    let tail = far.len().min(AEC_FILTER_TAIL_SAMPLES);
    let estimate_gain = 0.5f32;
    near.iter()
        .zip(far.iter().take(tail).chain(std::iter::repeat(&0i16)))
        .map(|(&n, &f)| {
            let cancelled = n as f32 - (f as f32 * estimate_gain);
            cancelled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
        })
        .collect()
}
