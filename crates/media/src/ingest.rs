//! Media Ingest (spec §4.3): turns raw per-frame input into validated PCM16
//! chunks of 80-200 ms delivered via a single callback, with stream
//! isolation, track filtering, playback echo guarding, re-chunking, and a
//! health monitor driving restart/reprompt decisions.

use voxgate_codec::traits::DecodeOutcome;
use voxgate_core::config::StreamTrack;
use voxgate_core::metrics::MetricsRegistry;
use voxgate_core::time::Clock;

use crate::health::{HealthMonitor, UnhealthyReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Pstn,
    WebRtc,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub expected_track: StreamTrack,
    pub emit_ms: u64,
    pub playback_guard_ms: u64,
    pub target_sample_rate_hz: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            expected_track: StreamTrack::Inbound,
            emit_ms: 100,
            playback_guard_ms: 300,
            target_sample_rate_hz: 16_000,
        }
    }
}

/// Events the caller subscribes to; `MediaIngest` itself makes no I/O
/// decisions beyond these — reprompt wiring lives in the caller (the Call
/// Session) per spec §4.6. A codec restart mid-call has no counterpart
/// here: the carrier's media `start` event already rebuilds the whole
/// pipeline (and its `MediaIngest`) from scratch whenever it declares a
/// new codec, so there is never a stale decoder left to restart.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    Chunk(Vec<i16>),
    Unhealthy { reason: UnhealthyReasonPublic },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnhealthyReasonPublic {
    DecodeFailures,
    TinyPayloads,
    LowRms,
}

impl From<UnhealthyReason> for UnhealthyReasonPublic {
    fn from(r: UnhealthyReason) -> Self {
        match r {
            UnhealthyReason::DecodeFailures => Self::DecodeFailures,
            UnhealthyReason::TinyPayloads => Self::TinyPayloads,
            UnhealthyReason::LowRms => Self::LowRms,
        }
    }
}

/// Per-call ingest state machine.
pub struct MediaIngest {
    config: IngestConfig,
    transport: Transport,
    clock: Clock,

    adopted_stream_id: Option<String>,
    highest_accepted_sequence: Option<u64>,

    playback_active: bool,
    playback_suppression_deadline_ms: Option<u64>,

    residue: Vec<i16>,
    current_sample_rate_hz: Option<u32>,

    health: HealthMonitor,
    metrics: MetricsRegistry,

    /// Sticky force-BE flag for AMR-WB on the PSTN path (spec §4.3
    /// "Forced-BE policy").
    pub force_be: bool,
}

impl MediaIngest {
    pub fn new(config: IngestConfig, transport: Transport, clock: Clock) -> Self {
        Self::with_metrics(config, transport, clock, MetricsRegistry::new())
    }

    pub fn with_metrics(config: IngestConfig, transport: Transport, clock: Clock, metrics: MetricsRegistry) -> Self {
        let health = HealthMonitor::new(clock.clone());
        Self {
            config,
            transport,
            clock,
            adopted_stream_id: None,
            highest_accepted_sequence: None,
            playback_active: false,
            playback_suppression_deadline_ms: None,
            residue: Vec::new(),
            current_sample_rate_hz: None,
            health,
            metrics,
            force_be: false,
        }
    }

    /// Notify of a detected AMR-WB codec on the PSTN transport; binds the
    /// sticky force-BE policy for the rest of the call.
    pub fn note_codec_detected(&mut self, is_amrwb: bool) {
        if self.transport == Transport::Pstn && is_amrwb {
            self.force_be = true;
        }
    }

    pub fn note_playback_active(&mut self, active: bool) {
        if !active && self.playback_active {
            self.playback_suppression_deadline_ms =
                Some(self.clock.now_ms() + self.config.playback_guard_ms);
        }
        self.playback_active = active;
    }

    fn within_echo_guard(&self) -> bool {
        match self.playback_suppression_deadline_ms {
            Some(deadline) => self.clock.now_ms() < deadline,
            None => false,
        }
    }

    /// Admit one inbound frame. Returns `false` if the frame was dropped by
    /// stream isolation, sequence dedupe, track filter, or the playback
    /// echo guard (nothing to decode).
    pub fn admit_frame(&mut self, stream_id: &str, sequence: u64, track: StreamTrack) -> bool {
        self.health.record_frame();

        match &self.adopted_stream_id {
            None => self.adopted_stream_id = Some(stream_id.to_string()),
            Some(adopted) if adopted != stream_id => {
                self.record_drop("wrong_stream");
                return false;
            }
            Some(_) => {}
        }

        if let Some(highest) = self.highest_accepted_sequence {
            if sequence <= highest {
                self.record_drop("dup_or_reorder");
                return false;
            }
        }

        if !self.config.expected_track.accepts(track) {
            self.record_drop("wrong_track");
            return false;
        }

        if (self.playback_active || self.within_echo_guard()) && track != StreamTrack::Inbound {
            self.record_drop("echo_guard");
            return false;
        }

        // Commit order: the highest-accepted sequence only advances after
        // the frame has survived the track filter and echo guard.
        self.highest_accepted_sequence = Some(sequence);
        true
    }

    fn record_drop(&self, reason: &str) {
        self.metrics.incr("ingest_frames_dropped_total", &[("reason", reason)], 1);
    }

    /// Feed one codec decode outcome (or a failure) into re-chunking and
    /// the health monitor. Returns zero or more ready-to-emit chunks.
    pub fn ingest_decoded(&mut self, outcome: Option<DecodeOutcome>) -> Vec<Vec<i16>> {
        let Some(outcome) = outcome else {
            self.health.record_decode_failure();
            return Vec::new();
        };

        if outcome.decode_failures > 0 {
            self.health.record_decode_failure();
        }
        self.health.record_decoded(&outcome.pcm16);

        if self.current_sample_rate_hz != Some(outcome.sample_rate_hz) {
            // Sample-rate change: flush whatever residue we were holding
            // under the old rate immediately rather than mixing rates.
            self.residue.clear();
            self.current_sample_rate_hz = Some(outcome.sample_rate_hz);
        }

        self.residue.extend_from_slice(&outcome.pcm16);

        let emit_ms = self.config.emit_ms.clamp(80, 200);
        let chunk_samples = (outcome.sample_rate_hz as u64 * emit_ms / 1000) as usize;
        if chunk_samples == 0 {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        while self.residue.len() >= chunk_samples {
            let chunk: Vec<i16> = self.residue.drain(..chunk_samples).collect();
            self.health.record_emitted_chunk();
            chunks.push(chunk);
        }
        chunks
    }

    pub fn record_tiny_payload(&mut self) {
        self.health.record_tiny_payload();
    }

    /// Evaluate ingest health, returning an event describing whether (and
    /// why) the caller should react.
    pub fn check_health(&mut self) -> Option<IngestEvent> {
        let reason = self.health.verdict()?;
        Some(IngestEvent::Unhealthy { reason: reason.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingest() -> MediaIngest {
        MediaIngest::new(IngestConfig::default(), Transport::Pstn, Clock::mock())
    }

    #[test]
    fn adopts_first_stream_id_and_drops_others() {
        let mut ingest = ingest();
        assert!(ingest.admit_frame("stream-a", 1, StreamTrack::Inbound));
        assert!(!ingest.admit_frame("stream-b", 2, StreamTrack::Inbound));
    }

    #[test]
    fn drops_duplicate_or_reordered_sequences() {
        let mut ingest = ingest();
        assert!(ingest.admit_frame("s", 5, StreamTrack::Inbound));
        assert!(!ingest.admit_frame("s", 5, StreamTrack::Inbound));
        assert!(!ingest.admit_frame("s", 3, StreamTrack::Inbound));
        assert!(ingest.admit_frame("s", 6, StreamTrack::Inbound));
    }

    #[test]
    fn track_filter_drops_non_matching_track() {
        let mut ingest = ingest();
        assert!(!ingest.admit_frame("s", 1, StreamTrack::Outbound));
    }

    #[test]
    fn playback_echo_guard_drops_non_inbound_during_and_after_playback() {
        let mut ingest = ingest();
        ingest.note_playback_active(true);
        assert!(!ingest.admit_frame("s", 1, StreamTrack::Outbound));
        ingest.note_playback_active(false);
        // Within the guard tail, still dropped.
        assert!(!ingest.admit_frame("s", 2, StreamTrack::Outbound));
    }

    #[test]
    fn rechunking_emits_fixed_size_chunks_and_carries_remainder() {
        let mut ingest = ingest();
        let outcome = DecodeOutcome {
            pcm16: vec![1i16; 2_500],
            sample_rate_hz: 16_000,
            decoded_frames: 1,
            decode_failures: 0,
        };
        // 100ms @ 16kHz = 1600 samples/chunk.
        let chunks = ingest.ingest_decoded(Some(outcome));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 1_600);
        assert_eq!(ingest.residue.len(), 900);
    }

    #[test]
    fn sample_rate_change_flushes_residue() {
        let mut ingest = ingest();
        ingest.ingest_decoded(Some(DecodeOutcome {
            pcm16: vec![1i16; 100],
            sample_rate_hz: 16_000,
            decoded_frames: 1,
            decode_failures: 0,
        }));
        assert_eq!(ingest.residue.len(), 100);
        ingest.ingest_decoded(Some(DecodeOutcome {
            pcm16: vec![1i16; 50],
            sample_rate_hz: 8_000,
            decoded_frames: 1,
            decode_failures: 0,
        }));
        assert_eq!(ingest.residue.len(), 50);
    }

    #[test]
    fn forced_be_is_sticky_once_set_on_pstn() {
        let mut ingest = ingest();
        ingest.note_codec_detected(true);
        assert!(ingest.force_be);
        ingest.note_codec_detected(false);
        assert!(ingest.force_be);
    }
}
