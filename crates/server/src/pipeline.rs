//! Per-call media/codec/STT pipeline (spec §4.1-§4.3, §4.5): owns the
//! codec decoder, `MediaIngest`, `SttDriver`, and the `SessionRuntime` for
//! one dialog, and is driven entirely from the single task that owns the
//! carrier media WebSocket connection (spec §5 "one task per dialog").
//!
//! Every codec but AMR-WB satisfies the synchronous
//! [`voxgate_codec::traits::Decoder`] contract; AMR-WB's decode step is an
//! external subprocess round trip and is dispatched on its own branch.

use std::sync::Arc;

use voxgate_codec::amrwb::{AmrWbBufferConfig, AmrWbDecoder, AmrWbSubprocessConfig, Policy as AmrWbPolicy};
use voxgate_codec::g711::{G711Decoder, G711Variant};
use voxgate_codec::g722::G722Decoder;
use voxgate_codec::opus::OpusDecoder;
use voxgate_codec::traits::{DecodeHints, DecodeOutcome, Decoder};
use voxgate_core::config::RuntimeConfig;
use voxgate_core::metrics::MetricsRegistry;
use voxgate_media::ingest::{IngestConfig, MediaIngest, Transport as MediaTransport};
use voxgate_stt::driver::{DriverConfig, DriverEvent, ListenerGate, SttDriver, SttTransport};
use voxgate_stt::vad::VadConfig;

use crate::error::{Result, ServerError};

/// Per-call decoder: the synchronous codecs share one dispatch branch, AMR-WB
/// gets its own because its `decode` is `async` (subprocess round trip).
pub enum CallCodec {
    Sync(Box<dyn Decoder>),
    AmrWb(AmrWbDecoder),
}

impl CallCodec {
    pub fn for_encoding(encoding: &str, runtime: &RuntimeConfig) -> Result<Self> {
        let target = runtime.target_sample_rate_hz;
        match encoding.to_ascii_lowercase().as_str() {
            "pcmu" | "ulaw" | "g711u" => Ok(CallCodec::Sync(Box::new(G711Decoder::new(G711Variant::MuLaw, target)))),
            "pcma" | "alaw" | "g711a" => Ok(CallCodec::Sync(Box::new(G711Decoder::new(G711Variant::ALaw, target)))),
            "g722" => Ok(CallCodec::Sync(Box::new(G722Decoder::new()))),
            "opus" => Ok(CallCodec::Sync(Box::new(
                OpusDecoder::new(target).map_err(ServerError::Codec)?,
            ))),
            "amr-wb" | "amrwb" | "amr_wb" => {
                let policy = if runtime.amrwb.allow_octet_fallback {
                    AmrWbPolicy::AllowOctetFallback
                } else {
                    AmrWbPolicy::BeOnly
                };
                let subprocess = AmrWbSubprocessConfig {
                    command: std::env::var("AMRWB_DECODER_CMD").unwrap_or_else(|_| "ffmpeg".to_string()),
                    args: vec![],
                    strict_carryover: runtime.amrwb.stream_strict,
                };
                Ok(CallCodec::AmrWb(AmrWbDecoder::new(
                    policy,
                    AmrWbBufferConfig {
                        min_frames: runtime.amrwb.min_decode_frames,
                        max_buffer_ms: runtime.amrwb.max_buffer_ms,
                        frame_duration_ms: 20,
                    },
                    subprocess,
                )))
            }
            other => Err(ServerError::BadRequest(format!("unsupported codec: {other}"))),
        }
    }

    pub fn is_amrwb(&self) -> bool {
        matches!(self, CallCodec::AmrWb(_))
    }

    /// Decode one payload. Bandwidth-efficient AMR-WB packets carry a CMR
    /// field on every payload in the telephony profile this system targets.
    pub async fn decode(&mut self, payload: &[u8], force_be: bool) -> Result<Option<DecodeOutcome>> {
        match self {
            CallCodec::Sync(decoder) => Ok(decoder.decode(payload, DecodeHints { force_be })?),
            CallCodec::AmrWb(decoder) => {
                let pcm16 = decoder.decode(payload, true).await.map_err(ServerError::Codec)?;
                Ok(pcm16.map(|pcm16| DecodeOutcome {
                    sample_rate_hz: 16_000,
                    decoded_frames: 1,
                    decode_failures: 0,
                    pcm16,
                }))
            }
        }
    }
}

/// Borrows the session's listening/playback state for one `push_frame` call
/// without the STT driver needing to know about `CallSession` at all.
pub struct SessionGate {
    pub listening: bool,
    pub playback_active: bool,
}

impl ListenerGate for SessionGate {
    fn is_listening(&self) -> bool {
        self.listening
    }

    fn is_playback_active(&self) -> bool {
        self.playback_active
    }
}

/// Everything one active dialog needs, assembled once when the carrier
/// media stream's `start` event (or the WebRTC offer) names the codec.
pub struct CallPipeline {
    pub codec: CallCodec,
    pub ingest: MediaIngest,
    pub stt: SttDriver,
    pub stt_transport: Arc<dyn SttTransport>,
    codec_name: String,
    metrics: MetricsRegistry,
}

impl CallPipeline {
    pub fn new(
        encoding: &str,
        media_transport: MediaTransport,
        runtime: &RuntimeConfig,
        stt_transport: Arc<dyn SttTransport>,
        clock: voxgate_core::time::Clock,
        metrics: MetricsRegistry,
    ) -> Result<Self> {
        let codec = CallCodec::for_encoding(encoding, runtime)?;
        let is_amrwb = codec.is_amrwb();

        let mut ingest = MediaIngest::with_metrics(
            IngestConfig {
                expected_track: runtime.stream_track,
                emit_ms: runtime.stt.emit_ms,
                playback_guard_ms: runtime.stt.playback_guard_ms,
                target_sample_rate_hz: runtime.target_sample_rate_hz,
            },
            media_transport,
            clock,
            metrics.clone(),
        );
        ingest.note_codec_detected(is_amrwb);

        let stt = SttDriver::new(DriverConfig {
            vad: VadConfig::default(),
            silence_ms: runtime.stt.silence_ms,
            frame_duration_ms: runtime.stt.chunk_ms,
            sample_rate_hz: runtime.target_sample_rate_hz,
            partial_interval_ms: None,
        });

        Ok(Self {
            codec,
            ingest,
            stt,
            stt_transport,
            codec_name: encoding.to_ascii_lowercase(),
            metrics,
        })
    }

    /// Decode one admitted carrier payload, re-chunk it, and feed every
    /// resulting PCM16 chunk through the STT driver's VAD. Returns the
    /// `DriverEvent`s produced, in order, across every chunk.
    pub async fn on_frame(&mut self, payload: &[u8], gate: &SessionGate) -> Result<Vec<DriverEvent>> {
        let outcome = match self.codec.decode(payload, self.ingest.force_be).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.metrics.incr(
                    "codec_decode_failures_total",
                    &[("codec", &self.codec_name)],
                    1,
                );
                return Err(e);
            }
        };
        if let Some(o) = &outcome {
            if o.decode_failures > 0 {
                self.metrics.incr(
                    "codec_decode_failures_total",
                    &[("codec", &self.codec_name)],
                    o.decode_failures as u64,
                );
            }
        }
        let chunks = self.ingest.ingest_decoded(outcome);

        let mut events = Vec::new();
        for chunk in &chunks {
            events.extend(self.stt.push_frame(chunk, gate));
        }
        Ok(events)
    }

    pub async fn finish_utterance(&mut self) -> Result<Vec<DriverEvent>> {
        self.stt
            .finish_utterance(self.stt_transport.as_ref())
            .await
            .map_err(ServerError::Stt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxgate_core::config::RuntimeConfig;

    #[test]
    fn for_encoding_accepts_every_documented_alias() {
        let runtime = RuntimeConfig::default();
        for name in ["pcmu", "ulaw", "g711u", "pcma", "alaw", "g711a", "g722", "opus", "amr-wb", "amrwb", "amr_wb"] {
            assert!(CallCodec::for_encoding(name, &runtime).is_ok(), "expected {name} to resolve");
        }
    }

    #[test]
    fn for_encoding_is_case_insensitive() {
        let runtime = RuntimeConfig::default();
        assert!(CallCodec::for_encoding("PCMU", &runtime).is_ok());
        assert!(CallCodec::for_encoding("Amr-Wb", &runtime).is_ok());
    }

    #[test]
    fn for_encoding_rejects_unknown_codec() {
        let runtime = RuntimeConfig::default();
        let err = CallCodec::for_encoding("g729", &runtime).unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }

    #[test]
    fn amrwb_branch_is_flagged_and_sync_branch_is_not() {
        let runtime = RuntimeConfig::default();
        assert!(CallCodec::for_encoding("amr-wb", &runtime).unwrap().is_amrwb());
        assert!(!CallCodec::for_encoding("pcmu", &runtime).unwrap().is_amrwb());
    }
}
