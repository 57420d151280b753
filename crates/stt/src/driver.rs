//! Chunked STT driver (spec §4.5): VAD-driven utterance detection, request
//! lifecycle, in-flight counter, and pause/resume via caller-supplied hooks.
//! The driver itself makes no transport calls; `SttTransport::send_request`
//! is provided by the caller (the session's STT client).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::request::build_wav;
use crate::vad::{Vad, VadConfig, VadEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptSource {
    Partial,
    Final,
}

#[derive(Debug, Clone)]
pub struct SttResponse {
    pub text: String,
    pub source: TranscriptSource,
}

#[async_trait]
pub trait SttTransport: Send + Sync {
    async fn send_request(&self, wav: Vec<u8>, is_partial: bool) -> Result<SttResponse>;
}

/// Hooks the driver consults before ingesting a frame; per spec §4.5 the
/// driver itself never calls the transport/session, only these predicates.
pub trait ListenerGate: Send {
    fn is_listening(&self) -> bool;
    fn is_playback_active(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    SpeechStart,
    Transcript { text: String, source: TranscriptSource },
    UtteranceEnd,
    FinalResult { text: String },
    SttRequestStart,
    SttRequestEnd,
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub vad: VadConfig,
    pub silence_ms: u64,
    pub frame_duration_ms: u64,
    pub sample_rate_hz: u32,
    pub partial_interval_ms: Option<u64>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            vad: VadConfig::default(),
            silence_ms: 700,
            frame_duration_ms: 20,
            sample_rate_hz: 16_000,
            partial_interval_ms: None,
        }
    }
}

/// Shared, cloneable in-flight request counter visible to the Call Session
/// (suppresses dead-air reprompts, arms late-final grace on hangup).
#[derive(Clone, Default)]
pub struct InFlightCounter(Arc<AtomicU32>);

impl InFlightCounter {
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct SttDriver {
    config: DriverConfig,
    vad: Vad,
    accumulated_speech: Vec<i16>,
    elapsed_since_last_partial_ms: u64,
    accepted_this_utterance: bool,
    in_flight: InFlightCounter,
}

impl SttDriver {
    pub fn new(config: DriverConfig) -> Self {
        let vad = Vad::new(config.vad.clone(), config.silence_ms, config.frame_duration_ms);
        Self {
            config,
            vad,
            accumulated_speech: Vec::new(),
            elapsed_since_last_partial_ms: 0,
            accepted_this_utterance: false,
            in_flight: InFlightCounter::default(),
        }
    }

    pub fn in_flight(&self) -> InFlightCounter {
        self.in_flight.clone()
    }

    /// Ingest one frame. Returns `Ok(events)` unless the driver is paused
    /// (not listening, or playback active), in which case the frame is
    /// dropped entirely and no events fire.
    pub fn push_frame(&mut self, frame: &[i16], gate: &dyn ListenerGate) -> Vec<DriverEvent> {
        if !gate.is_listening() || gate.is_playback_active() {
            return Vec::new();
        }

        let mut events = Vec::new();
        match self.vad.push_frame(frame) {
            VadEvent::SpeechStart => {
                self.accumulated_speech.clear();
                self.accumulated_speech
                    .extend(self.vad.take_pre_roll().into_iter().flatten());
                self.accepted_this_utterance = false;
                self.elapsed_since_last_partial_ms = 0;
                events.push(DriverEvent::SpeechStart);
            }
            VadEvent::UtteranceEnd => {
                events.push(DriverEvent::UtteranceEnd);
            }
            VadEvent::None => {}
        }

        if self.vad.is_in_speech() {
            self.accumulated_speech.extend_from_slice(frame);
            self.elapsed_since_last_partial_ms += self.config.frame_duration_ms;
        }

        events
    }

    /// Whether a partial request is due, given the configured interval.
    pub fn partial_due(&self) -> bool {
        match self.config.partial_interval_ms {
            Some(interval) if interval > 0 => self.elapsed_since_last_partial_ms >= interval,
            _ => false,
        }
    }

    /// Issue a partial request against the currently accumulated speech.
    pub async fn send_partial(&mut self, transport: &dyn SttTransport) -> Result<Vec<DriverEvent>> {
        self.elapsed_since_last_partial_ms = 0;
        self.dispatch(transport, true).await
    }

    /// Dispatch the final request at utterance end. At most one transcript
    /// is accepted per utterance; a second call before the next
    /// `SpeechStart` is a no-op.
    pub async fn finish_utterance(&mut self, transport: &dyn SttTransport) -> Result<Vec<DriverEvent>> {
        if self.accepted_this_utterance {
            return Ok(Vec::new());
        }
        let events = self.dispatch(transport, false).await?;
        self.accepted_this_utterance = true;
        Ok(events)
    }

    async fn dispatch(&mut self, transport: &dyn SttTransport, is_partial: bool) -> Result<Vec<DriverEvent>> {
        let wav = build_wav(self.config.sample_rate_hz, &self.accumulated_speech)?;
        self.in_flight.increment();
        let mut events = vec![DriverEvent::SttRequestStart];
        let result = transport.send_request(wav, is_partial).await;
        self.in_flight.decrement();
        events.push(DriverEvent::SttRequestEnd);

        match result {
            Ok(response) => {
                events.push(DriverEvent::Transcript {
                    text: response.text.clone(),
                    source: response.source.clone(),
                });
                if response.source == TranscriptSource::Final {
                    events.push(DriverEvent::FinalResult { text: response.text });
                }
                Ok(events)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysListening;
    impl ListenerGate for AlwaysListening {
        fn is_listening(&self) -> bool {
            true
        }
        fn is_playback_active(&self) -> bool {
            false
        }
    }

    struct Paused;
    impl ListenerGate for Paused {
        fn is_listening(&self) -> bool {
            false
        }
        fn is_playback_active(&self) -> bool {
            false
        }
    }

    struct StubTransport {
        response_text: String,
        is_final: bool,
    }

    #[async_trait]
    impl SttTransport for StubTransport {
        async fn send_request(&self, _wav: Vec<u8>, _is_partial: bool) -> Result<SttResponse> {
            Ok(SttResponse {
                text: self.response_text.clone(),
                source: if self.is_final {
                    TranscriptSource::Final
                } else {
                    TranscriptSource::Partial
                },
            })
        }
    }

    fn loud_frame() -> Vec<i16> {
        vec![i16::MAX / 2; 320]
    }

    #[test]
    fn paused_gate_drops_frames_entirely() {
        let mut driver = SttDriver::new(DriverConfig::default());
        let events = driver.push_frame(&loud_frame(), &Paused);
        assert!(events.is_empty());
    }

    #[test]
    fn speech_start_fires_through_gate() {
        let mut driver = SttDriver::new(DriverConfig::default());
        let gate = AlwaysListening;
        driver.push_frame(&loud_frame(), &gate);
        driver.push_frame(&loud_frame(), &gate);
        let events = driver.push_frame(&loud_frame(), &gate);
        assert!(events.contains(&DriverEvent::SpeechStart));
    }

    #[tokio::test]
    async fn finish_utterance_dispatches_once_per_utterance() {
        let mut driver = SttDriver::new(DriverConfig::default());
        let transport = StubTransport {
            response_text: "hello".to_string(),
            is_final: true,
        };
        let gate = AlwaysListening;
        for _ in 0..3 {
            driver.push_frame(&loud_frame(), &gate);
        }
        let events = driver.finish_utterance(&transport).await.unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, DriverEvent::FinalResult { .. })));
        assert_eq!(driver.in_flight().get(), 0);

        let second = driver.finish_utterance(&transport).await.unwrap();
        assert!(second.is_empty());
    }
}
