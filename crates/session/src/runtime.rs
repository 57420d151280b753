//! Orchestrates `CallSession`'s pure state machine against the external
//! collaborator clients: executes each `SessionAction` by calling out to
//! the carrier, LLM, TTS, and WAV-store clients. Mirrors the
//! `voxgate_stt::driver::SttDriver` pattern of wrapping pure logic (`Vad`)
//! with the transport calls the logic itself never makes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use voxgate_core::ids::CallId;
use voxgate_core::metrics::MetricsRegistry;
use voxgate_core::time::Clock;
use voxgate_media::ingest::IngestEvent;
use voxgate_stt::driver::InFlightCounter;

use crate::clients::{CarrierClient, LlmClient, TtsClient, WavStore};
use crate::error::Result;
use crate::playback::segment_reply;
use crate::state_machine::{CallSession, SessionAction, SessionConfig};
use crate::types::{PlaybackAuthority, Transcript, Transport};

pub struct SessionClients {
    pub carrier: Arc<dyn CarrierClient>,
    pub llm: Arc<dyn LlmClient>,
    pub tts: Arc<dyn TtsClient>,
    pub wav_store: Arc<dyn WavStore>,
}

/// Per-call driver: owns the state machine and the clients needed to
/// execute its actions. Single-threaded per call (spec §5) — the caller is
/// responsible for only ever invoking this from one task.
pub struct SessionRuntime {
    call_id: CallId,
    transport: Transport,
    session: CallSession,
    clients: SessionClients,
    turn_id: AtomicU64,
    first_segment_min_chars: usize,
    next_segment_min_chars: usize,
}

impl SessionRuntime {
    pub fn new(
        call_id: CallId,
        transport: Transport,
        clock: Clock,
        config: SessionConfig,
        clients: SessionClients,
    ) -> Self {
        Self::with_metrics(call_id, transport, clock, config, clients, MetricsRegistry::new())
    }

    pub fn with_metrics(
        call_id: CallId,
        transport: Transport,
        clock: Clock,
        config: SessionConfig,
        clients: SessionClients,
        metrics: MetricsRegistry,
    ) -> Self {
        Self {
            call_id,
            transport,
            session: CallSession::with_metrics(transport, clock, config, metrics),
            clients,
            turn_id: AtomicU64::new(0),
            first_segment_min_chars: 40,
            next_segment_min_chars: 80,
        }
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    pub async fn answer(&mut self) -> Result<()> {
        self.execute(self.session.answer()).await
    }

    pub async fn speech_start(&mut self) -> Result<()> {
        self.execute(self.session.speech_start()).await
    }

    /// Records that an inbound media frame was admitted, resetting the
    /// "no frames at all" dead-air suppression clock.
    pub fn note_inbound_media(&mut self) {
        self.session.note_inbound_media();
    }

    pub async fn playback_ended(&mut self, authority: PlaybackAuthority) -> Result<()> {
        self.execute(self.session.playback_ended(authority)).await
    }

    pub async fn dead_air_fire(&mut self, stt_in_flight: &InFlightCounter) -> Result<()> {
        if let Some(action) = self.session.dead_air_fire(stt_in_flight.get()) {
            self.execute(vec![action]).await?;
        }
        Ok(())
    }

    pub async fn hangup(&mut self, stt_in_flight: &InFlightCounter) -> Result<()> {
        self.execute(self.session.hangup(stt_in_flight.get())).await
    }

    /// Consumes a media-ingest health signal (spec §4.3). A `Chunk` event
    /// marks a successful decode; an `Unhealthy` event may drive a gated
    /// reprompt.
    pub async fn ingest_event(&mut self, event: IngestEvent) -> Result<()> {
        match event {
            IngestEvent::Chunk(_) => {
                self.session.note_decode_success();
                Ok(())
            }
            IngestEvent::Unhealthy { .. } => self.execute(self.session.ingest_unhealthy()).await,
        }
    }

    pub async fn late_final_arrived(&mut self, transcript: Transcript) -> Result<()> {
        self.execute(self.session.late_final_arrived(transcript)).await
    }

    pub async fn late_final_grace_expired(&mut self) -> Result<()> {
        self.execute(self.session.late_final_grace_expired()).await
    }

    /// Accept a transcript per the FINAL-only turn policy. When this drives
    /// a turn, the LLM reply is fetched and TTS playback started inline.
    pub async fn on_transcript(&mut self, transcript: Transcript) -> Result<()> {
        let actions = self.session.on_transcript(transcript);
        self.execute(actions).await
    }

    async fn execute(&mut self, actions: Vec<SessionAction>) -> Result<()> {
        for action in actions {
            self.execute_one(action).await?;
        }
        Ok(())
    }

    async fn execute_one(&mut self, action: SessionAction) -> Result<()> {
        match action {
            SessionAction::AnswerCall => {
                self.clients.carrier.answer(&self.call_id).await?;
            }
            SessionAction::PlaySegments(texts) => {
                self.play_segments(texts).await?;
            }
            SessionAction::StopPlayback => {
                // Carrier actions while the session has already marked
                // itself inactive are skipped by the caller; here playback
                // is still logically active so we always attempt the stop.
                let _ = self.clients.carrier.stop_playback(&self.call_id).await;
            }
            SessionAction::CancelQueuedSegments => {}
            SessionAction::ArmWatchdog(_) | SessionAction::ArmDeadAirTimer(_) | SessionAction::ArmLateFinalGrace(_) => {
                // Timer scheduling is the caller's responsibility (it owns
                // the per-call task and its `tokio::time::sleep` handles);
                // this runtime only executes the actions that need a
                // client call.
            }
            SessionAction::UtterReprompt(text) => {
                self.play_segments(vec![text]).await?;
            }
            SessionAction::RequestAssistantReply => {
                self.request_assistant_reply().await?;
            }
            SessionAction::Teardown(_reason) => {
                let _ = self.clients.carrier.hangup(&self.call_id).await;
            }
        }
        Ok(())
    }

    async fn request_assistant_reply(&mut self) -> Result<()> {
        let reply = match self.clients.llm.reply(self.session.history()).await {
            Ok(text) => text,
            Err(_) => self.session.fallback_reply_text().to_string(),
        };
        self.session.assistant_reply_ready(reply.clone());

        let transport = self.transport();
        let segments = segment_reply(
            transport,
            &reply,
            self.first_segment_min_chars,
            self.next_segment_min_chars,
        );
        let turn_id = self.turn_id.fetch_add(1, Ordering::SeqCst);
        let authority = match transport {
            Transport::Pstn => PlaybackAuthority::Webhook,
            Transport::WebRtcHd => PlaybackAuthority::Null,
        };
        let actions = self.session.start_speaking(segments, turn_id, authority);
        self.execute(actions).await
    }

    fn transport(&self) -> Transport {
        self.transport
    }

    async fn play_segments(&mut self, texts: Vec<String>) -> Result<()> {
        for text in texts {
            let wav = self.clients.tts.synthesize(&text).await?;
            let turn_id = self.turn_id.fetch_add(1, Ordering::SeqCst);
            let url = self.clients.wav_store.store(&self.call_id, turn_id, wav).await?;
            self.clients.carrier.play(&self.call_id, &url).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use voxgate_core::ids::CallId;

    #[derive(Default)]
    struct StubCarrier {
        played: Mutex<Vec<String>>,
        hung_up: Mutex<bool>,
    }

    #[async_trait]
    impl CarrierClient for StubCarrier {
        async fn answer(&self, _call_id: &CallId) -> Result<()> {
            Ok(())
        }
        async fn play(&self, _call_id: &CallId, url: &str) -> Result<()> {
            self.played.lock().unwrap().push(url.to_string());
            Ok(())
        }
        async fn stop_playback(&self, _call_id: &CallId) -> Result<()> {
            Ok(())
        }
        async fn hangup(&self, _call_id: &CallId) -> Result<()> {
            *self.hung_up.lock().unwrap() = true;
            Ok(())
        }
    }

    struct StubLlm;
    #[async_trait]
    impl LlmClient for StubLlm {
        async fn reply(&self, _history: &[crate::types::Turn]) -> Result<String> {
            Ok("Hello there.".to_string())
        }
    }

    struct StubTts;
    #[async_trait]
    impl TtsClient for StubTts {
        async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
            Ok(b"RIFF....WAVE".to_vec())
        }
    }

    struct StubWavStore;
    #[async_trait]
    impl WavStore for StubWavStore {
        async fn store(&self, call_id: &CallId, turn_id: u64, _bytes: Vec<u8>) -> Result<String> {
            Ok(format!("https://wav.example/{}/{}", call_id.as_str(), turn_id))
        }
    }

    fn runtime() -> (SessionRuntime, Arc<StubCarrier>) {
        let carrier = Arc::new(StubCarrier::default());
        let clients = SessionClients {
            carrier: carrier.clone(),
            llm: Arc::new(StubLlm),
            tts: Arc::new(StubTts),
            wav_store: Arc::new(StubWavStore),
        };
        let runtime = SessionRuntime::new(
            CallId::new("call-1"),
            Transport::Pstn,
            Clock::mock(),
            SessionConfig::default(),
            clients,
        );
        (runtime, carrier)
    }

    #[tokio::test]
    async fn answer_calls_carrier_answer() {
        let (mut runtime, _carrier) = runtime();
        runtime.answer().await.unwrap();
        assert_eq!(runtime.session().state(), crate::types::CallSessionState::Answered);
    }

    #[tokio::test]
    async fn accepted_final_drives_llm_and_tts_and_play() {
        let (mut runtime, carrier) = runtime();
        runtime.answer().await.unwrap();
        runtime
            .session
            .start_speaking(vec!["greeting".to_string()], 0, PlaybackAuthority::Webhook);
        runtime.playback_ended(PlaybackAuthority::Webhook).await.unwrap();

        runtime
            .on_transcript(Transcript::new(
                "what's the weather",
                crate::types::TranscriptSource::Final,
                400,
            ))
            .await
            .unwrap();

        assert!(!carrier.played.lock().unwrap().is_empty());
        assert_eq!(runtime.session().state(), crate::types::CallSessionState::Speaking);
    }

    #[tokio::test]
    async fn ingest_unhealthy_event_triggers_a_reprompt_once_listening() {
        use voxgate_media::ingest::UnhealthyReasonPublic;

        let (mut runtime, carrier) = runtime();
        runtime.answer().await.unwrap();
        runtime
            .session
            .start_speaking(vec!["greeting".to_string()], 0, PlaybackAuthority::Webhook);
        runtime.playback_ended(PlaybackAuthority::Webhook).await.unwrap();

        runtime
            .ingest_event(IngestEvent::Unhealthy {
                reason: UnhealthyReasonPublic::DecodeFailures,
            })
            .await
            .unwrap();

        assert!(!carrier.played.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ingest_chunk_event_marks_a_successful_decode() {
        let (mut runtime, _carrier) = runtime();
        runtime.answer().await.unwrap();
        runtime.ingest_event(IngestEvent::Chunk(vec![0, 1, 2])).await.unwrap();
    }
}
