//! The Call Session state machine (spec §4.6): answer/listen/think/speak/end
//! transitions, FINAL-only turn policy, barge-in, playback-end authority,
//! dead-air reprompt gating, and late-final grace. Pure logic — no I/O, no
//! transport calls; see `runtime::SessionRuntime` for the orchestrating
//! layer that executes the `SessionAction`s this module emits.

use std::time::Duration;

use voxgate_core::config::RuntimeConfig;
use voxgate_core::metrics::MetricsRegistry;
use voxgate_core::time::Clock;

use crate::types::{CallSessionState, PlaybackAuthority, PlaybackState, Role, Transcript, TranscriptSource, Transport, Turn};

const AFTER_SPEECH_START_GRACE_MS: u64 = 1_500;

const INGEST_REPROMPT_COOLDOWN_MS: u64 = 5_000;
const INGEST_REPROMPT_SPEECH_START_GUARD_MS: u64 = 1_500;
const INGEST_REPROMPT_DECODE_GUARD_MS: u64 = 1_200;
const INGEST_TROUBLE_HEARING_TEXT: &str = "I'm having trouble hearing you. Please try again.";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub watchdog_timeout: Duration,
    pub dead_air_ms: u64,
    pub dead_air_no_frames_ms: u64,
    pub late_final_grace_ms: u64,
    pub reprompt_text: String,
    pub fallback_reply_text: String,
    /// Listening-grace window before a dead-air reprompt is allowed to fire,
    /// grown per consecutive reprompt (`post_playback_grace_ms`) rather than
    /// held fixed (open question 3, §9).
    pub post_playback_grace_min_ms: u64,
    pub post_playback_grace_max_ms: u64,
    pub post_playback_grace_fixed_ms: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout: Duration::from_secs(8),
            dead_air_ms: 8_000,
            dead_air_no_frames_ms: 3_000,
            late_final_grace_ms: 1_500,
            reprompt_text: "Are you still there?".to_string(),
            fallback_reply_text: "Acknowledged.".to_string(),
            post_playback_grace_min_ms: 1_200,
            post_playback_grace_max_ms: 1_500,
            post_playback_grace_fixed_ms: None,
        }
    }
}

impl SessionConfig {
    /// Derive a per-call config from the process-wide runtime config (spec
    /// §6), layering in the dead-air and STT toggles this state machine
    /// actually consumes.
    pub fn from_runtime(runtime: &RuntimeConfig) -> Self {
        Self {
            watchdog_timeout: runtime.watchdog_timeout,
            dead_air_ms: runtime.dead_air.dead_air_ms,
            dead_air_no_frames_ms: runtime.dead_air.dead_air_no_frames_ms,
            late_final_grace_ms: runtime.stt.late_final_grace_ms,
            post_playback_grace_min_ms: runtime.stt.post_playback_grace_min_ms,
            post_playback_grace_max_ms: runtime.stt.post_playback_grace_max_ms,
            post_playback_grace_fixed_ms: runtime.stt.post_playback_grace_fixed_ms,
            ..Self::default()
        }
    }

    /// Fixed override wins when set and positive, else `min_ms + growth`
    /// clamped to `max_ms`, where growth scales with the number of
    /// consecutive dead-air reprompts already issued this call.
    fn post_playback_grace_ms(&self, consecutive_reprompts: u32) -> u64 {
        if let Some(fixed) = self.post_playback_grace_fixed_ms {
            if fixed > 0 {
                return fixed;
            }
        }
        let growth = u64::from(consecutive_reprompts) * 100;
        (self.post_playback_grace_min_ms + growth).min(self.post_playback_grace_max_ms)
    }
}

/// Actions the state machine asks its caller to perform. Pure output — the
/// state machine never calls a client itself (spec §9 "cyclic ownership").
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    AnswerCall,
    PlaySegments(Vec<String>),
    StopPlayback,
    CancelQueuedSegments,
    ArmWatchdog(Duration),
    ArmDeadAirTimer(Duration),
    ArmLateFinalGrace(Duration),
    UtterReprompt(String),
    RequestAssistantReply,
    Teardown(String),
}

pub struct CallSession {
    transport: Transport,
    state: CallSessionState,
    clock: Clock,
    config: SessionConfig,

    history: Vec<Turn>,
    latest_partial: Option<String>,

    playback: PlaybackState,
    playback_authority: Option<PlaybackAuthority>,
    deferred_final: Option<Transcript>,
    accepted_this_utterance: bool,

    entered_listening_at_ms: Option<u64>,
    last_speech_start_ms: Option<u64>,
    last_inbound_media_ms: Option<u64>,
    handling_transcript: bool,
    consecutive_dead_air_reprompts: u32,

    late_final_grace_open: bool,
    late_final_captured: bool,

    last_ingest_reprompt_ms: Option<u64>,
    last_successful_decode_ms: Option<u64>,
    metrics: MetricsRegistry,
}

impl CallSession {
    pub fn new(transport: Transport, clock: Clock, config: SessionConfig) -> Self {
        Self::with_metrics(transport, clock, config, MetricsRegistry::new())
    }

    pub fn with_metrics(transport: Transport, clock: Clock, config: SessionConfig, metrics: MetricsRegistry) -> Self {
        Self {
            transport,
            state: CallSessionState::Init,
            clock,
            config,
            history: Vec::new(),
            latest_partial: None,
            playback: PlaybackState::default(),
            playback_authority: None,
            deferred_final: None,
            accepted_this_utterance: false,
            entered_listening_at_ms: None,
            last_speech_start_ms: None,
            last_inbound_media_ms: None,
            handling_transcript: false,
            consecutive_dead_air_reprompts: 0,
            metrics,
            late_final_grace_open: false,
            late_final_captured: false,
            last_ingest_reprompt_ms: None,
            last_successful_decode_ms: None,
        }
    }

    pub fn state(&self) -> CallSessionState {
        self.state
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn is_playback_active(&self) -> bool {
        self.playback.active
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.state, CallSessionState::Listening)
    }

    fn push_turn(&mut self, role: Role, content: String) {
        self.history.push(Turn {
            role,
            content,
            timestamp_ms: voxgate_core::time::unix_millis_now(),
        });
    }

    /// INIT -> ANSWERED on carrier answer / WebRTC offer accepted.
    pub fn answer(&mut self) -> Vec<SessionAction> {
        if self.state != CallSessionState::Init {
            return Vec::new();
        }
        self.state = CallSessionState::Answered;
        vec![SessionAction::AnswerCall]
    }

    /// ANSWERED/LISTENING -> SPEAKING on starting a TTS playback.
    /// `authority` names who may end this playback on PSTN.
    pub fn start_speaking(
        &mut self,
        segments: Vec<String>,
        segment_id: u64,
        authority: PlaybackAuthority,
    ) -> Vec<SessionAction> {
        self.state = CallSessionState::Speaking;
        self.playback = PlaybackState {
            active: true,
            interrupted: false,
            segment_id: Some(segment_id),
            segment_duration_ms: None,
        };
        self.playback_authority = Some(authority);
        // Turn end: release the per-utterance acceptance gate for the next one.
        self.accepted_this_utterance = false;

        let mut actions = vec![SessionAction::PlaySegments(segments)];
        if self.transport == Transport::Pstn {
            actions.push(SessionAction::ArmWatchdog(self.config.watchdog_timeout));
        }
        actions
    }

    /// `now_ms` returns a caller-observed "inbound media seen" timestamp.
    pub fn note_inbound_media(&mut self) {
        self.last_inbound_media_ms = Some(self.clock.now_ms());
    }

    /// Barge-in: speech detected while playback is active and not already
    /// interrupted.
    pub fn speech_start(&mut self) -> Vec<SessionAction> {
        self.last_speech_start_ms = Some(self.clock.now_ms());
        if self.playback.active && !self.playback.interrupted {
            self.playback.interrupted = true;
            self.metrics.incr("barge_ins_total", &[], 1);
            return vec![SessionAction::CancelQueuedSegments, SessionAction::StopPlayback];
        }
        Vec::new()
    }

    /// Only two callers may close out a playback on PSTN: the carrier
    /// webhook and the session's own watchdog. Any other caller is rejected
    /// unless playback is still marked active, in which case a failsafe
    /// cleanup still runs so LISTENING is never permanently blocked.
    pub fn playback_ended(&mut self, authority: PlaybackAuthority) -> Vec<SessionAction> {
        // Webhook/watchdog are always authoritative; any other caller still
        // runs the failsafe cleanup when playback is still marked active,
        // so LISTENING is never permanently gated shut.
        let authoritative = match self.transport {
            Transport::Pstn => {
                matches!(authority, PlaybackAuthority::Webhook | PlaybackAuthority::Watchdog)
                    || self.playback.active
            }
            Transport::WebRtcHd => true,
        };
        if !authoritative {
            return Vec::new();
        }

        self.playback = PlaybackState::default();
        self.playback_authority = None;
        self.state = CallSessionState::Listening;
        self.entered_listening_at_ms = Some(self.clock.now_ms());

        if let Some(deferred) = self.deferred_final.take() {
            return self.accept_final(deferred);
        }
        Vec::new()
    }

    /// FINAL-only turn policy (spec §4.6). Partials are recorded for
    /// diagnostics only and never trigger a turn.
    pub fn on_transcript(&mut self, transcript: Transcript) -> Vec<SessionAction> {
        if transcript.source == TranscriptSource::PartialFallback {
            self.latest_partial = Some(transcript.text);
            return Vec::new();
        }
        if self.accepted_this_utterance {
            return Vec::new();
        }
        if self.playback.active && !self.playback.interrupted {
            self.deferred_final = Some(transcript);
            return Vec::new();
        }
        self.accept_final(transcript)
    }

    fn accept_final(&mut self, transcript: Transcript) -> Vec<SessionAction> {
        self.accepted_this_utterance = true;
        self.handling_transcript = true;
        self.state = CallSessionState::Thinking;
        self.push_turn(Role::User, transcript.text);
        self.handling_transcript = false;
        self.metrics.incr("turns_total", &[], 1);
        vec![SessionAction::RequestAssistantReply]
    }

    /// Called once the LLM reply (or fallback text, on failure) is ready;
    /// records the assistant turn. The caller still owns TTS segmentation
    /// and must call `start_speaking` to actually transition to SPEAKING.
    pub fn assistant_reply_ready(&mut self, text: String) {
        self.push_turn(Role::Assistant, text);
    }

    pub fn fallback_reply_text(&self) -> &str {
        &self.config.fallback_reply_text
    }

    /// Dead-air reprompt timer fired while LISTENING. Returns `Some` only
    /// when no suppressive condition holds.
    pub fn dead_air_fire(&mut self, stt_in_flight: u32) -> Option<SessionAction> {
        if !matches!(self.state, CallSessionState::Listening) {
            return None;
        }
        let now = self.clock.now_ms();
        let listening_grace_ms = self.config.post_playback_grace_ms(self.consecutive_dead_air_reprompts);
        let suppressed = stt_in_flight > 0
            || self.handling_transcript
            || self.entered_listening_at_ms.map_or(true, |t| now.saturating_sub(t) < listening_grace_ms)
            || self.last_speech_start_ms.map_or(false, |t| now.saturating_sub(t) < AFTER_SPEECH_START_GRACE_MS)
            || match self.last_inbound_media_ms {
                Some(t) => now.saturating_sub(t) < self.config.dead_air_no_frames_ms,
                None => true,
            }
            || self.playback.active;

        if suppressed {
            return None;
        }
        self.consecutive_dead_air_reprompts += 1;
        Some(SessionAction::UtterReprompt(self.config.reprompt_text.clone()))
    }

    pub fn consecutive_dead_air_reprompts(&self) -> u32 {
        self.consecutive_dead_air_reprompts
    }

    /// A media frame decoded successfully; resets the ingest-health clock
    /// used to gate `ingest_unhealthy` reprompts.
    pub fn note_decode_success(&mut self) {
        self.last_successful_decode_ms = Some(self.clock.now_ms());
    }

    /// The media ingest pipeline reported sustained unhealthiness (spec
    /// §4.3). Fires a reprompt only while listening, not during playback,
    /// and outside the cooldown/speech-start/decode guard windows.
    pub fn ingest_unhealthy(&mut self) -> Vec<SessionAction> {
        if !matches!(self.state, CallSessionState::Listening) || self.playback.active {
            return Vec::new();
        }
        let now = self.clock.now_ms();
        let suppressed = self
            .last_ingest_reprompt_ms
            .map_or(false, |t| now.saturating_sub(t) < INGEST_REPROMPT_COOLDOWN_MS)
            || self
                .last_speech_start_ms
                .map_or(false, |t| now.saturating_sub(t) < INGEST_REPROMPT_SPEECH_START_GUARD_MS)
            || self
                .last_successful_decode_ms
                .map_or(false, |t| now.saturating_sub(t) < INGEST_REPROMPT_DECODE_GUARD_MS);

        if suppressed {
            return Vec::new();
        }
        self.last_ingest_reprompt_ms = Some(now);
        vec![SessionAction::UtterReprompt(INGEST_TROUBLE_HEARING_TEXT.to_string())]
    }

    /// Hangup. If STT is in flight, open the late-final grace window
    /// instead of tearing down immediately.
    pub fn hangup(&mut self, stt_in_flight: u32) -> Vec<SessionAction> {
        if stt_in_flight > 0 {
            self.late_final_grace_open = true;
            return vec![SessionAction::ArmLateFinalGrace(Duration::from_millis(
                self.config.late_final_grace_ms,
            ))];
        }
        self.state = CallSessionState::Ended;
        vec![SessionAction::Teardown("hangup".to_string())]
    }

    /// A final transcript arrived within the late-final grace window.
    pub fn late_final_arrived(&mut self, transcript: Transcript) -> Vec<SessionAction> {
        if !self.late_final_grace_open || self.late_final_captured {
            return Vec::new();
        }
        self.late_final_captured = true;
        self.push_turn(Role::User, transcript.text);
        self.state = CallSessionState::Ended;
        vec![SessionAction::Teardown("hangup_late_final".to_string())]
    }

    /// The grace timer expired with no late final captured.
    pub fn late_final_grace_expired(&mut self) -> Vec<SessionAction> {
        if self.late_final_captured {
            return Vec::new();
        }
        self.state = CallSessionState::Ended;
        vec![SessionAction::Teardown("hangup_grace_expired".to_string())]
    }
}
