//! Data model shared by the state machine and runtime (spec §3, §4.6).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Pstn,
    WebRtcHd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSessionState {
    Init,
    Answered,
    Listening,
    Thinking,
    Speaking,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptSource {
    PartialFallback,
    Final,
}

#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    pub source: TranscriptSource,
    pub utterance_ms: u64,
    pub text_length: usize,
    pub is_empty: bool,
}

impl Transcript {
    pub fn new(text: impl Into<String>, source: TranscriptSource, utterance_ms: u64) -> Self {
        let text = text.into();
        let text_length = text.len();
        Self {
            is_empty: text.trim().is_empty(),
            text,
            source,
            utterance_ms,
            text_length,
        }
    }
}

/// Who may authoritatively close out a playback on PSTN (spec §4.6
/// "Playback-end authority").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackAuthority {
    Webhook,
    Watchdog,
    /// Any other caller; rejected unless a failsafe cleanup is required.
    Null,
}

#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    pub active: bool,
    pub interrupted: bool,
    pub segment_id: Option<u64>,
    pub segment_duration_ms: Option<u64>,
}
