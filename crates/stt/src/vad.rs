//! Per-frame RMS/peak voice-activity detection with a pre-roll ring (spec
//! §4.5 "VAD").

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct VadConfig {
    pub rms_threshold: f64,
    pub peak_threshold: f64,
    /// Consecutive above-threshold frames required to declare speech_start.
    pub speech_streak_frames: u32,
    /// How much pre-detection audio (frames) to keep and prepend once
    /// speech is declared.
    pub pre_roll_frames: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            rms_threshold: 0.02,
            peak_threshold: 0.08,
            speech_streak_frames: 3,
            pre_roll_frames: 5,
        }
    }
}

fn frame_rms(frame: &[i16]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = frame
        .iter()
        .map(|&s| {
            let n = s as f64 / i16::MAX as f64;
            n * n
        })
        .sum();
    (sum_sq / frame.len() as f64).sqrt()
}

fn frame_peak(frame: &[i16]) -> f64 {
    frame
        .iter()
        .map(|&s| (s as f64 / i16::MAX as f64).abs())
        .fold(0.0, f64::max)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    None,
    SpeechStart,
    UtteranceEnd,
}

/// Streak + silence-timer based VAD. Frames are pushed in real time; the
/// caller is responsible for converting a frame-count silence threshold
/// into the configured `STT_SILENCE_MS` using the known frame duration.
pub struct Vad {
    config: VadConfig,
    pre_roll: VecDeque<Vec<i16>>,
    above_streak: u32,
    in_speech: bool,
    silent_frames_since_last_speech: u32,
    silence_frames_for_end: u32,
}

impl Vad {
    pub fn new(config: VadConfig, silence_ms: u64, frame_duration_ms: u64) -> Self {
        let silence_frames_for_end = (silence_ms / frame_duration_ms.max(1)).max(1) as u32;
        Self {
            pre_roll: VecDeque::with_capacity(config.pre_roll_frames),
            config,
            above_streak: 0,
            in_speech: false,
            silent_frames_since_last_speech: 0,
            silence_frames_for_end,
        }
    }

    pub fn is_in_speech(&self) -> bool {
        self.in_speech
    }

    /// Drain the accumulated pre-roll (oldest first) once speech starts.
    pub fn take_pre_roll(&mut self) -> Vec<Vec<i16>> {
        self.pre_roll.drain(..).collect()
    }

    /// Process one frame, updating the pre-roll ring and streak/silence
    /// counters, and return the VAD event (if any) this frame produced.
    pub fn push_frame(&mut self, frame: &[i16]) -> VadEvent {
        let rms = frame_rms(frame);
        let peak = frame_peak(frame);
        let above = rms >= self.config.rms_threshold || peak >= self.config.peak_threshold;

        if !self.in_speech {
            if self.pre_roll.len() == self.config.pre_roll_frames {
                self.pre_roll.pop_front();
            }
            self.pre_roll.push_back(frame.to_vec());
        }

        if above {
            self.above_streak += 1;
            self.silent_frames_since_last_speech = 0;
            if !self.in_speech && self.above_streak >= self.config.speech_streak_frames {
                self.in_speech = true;
                return VadEvent::SpeechStart;
            }
        } else {
            self.above_streak = 0;
            if self.in_speech {
                self.silent_frames_since_last_speech += 1;
                if self.silent_frames_since_last_speech >= self.silence_frames_for_end {
                    self.in_speech = false;
                    self.silent_frames_since_last_speech = 0;
                    return VadEvent::UtteranceEnd;
                }
            }
        }
        VadEvent::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loud_frame() -> Vec<i16> {
        vec![i16::MAX / 2; 320]
    }

    fn silent_frame() -> Vec<i16> {
        vec![0i16; 320]
    }

    #[test]
    fn speech_start_fires_after_streak() {
        let mut vad = Vad::new(VadConfig::default(), 700, 20);
        assert_eq!(vad.push_frame(&loud_frame()), VadEvent::None);
        assert_eq!(vad.push_frame(&loud_frame()), VadEvent::None);
        assert_eq!(vad.push_frame(&loud_frame()), VadEvent::SpeechStart);
    }

    #[test]
    fn utterance_end_fires_after_silence_ms() {
        let mut vad = Vad::new(VadConfig::default(), 60, 20); // 3 silent frames
        for _ in 0..3 {
            vad.push_frame(&loud_frame());
        }
        assert!(vad.is_in_speech());
        vad.push_frame(&silent_frame());
        vad.push_frame(&silent_frame());
        assert_eq!(vad.push_frame(&silent_frame()), VadEvent::UtteranceEnd);
        assert!(!vad.is_in_speech());
    }

    #[test]
    fn pre_roll_keeps_bounded_history_before_speech() {
        let config = VadConfig {
            pre_roll_frames: 2,
            ..VadConfig::default()
        };
        let mut vad = Vad::new(config, 700, 20);
        vad.push_frame(&silent_frame());
        vad.push_frame(&silent_frame());
        vad.push_frame(&silent_frame());
        assert_eq!(vad.take_pre_roll().len(), 2);
    }
}
