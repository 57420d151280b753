//! Per-window ingest health monitor (spec §4.3 "Health monitor").

use voxgate_core::time::Clock;

const MIN_FRAMES_FOR_VERDICT: u32 = 10;
const MIN_WINDOW_MS: u64 = 1_000;
const DECODE_FAILURES_THRESHOLD: u32 = 5;
const TINY_PAYLOADS_THRESHOLD: u32 = 10;
const EMITTED_CHUNKS_FOR_RMS_CHECK: u32 = 10;
const LOW_RMS_THRESHOLD: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnhealthyReason {
    DecodeFailures,
    TinyPayloads,
    LowRms,
}

#[derive(Debug, Clone, Default)]
pub struct WindowCounters {
    pub total_frames: u32,
    pub decoded_frames: u32,
    pub emitted_chunks: u32,
    pub silent_frames: u32,
    pub tiny_payload_frames: u32,
    pub decode_failures: u32,
    rms_sum: f64,
    rms_samples: u64,
}

impl WindowCounters {
    pub fn rolling_rms(&self) -> f64 {
        if self.rms_samples == 0 {
            0.0
        } else {
            (self.rms_sum / self.rms_samples as f64).sqrt()
        }
    }

    pub fn observe_rms_sample(&mut self, sample: i16) {
        let normalized = sample as f64 / i16::MAX as f64;
        self.rms_sum += normalized * normalized;
        self.rms_samples += 1;
    }
}

/// Tracks ingest health over a sliding window; `verdict()` returns a reason
/// once the window has accumulated enough evidence, `None` otherwise.
pub struct HealthMonitor {
    clock: Clock,
    window_started_at_ms: u64,
    counters: WindowCounters,
}

impl HealthMonitor {
    pub fn new(clock: Clock) -> Self {
        let window_started_at_ms = clock.now_ms();
        Self {
            clock,
            window_started_at_ms,
            counters: WindowCounters::default(),
        }
    }

    pub fn counters(&self) -> &WindowCounters {
        &self.counters
    }

    pub fn record_frame(&mut self) {
        self.counters.total_frames += 1;
    }

    pub fn record_decoded(&mut self, pcm16: &[i16]) {
        self.counters.decoded_frames += 1;
        for &sample in pcm16 {
            self.counters.observe_rms_sample(sample);
        }
    }

    pub fn record_emitted_chunk(&mut self) {
        self.counters.emitted_chunks += 1;
    }

    pub fn record_silent_frame(&mut self) {
        self.counters.silent_frames += 1;
    }

    pub fn record_tiny_payload(&mut self) {
        self.counters.tiny_payload_frames += 1;
    }

    pub fn record_decode_failure(&mut self) {
        self.counters.decode_failures += 1;
    }

    /// Evaluate the current window, returning an unhealthy reason if
    /// thresholds are crossed; resets the window either way once enough
    /// frames have accumulated.
    pub fn verdict(&mut self) -> Option<UnhealthyReason> {
        let elapsed_ms = self.clock.now_ms().saturating_sub(self.window_started_at_ms);
        if self.counters.total_frames < MIN_FRAMES_FOR_VERDICT || elapsed_ms < MIN_WINDOW_MS {
            return None;
        }

        let reason = if self.counters.decode_failures >= DECODE_FAILURES_THRESHOLD {
            Some(UnhealthyReason::DecodeFailures)
        } else if self.counters.tiny_payload_frames >= TINY_PAYLOADS_THRESHOLD {
            Some(UnhealthyReason::TinyPayloads)
        } else if self.counters.emitted_chunks >= EMITTED_CHUNKS_FOR_RMS_CHECK
            && self.counters.rolling_rms() < LOW_RMS_THRESHOLD
        {
            Some(UnhealthyReason::LowRms)
        } else {
            None
        };

        self.counters = WindowCounters::default();
        self.window_started_at_ms = self.clock.now_ms();
        reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_is_none_before_minimum_frames() {
        let clock = Clock::mock();
        let mut monitor = HealthMonitor::new(clock.clone());
        for _ in 0..5 {
            monitor.record_frame();
        }
        clock.advance(std::time::Duration::from_secs(2));
        assert_eq!(monitor.verdict(), None);
    }

    #[test]
    fn decode_failures_threshold_triggers_unhealthy() {
        let clock = Clock::mock();
        let mut monitor = HealthMonitor::new(clock.clone());
        for _ in 0..10 {
            monitor.record_frame();
        }
        for _ in 0..5 {
            monitor.record_decode_failure();
        }
        clock.advance(std::time::Duration::from_secs(2));
        assert_eq!(monitor.verdict(), Some(UnhealthyReason::DecodeFailures));
    }

    #[test]
    fn low_rms_requires_enough_emitted_chunks() {
        let clock = Clock::mock();
        let mut monitor = HealthMonitor::new(clock.clone());
        for _ in 0..10 {
            monitor.record_frame();
            monitor.record_emitted_chunk();
            monitor.record_decoded(&[0i16; 10]);
        }
        clock.advance(std::time::Duration::from_secs(2));
        assert_eq!(monitor.verdict(), Some(UnhealthyReason::LowRms));
    }
}
