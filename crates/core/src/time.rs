//! A thin clock abstraction. Production code uses `Clock::Wall`;
//! deterministic tests (sequence monotonicity, dead-air gating, late-final
//! grace) use `Clock::mock()` so timer-driven behavior doesn't depend on
//! wall-clock scheduling jitter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Clone)]
pub enum Clock {
    Wall,
    Mock(Arc<AtomicU64>),
}

impl Clock {
    pub fn wall() -> Self {
        Clock::Wall
    }

    pub fn mock() -> Self {
        Clock::Mock(Arc::new(AtomicU64::new(0)))
    }

    /// Milliseconds since an arbitrary epoch (`Instant`-relative for `Wall`,
    /// the mock counter for `Mock`). Only meaningful for computing deltas
    /// against another reading from the same `Clock`.
    pub fn now_ms(&self) -> u64 {
        match self {
            Clock::Wall => {
                static START: once_cell::sync::Lazy<Instant> =
                    once_cell::sync::Lazy::new(Instant::now);
                START.elapsed().as_millis() as u64
            }
            Clock::Mock(counter) => counter.load(Ordering::SeqCst),
        }
    }

    /// Advance a mock clock. No-op on `Wall`.
    pub fn advance(&self, by: Duration) {
        if let Clock::Mock(counter) = self {
            counter.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
        }
    }
}

/// Wall-clock Unix milliseconds, used for lifecycle timestamps recorded on
/// the `CallSession` aggregate (answer time, hangup time, etc.) where an
/// absolute timestamp -- not a monotonic delta -- is what gets logged.
pub fn unix_millis_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_advances_deterministically() {
        let clock = Clock::mock();
        assert_eq!(clock.now_ms(), 0);
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now_ms(), 250);
    }
}
