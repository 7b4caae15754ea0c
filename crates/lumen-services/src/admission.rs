#![forbid(unsafe_code)]

//! Sliding-window admission control for outbound calls.

use std::collections::VecDeque;
use std::time::Duration;

use lumen_core::AdmissionControl;

/// Admits at most `max` calls in any `window`-long span.
///
/// Timestamps are the same monotonic offsets the engine uses, so the limiter
/// is deterministic under test.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max: usize,
    window: Duration,
    admitted: VecDeque<Duration>,
}

impl Default for RateLimiter {
    /// Ten calls per minute.
    fn default() -> Self {
        Self::new(10, Duration::from_secs(60))
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window,
            admitted: VecDeque::with_capacity(max),
        }
    }

    /// Calls that would still be admitted at `now`.
    #[must_use]
    pub fn remaining(&self, now: Duration) -> usize {
        self.max.saturating_sub(self.live(now).count())
    }

    fn live(&self, now: Duration) -> impl Iterator<Item = &Duration> + '_ {
        let window = self.window;
        self.admitted
            .iter()
            .filter(move |at| now.saturating_sub(**at) < window)
    }

    fn evict(&mut self, now: Duration) {
        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_sub(oldest) < self.window {
                break;
            }
            self.admitted.pop_front();
        }
    }
}

impl AdmissionControl for RateLimiter {
    fn can_proceed(&mut self, now: Duration) -> bool {
        self.evict(now);
        if self.admitted.len() >= self.max {
            tracing::debug!(max = self.max, "admission refused");
            return false;
        }
        self.admitted.push_back(now);
        true
    }

    fn time_until_next_slot(&self, now: Duration) -> Duration {
        if self.remaining(now) > 0 {
            return Duration::ZERO;
        }
        self.live(now)
            .next()
            .map_or(Duration::ZERO, |oldest| {
                oldest.saturating_add(self.window).saturating_sub(now)
            })
    }
}
