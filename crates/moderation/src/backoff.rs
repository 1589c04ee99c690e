//! Reconnect backoff
//!
//! Deterministic exponential backoff: each failed attempt waits the current
//! delay and doubles it for the next one, capped at the maximum. A successful
//! subscription resets to the initial delay.

use ::backoff::backoff::Backoff;
use ::backoff::ExponentialBackoff;
use std::time::Duration;

/// Reconnect delay tracker
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    inner: ExponentialBackoff,
    attempts: u32,
}

impl ReconnectBackoff {
    /// Start at `initial`, never exceeding `max`
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        let inner = ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: max,
            max_elapsed_time: None,
            ..Default::default()
        };
        Self { inner, attempts: 0 }
    }

    /// Delay the next reconnect will wait
    pub fn current_delay(&self) -> Duration {
        self.inner.current_interval
    }

    /// Failed attempts since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Take the current delay for a reconnect and double it for the one after
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.inner.current_interval;
        // Advances the interval; the returned value goes through float math and
        // can be a nanosecond off
        let _ = self.inner.next_backoff();
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Back to the initial delay with no attempts
    pub fn reset(&mut self) {
        self.inner.reset();
        self.attempts = 0;
    }

    /// Resume from a persisted delay and attempt count
    pub fn restore(&mut self, delay: Duration, attempts: u32) {
        self.inner.current_interval = delay.clamp(self.inner.initial_interval, self.inner.max_interval);
        self.attempts = attempts;
    }
}
