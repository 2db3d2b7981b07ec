//! Time source for the completion poller.

use std::time::{Duration, Instant};

/// Elapsed time and suspension, abstracted so tests can drive the poller
/// without real delays.
pub trait Clock {
    /// Time elapsed since the clock was created.
    fn elapsed(&self) -> Duration;

    /// Suspend the caller for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
