//! Rate limiter for periodic log and trace output.

use std::time::{Duration, Instant};

/// A poll-and-fire rate limiter.
///
/// [`Periodic::poll`] returns `true` at most once per interval. The first
/// poll after construction always fires; [`Periodic::reset`] restarts the
/// interval from the given instant so the next fire happens one full
/// interval later.
#[derive(Debug, Clone)]
pub struct Periodic {
    interval: Duration,
    last_fired: Option<Instant>,
}

impl Periodic {
    /// Create a limiter with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: None,
        }
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` when at least one interval has passed since the last
    /// fire (or since [`Periodic::reset`]), recording `now` as the new fire
    /// time.
    pub fn poll(&mut self, now: Instant) -> bool {
        let due = match self.last_fired {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };

        if due {
            self.last_fired = Some(now);
        }

        due
    }

    /// Restart the interval from `now` without firing.
    pub fn reset(&mut self, now: Instant) {
        self.last_fired = Some(now);
    }
}
