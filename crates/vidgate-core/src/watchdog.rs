//! Cancellable deadline timers
//!
//! A [`Watchdog`] expresses "notify if X has not happened within T". It holds
//! no task and no callback: the owner arms it, cancels it on the qualifying
//! event, and polls it with the current time. The async host sleeps until the
//! earliest armed deadline, so a timer can never fire into a torn-down engine.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Watchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// Arm (or re-arm) the timer relative to `now`
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns true exactly once when the armed deadline has passed, disarming
    /// the timer
    pub fn fire_if_expired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Earliest of several optional deadlines
pub fn earliest(deadlines: impl IntoIterator<Item = Option<Instant>>) -> Option<Instant> {
    deadlines.into_iter().flatten().min()
}
