//! Monotonic time source used for write deadlines and retry sleeps.

use std::{
    thread,
    time::{Duration, Instant},
};

/// Source of monotonic time and blocking sleeps.
///
/// Senders hold a clock so tests can observe retry sleeps without waiting on
/// the wall clock.
pub trait Clock: Send + Sync {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by [`Instant`] and [`thread::sleep`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// Point in time after which an operation must give up.
///
/// `None` as the limit means the operation may block indefinitely. A budget
/// too large to represent as an [`Instant`] is treated the same way.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Deadline `budget` after `now`, or no deadline when `budget` is `None`.
    pub fn after(now: Instant, budget: Option<Duration>) -> Self {
        Self {
            at: budget.and_then(|b| now.checked_add(b)),
        }
    }

    /// Whether the deadline bounds the operation at all.
    pub fn is_bounded(&self) -> bool {
        self.at.is_some()
    }

    /// Remaining budget at `now`: `None` when unbounded, `Some(ZERO)` once
    /// expired.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(now))
    }
}
