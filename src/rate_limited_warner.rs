//! Rate-limited reporting of records truncated by the io timeout.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

/// Default minimum interval between truncation warnings.
pub const DEFAULT_WARN_INTERVAL: Duration = Duration::from_secs(5);

/// Counts events and lets the caller report them at most once per interval.
///
/// Callers bump the counter via [`record_drop`](Self::record_drop). The next
/// [`warn_if_due`](Self::warn_if_due) invokes the callback with the count if
/// the interval has elapsed; [`flush`](Self::flush) reports immediately.
pub struct RateLimitedWarner {
    origin: Instant,
    interval_ms: u64,
    last_warn_ms: AtomicU64,
    dropped: AtomicU64,
}

impl RateLimitedWarner {
    /// The first warning may be emitted immediately.
    pub fn new(interval: Duration) -> Self {
        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        Self {
            origin: Instant::now(),
            interval_ms,
            last_warn_ms: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        // Offset by the interval so the first call is always due.
        let since = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        since.saturating_add(self.interval_ms)
    }

    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of events not yet reported.
    pub fn pending(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn warn_if_due(&self, mut warn: impl FnMut(u64)) {
        let now = self.elapsed_ms();
        let prev = self.last_warn_ms.load(Ordering::Relaxed);
        if now.saturating_sub(prev) >= self.interval_ms {
            let count = self.dropped.swap(0, Ordering::Relaxed);
            if count > 0 {
                warn(count);
            }
            self.last_warn_ms.store(now, Ordering::Relaxed);
        }
    }

    pub fn flush(&self, mut warn: impl FnMut(u64)) {
        let count = self.dropped.swap(0, Ordering::Relaxed);
        if count > 0 {
            warn(count);
            self.last_warn_ms.store(self.elapsed_ms(), Ordering::Relaxed);
        }
    }
}

impl Default for RateLimitedWarner {
    fn default() -> Self {
        Self::new(DEFAULT_WARN_INTERVAL)
    }
}
