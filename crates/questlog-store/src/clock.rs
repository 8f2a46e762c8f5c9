//! Millisecond timestamps for records, items and migration bookkeeping.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> Timestamp;
}

/// Wall clock backed by `chrono::Utc::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Timestamp {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Wraps a clock so that successive readings are strictly increasing.
///
/// Item ids are derived from creation time, so two saves within the same
/// millisecond must still observe distinct timestamps.
pub struct MonotonicClock {
    inner: Arc<dyn Clock>,
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new(inner: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            last: AtomicI64::new(i64::MIN),
        }
    }

    /// Next timestamp: the wall clock, or one past the previous reading if
    /// the wall clock has not moved (or went backwards).
    pub fn tick(&self) -> Timestamp {
        let now = self.inner.now_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = if now > prev { now } else { prev + 1 };
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}
