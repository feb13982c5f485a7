//! Last and next check timestamps, shared with status queries.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use std::time::Duration;

/// When the last cycle ran and when the next scheduled one is due.
#[derive(Debug, Default)]
pub struct CheckClock {
    last: RwLock<Option<DateTime<Utc>>>,
    next: RwLock<Option<DateTime<Utc>>>,
}

impl CheckClock {
    /// Create a clock with nothing recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a cycle ran at `at`.
    pub fn record_check(&self, at: DateTime<Utc>) {
        *self.last.write() = Some(at);
    }

    /// Record that the next scheduled cycle is due `interval` after `from`.
    pub fn schedule_next(&self, from: DateTime<Utc>, interval: Duration) {
        *self.next.write() = TimeDelta::from_std(interval)
            .ok()
            .and_then(|delta| from.checked_add_signed(delta));
    }

    /// Forget the next scheduled cycle.
    pub fn clear_next(&self) {
        *self.next.write() = None;
    }

    /// When the last cycle ran.
    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        *self.last.read()
    }

    /// When the next scheduled cycle is due.
    pub fn next_check(&self) -> Option<DateTime<Utc>> {
        *self.next.read()
    }
}
