use std::time::Duration;

use chrono::{DateTime, Utc};

/// Decides when a session has been idle for too long.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiryMonitor {
    ttl: Duration,
}

impl ExpiryMonitor {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Time since `last_update`, or `None` when the timestamp lies in the
    /// future (clock skew between clients).
    pub fn idle(&self, last_update: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
        now.signed_duration_since(last_update).to_std().ok()
    }

    /// Strictly more than the TTL has passed since the last update.
    pub fn is_expired(&self, last_update: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.idle(last_update, now)
            .is_some_and(|idle| idle > self.ttl)
    }
}
