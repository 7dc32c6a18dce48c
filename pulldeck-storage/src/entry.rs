//! Cache entry envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A persisted cache entry: payload plus expiration metadata.
///
/// Immutable once written; updates replace the whole entry. An entry is
/// expired iff strictly more than `ttl` has elapsed since `written_at`,
/// evaluated against the wall clock at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub written_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    /// Wrap a payload with the current wall-clock write timestamp.
    pub fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            written_at: Utc::now(),
            ttl,
        }
    }

    /// Whether the entry is expired as of `now`. Strict: an entry exactly
    /// `ttl` old is still live.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let elapsed = now
            .signed_duration_since(self.written_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        elapsed > self.ttl
    }

    /// Whether the entry is expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
