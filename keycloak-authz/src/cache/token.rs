use std::time::Duration;
use tokio::time::Instant;

/// A token value remembered together with the moment it was cached and its lifetime.
///
/// Entries are never mutated: a refresh produces a new `CachedToken` that replaces the
/// previous one in the [`TokenCache`](super::TokenCache).
#[derive(Debug, Clone)]
pub struct CachedToken {
    value: String,
    cached_at: Instant,
    ttl_secs: i64,
}

impl CachedToken {
    /// Create a token cached now, living for `ttl_secs` seconds
    pub fn new(value: impl Into<String>, ttl_secs: i64) -> Self {
        Self {
            value: value.into(),
            cached_at: Instant::now(),
            ttl_secs,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// True once the elapsed time since caching reaches the TTL.
    /// A non-positive TTL is expired from the start.
    pub fn is_expired(&self) -> bool {
        if self.ttl_secs <= 0 {
            return true;
        }
        self.cached_at.elapsed() >= Duration::from_secs(self.ttl_secs.unsigned_abs())
    }
}
