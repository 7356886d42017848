use crate::errors::AuthzError;
use log::debug;
use moka::future::Cache as MokaCache;
use std::fmt;

pub mod token;

pub use token::CachedToken;

/// What a cached realm token is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenPurpose {
    Access,
    Refresh,
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => f.write_str("access"),
            Self::Refresh => f.write_str("refresh"),
        }
    }
}

/// Cache key: one live entry per realm and purpose
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub realm: String,
    pub purpose: TokenPurpose,
}

impl TokenKey {
    pub fn access(realm: &str) -> Self {
        Self {
            realm: realm.to_string(),
            purpose: TokenPurpose::Access,
        }
    }

    pub fn refresh(realm: &str) -> Self {
        Self {
            realm: realm.to_string(),
            purpose: TokenPurpose::Refresh,
        }
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_token", self.realm, self.purpose)
    }
}

/// Concurrent, expiry-aware store of realm tokens.
///
/// Backed by a Moka cache so readers and writers for different realms never contend on a
/// single lock. Expiry is evaluated when an entry is read; there is no eviction task.
#[derive(Clone)]
pub struct TokenCache {
    cache: MokaCache<TokenKey, CachedToken>,
}

impl TokenCache {
    /// Create a token cache holding at most `max_entries` tokens
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: MokaCache::builder().max_capacity(max_entries).build(),
        }
    }

    /// Store or replace the token for `key`
    pub async fn put(
        &self,
        key: TokenKey,
        value: &str,
        ttl_secs: i64,
    ) -> Result<(), AuthzError> {
        if key.realm.trim().is_empty() {
            return Err(AuthzError::Argument("realm"));
        }
        if value.trim().is_empty() {
            return Err(AuthzError::Argument("token"));
        }

        debug!("Caching {} for {}s", key, ttl_secs);
        self.cache.insert(key, CachedToken::new(value, ttl_secs)).await;
        Ok(())
    }

    /// Return the cached value for `key` if it is present and not expired
    pub async fn try_get(&self, key: &TokenKey) -> Option<String> {
        match self.cache.get(key).await {
            Some(token) if !token.is_expired() => Some(token.value().to_string()),
            Some(_) => {
                debug!("Cached {} is expired", key);
                None
            }
            None => None,
        }
    }

    #[cfg(test)]
    pub(crate) async fn entry(&self, key: &TokenKey) -> Option<CachedToken> {
        self.cache.get(key).await
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(1024)
    }
}
