use confique::Config;

/// Configuration for the realm token cache
#[derive(Debug, Config, Clone)]
pub struct CacheConfig {
    /// Seconds subtracted from the provider reported lifetime before caching an access token (default: 120)
    #[config(env = "KC_AUTHZ_CACHE_ACCESS_TOKEN_MARGIN", default = 120)]
    pub access_token_margin: i64,

    /// Seconds subtracted from the provider reported lifetime before caching a refresh token (default: 300)
    #[config(env = "KC_AUTHZ_CACHE_REFRESH_TOKEN_MARGIN", default = 300)]
    pub refresh_token_margin: i64,

    /// TTL used when the computed TTL is not positive (default: 60)
    #[config(env = "KC_AUTHZ_CACHE_MIN_TTL", default = 60)]
    pub min_ttl: i64,

    /// Maximum number of cached realm tokens (default: 1024)
    #[config(env = "KC_AUTHZ_CACHE_TOKEN_CAPACITY", default = 1024)]
    pub token_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            access_token_margin: 120,
            refresh_token_margin: 300,
            min_ttl: 60,
            token_capacity: 1024,
        }
    }
}

impl CacheConfig {
    /// TTL for an access token the provider says lives `expires_in` seconds
    pub fn access_ttl(&self, expires_in: i64) -> i64 {
        self.clamp(expires_in.saturating_sub(self.access_token_margin))
    }

    /// TTL for a refresh token issued alongside an access token living `expires_in` seconds
    pub fn refresh_ttl(&self, expires_in: i64) -> i64 {
        self.clamp(expires_in.saturating_sub(self.refresh_token_margin))
    }

    fn clamp(&self, ttl: i64) -> i64 {
        if ttl <= 0 {
            self.min_ttl.max(1)
        } else {
            ttl
        }
    }
}
