use confique::Config;
use reqwest::Client;
use std::time::Duration;

/// Configuration for the HTTP client used to reach the identity provider
#[derive(Debug, Config, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds (default: 30)
    #[config(env = "KC_AUTHZ_HTTP_TIMEOUT", default = 30)]
    pub timeout: u64,

    /// Connect timeout in seconds (default: 5)
    #[config(env = "KC_AUTHZ_HTTP_CONNECT_TIMEOUT", default = 5)]
    pub connect_timeout: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            connect_timeout: 5,
        }
    }
}

impl HttpConfig {
    /// Build the shared client for identity provider calls
    pub fn build_client(&self) -> Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(Duration::from_secs(self.timeout))
            .connect_timeout(Duration::from_secs(self.connect_timeout))
            // Keep a few idle connections per identity provider host
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
    }
}
