pub use crate::config::cache::CacheConfig;
pub use crate::config::http::HttpConfig;
pub use crate::config::realm::{AdminCredentials, RealmAdminConfig};
use crate::errors::AuthzError;
use crate::store::RealmProtectedResource;
use confique::Config;
use std::path::Path;

pub mod cache;
pub mod http;
pub mod realm;

/// Top level configuration of the authorization layer
#[derive(Debug, Config, Clone, Default)]
pub struct Settings {
    /// HTTP client configuration
    #[config(nested)]
    pub http: HttpConfig,

    /// Token and policy cache configuration
    #[config(nested)]
    pub cache: CacheConfig,

    /// Admin configuration of every realm served by this process (file only)
    #[config(default = [])]
    pub realms: Vec<RealmAdminConfig>,

    /// Protected resources registered for fine-grained authorization (file only)
    #[config(default = [])]
    pub protected_resources: Vec<RealmProtectedResource>,
}

impl Settings {
    /// Load settings from `KC_AUTHZ_*` environment variables only
    pub fn from_env() -> Result<Self, AuthzError> {
        Settings::builder()
            .env()
            .load()
            .map_err(|e| AuthzError::Configuration(e.to_string()))
    }

    /// Load settings from a TOML file; environment variables take precedence
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthzError> {
        Settings::builder()
            .env()
            .file(path.as_ref())
            .load()
            .map_err(|e| AuthzError::Configuration(e.to_string()))
    }

    /// Validate every realm admin configuration, failing on the first invalid one
    pub fn validate(&self) -> Result<(), AuthzError> {
        self.realms.iter().try_for_each(RealmAdminConfig::validate)
    }

    /// Settings with a single `tenant` realm served by a mock identity provider
    #[cfg(test)]
    pub fn for_test_with_mock(idp: &wiremock::MockServer) -> Self {
        Self {
            realms: vec![RealmAdminConfig {
                base_url: idp.uri(),
                realm: "tenant".to_string(),
                client_id: "admin-cli".to_string(),
                client_secret: None,
                credentials: AdminCredentials {
                    username: "admin".to_string(),
                    password: "secret".to_string(),
                },
            }],
            protected_resources: vec![RealmProtectedResource::new("tenant", "orders-api")],
            ..Default::default()
        }
    }
}
