use crate::errors::AuthzError;
use serde::Deserialize;
use std::fmt;
use url::Url;

/// Username and password of a realm administrator
#[derive(Clone, Deserialize, PartialEq)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// How to obtain admin tokens for one realm
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RealmAdminConfig {
    /// Keycloak base URL, e.g. `https://sso.example.com/`
    pub base_url: String,
    pub realm: String,
    pub client_id: String,
    /// Only needed for confidential clients
    #[serde(default)]
    pub client_secret: Option<String>,
    pub credentials: AdminCredentials,
}

impl RealmAdminConfig {
    /// Check every required field. Called once when the token handler is built.
    pub fn validate(&self) -> Result<(), AuthzError> {
        if self.base_url.trim().is_empty() {
            return Err(AuthzError::Configuration("base_url is required".to_string()));
        }
        match Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            Ok(_) | Err(_) => {
                return Err(AuthzError::Configuration(format!(
                    "base_url '{}' is not an absolute http(s) URL",
                    self.base_url
                )));
            }
        }
        if self.realm.trim().is_empty() {
            return Err(AuthzError::Configuration("realm is required".to_string()));
        }
        if self.client_id.trim().is_empty() {
            return Err(AuthzError::Configuration(format!(
                "client_id is required for realm {}",
                self.realm
            )));
        }
        if self.credentials.username.trim().is_empty() || self.credentials.password.is_empty() {
            return Err(AuthzError::Configuration(format!(
                "admin credentials are required for realm {}",
                self.realm
            )));
        }
        Ok(())
    }
}
