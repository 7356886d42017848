//! Keycloak REST client covering the token endpoint and the user admin API

use log::{debug, warn};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub mod models;

pub use models::{ClientCredentials, TokenResponse, User, UserSession};

const UMA_TICKET_GRANT: &str = "urn:ietf:params:oauth:grant-type:uma-ticket";

/// Timing and outcome of one request to the identity provider
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMetrics {
    pub method: Method,
    pub url: String,
    /// `None` when no response was received
    pub status: Option<StatusCode>,
    pub elapsed: Duration,
}

/// Successful provider response together with its request metrics
#[derive(Debug, Clone)]
pub struct ProviderResponse<T> {
    pub value: T,
    pub metrics: RequestMetrics,
}

/// Errors that can occur when calling the identity provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Failed to send request to {}: {source}", .metrics.url)]
    Transport {
        #[source]
        source: reqwest::Error,
        metrics: RequestMetrics,
    },
    #[error("{} {} failed with status: {status}", .metrics.method, .metrics.url)]
    Status {
        status: StatusCode,
        body: String,
        metrics: RequestMetrics,
    },
    #[error("Failed to parse response from {}: {source}", .metrics.url)]
    Decode {
        #[source]
        source: serde_json::Error,
        metrics: RequestMetrics,
    },
    #[error("Request to {} was cancelled", .metrics.url)]
    Cancelled { metrics: RequestMetrics },
}

impl ProviderError {
    pub fn metrics(&self) -> &RequestMetrics {
        match self {
            Self::Transport { metrics, .. }
            | Self::Status { metrics, .. }
            | Self::Decode { metrics, .. }
            | Self::Cancelled { metrics } => metrics,
        }
    }

    /// HTTP status of the failed response, if one was received
    pub fn status(&self) -> Option<StatusCode> {
        self.metrics().status
    }
}

/// Keycloak API client
#[derive(Debug, Clone)]
pub struct KeycloakClient {
    client: Client,
    base_url: String,
}

impl KeycloakClient {
    /// Create a new client for the Keycloak server at `base_url`
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn token_endpoint(&self, realm: &str) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.base_url, realm
        )
    }

    fn admin_endpoint(&self, realm: &str, path: &str) -> String {
        format!("{}/admin/realms/{}/{}", self.base_url, realm, path)
    }

    /// Resource owner password grant
    pub async fn resource_owner_password_token(
        &self,
        realm: &str,
        credentials: &ClientCredentials,
        username: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse<TokenResponse>, ProviderError> {
        let mut form = vec![("grant_type", "password".to_string())];
        credentials.append_to(&mut form);
        form.push(("username", username.to_string()));
        form.push(("password", password.to_string()));

        let url = self.token_endpoint(realm);
        self.execute(Method::POST, url, cancel, |req| req.form(&form))
            .await
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh_access_token(
        &self,
        realm: &str,
        credentials: &ClientCredentials,
        refresh_token: &str,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse<TokenResponse>, ProviderError> {
        let mut form = vec![("grant_type", "refresh_token".to_string())];
        credentials.append_to(&mut form);
        form.push(("refresh_token", refresh_token.to_string()));

        let url = self.token_endpoint(realm);
        self.execute(Method::POST, url, cancel, |req| req.form(&form))
            .await
    }

    /// Client credentials grant for confidential clients
    pub async fn client_credentials_token(
        &self,
        realm: &str,
        credentials: &ClientCredentials,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse<TokenResponse>, ProviderError> {
        let mut form = vec![("grant_type", "client_credentials".to_string())];
        credentials.append_to(&mut form);

        let url = self.token_endpoint(realm);
        self.execute(Method::POST, url, cancel, |req| req.form(&form))
            .await
    }

    /// Request a requesting party token (UMA ticket grant) on behalf of `subject_token`.
    ///
    /// Every entry of `permissions` is sent as its own `permission` field, in the
    /// `resource#scope` form. A 403 from the provider means the permission is not granted.
    pub async fn request_party_token(
        &self,
        realm: &str,
        subject_token: &str,
        audience: &str,
        permissions: &[String],
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse<TokenResponse>, ProviderError> {
        let mut form = vec![
            ("grant_type", UMA_TICKET_GRANT.to_string()),
            ("audience", audience.to_string()),
        ];
        form.extend(permissions.iter().map(|p| ("permission", p.clone())));

        let url = self.token_endpoint(realm);
        self.execute(Method::POST, url, cancel, |req| {
            req.bearer_auth(subject_token).form(&form)
        })
        .await
    }

    /// Revoke an access or refresh token
    pub async fn revoke_token(
        &self,
        realm: &str,
        credentials: &ClientCredentials,
        token: &str,
        token_type_hint: &str,
        cancel: &CancellationToken,
    ) -> Result<RequestMetrics, ProviderError> {
        let mut form = vec![
            ("token", token.to_string()),
            ("token_type_hint", token_type_hint.to_string()),
        ];
        credentials.append_to(&mut form);

        let url = format!(
            "{}/realms/{}/protocol/openid-connect/revoke",
            self.base_url, realm
        );
        let (_, metrics) = self
            .send(Method::POST, url, cancel, |req| req.form(&form))
            .await?;
        Ok(metrics)
    }

    /// Fetch a user by id with an admin access token
    pub async fn get_user(
        &self,
        realm: &str,
        admin_token: &str,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse<User>, ProviderError> {
        let url = self.admin_endpoint(realm, &format!("users/{}", user_id));
        self.execute(Method::GET, url, cancel, |req| req.bearer_auth(admin_token))
            .await
    }

    /// List the active sessions of a user with an admin access token
    pub async fn user_sessions(
        &self,
        realm: &str,
        admin_token: &str,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse<Vec<UserSession>>, ProviderError> {
        let url = self.admin_endpoint(realm, &format!("users/{}/sessions", user_id));
        self.execute(Method::GET, url, cancel, |req| req.bearer_auth(admin_token))
            .await
    }

    /// Send a request and decode a JSON response body
    async fn execute<T, F>(
        &self,
        method: Method,
        url: String,
        cancel: &CancellationToken,
        configure: F,
    ) -> Result<ProviderResponse<T>, ProviderError>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let (body, metrics) = self.send(method, url, cancel, configure).await?;
        match serde_json::from_slice(&body) {
            Ok(value) => Ok(ProviderResponse { value, metrics }),
            Err(source) => Err(ProviderError::Decode { source, metrics }),
        }
    }

    /// Send a request, racing it against `cancel`, and return the raw body of a 2xx response
    async fn send<F>(
        &self,
        method: Method,
        url: String,
        cancel: &CancellationToken,
        configure: F,
    ) -> Result<(Vec<u8>, RequestMetrics), ProviderError>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let started = Instant::now();
        let mut metrics = RequestMetrics {
            method: method.clone(),
            url: url.clone(),
            status: None,
            elapsed: Duration::ZERO,
        };
        debug!("Sending {} request to {}", method, url);

        let request = configure(self.client.request(method, &url));
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body.to_vec()))
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = exchange => Some(result),
        };
        metrics.elapsed = started.elapsed();

        let (status, body) = match result {
            None => {
                debug!("{} {} cancelled after {:?}", metrics.method, url, metrics.elapsed);
                return Err(ProviderError::Cancelled { metrics });
            }
            Some(Err(source)) => {
                metrics.status = source.status();
                warn!("{} {} failed: {}", metrics.method, url, source);
                return Err(ProviderError::Transport { source, metrics });
            }
            Some(Ok(exchange)) => exchange,
        };
        metrics.status = Some(status);
        debug!(
            "{} {} returned {} in {:?}",
            metrics.method, url, status, metrics.elapsed
        );

        if !status.is_success() {
            return Err(ProviderError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
                metrics,
            });
        }
        Ok((body, metrics))
    }
}
