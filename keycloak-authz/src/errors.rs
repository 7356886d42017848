use crate::keycloak::ProviderError;
use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

/// Errors raised by the token handler, the policy provider and the authorization handler
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Failed to retrieve keycloak realm {realm} admin token")]
    IdentityProvider {
        realm: String,
        #[source]
        source: Option<ProviderError>,
    },
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Session closed: {0}")]
    SessionClosed(String),
    #[error("{0} is required")]
    Argument(&'static str),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Invalid bearer token: {0}")]
    InvalidToken(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl AuthzError {
    /// Build an identity provider error for a realm without an underlying provider failure
    pub fn identity_provider<S: ToString>(realm: S) -> Self {
        Self::IdentityProvider {
            realm: realm.to_string(),
            source: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<ProviderError> for AuthzError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Cancelled { .. } => Self::Cancelled,
            other => Self::PermissionDenied(other.to_string()),
        }
    }
}

/// Response body returned by the axum adapter when a request is rejected.
///
/// The detail is always generic: which authorization stage failed is only logged.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub detail: String,
    pub status_code: StatusCode,
}

impl ApiError {
    /// Create a new ApiError with a detail message and status code
    pub fn new<S: ToString>(detail: S, status_code: StatusCode) -> Self {
        Self {
            detail: detail.to_string(),
            status_code,
        }
    }

    /// Create new Unauthorized (401) error
    pub fn unauthorized() -> Self {
        Self::new("Authentication required", StatusCode::UNAUTHORIZED)
    }

    /// Create new Forbidden (403) error
    pub fn forbidden() -> Self {
        Self::new(
            "You are not authorized to access this resource",
            StatusCode::FORBIDDEN,
        )
    }

    /// Create new Internal Server Error (500) with a detail message
    pub fn internal<S: ToString>(detail: S) -> Self {
        Self::new(detail, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code;
        let body = json!({
            "detail": self.detail,
        });
        (status_code, Json(body)).into_response()
    }
}
