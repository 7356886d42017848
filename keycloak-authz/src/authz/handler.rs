use crate::authz::caller::Caller;
use crate::authz::jwt;
use crate::errors::AuthzError;
use crate::keycloak::{KeycloakClient, ProviderError};
use crate::policy::AuthorizationRequirement;
use crate::token_handler::AdminTokenSource;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const BEARER_SCHEME: &str = "Bearer";

/// Outcome of evaluating a requirement for a caller
#[derive(Debug)]
pub enum Decision {
    Allow,
    /// The reason is for logs only and must not reach the caller
    Deny(AuthzError),
    /// The requirement was not evaluated, e.g. for anonymous callers
    Abstain,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decides protected resource requirements against Keycloak.
///
/// For an authenticated caller the issuer realm is read from the bearer token, the caller's
/// Keycloak session is checked with the realm admin token, and the permission is confirmed
/// with a UMA ticket grant. Every failure, cancellation included, is a denial.
pub struct AuthorizationHandler {
    tokens: Arc<dyn AdminTokenSource>,
    http: reqwest::Client,
}

impl AuthorizationHandler {
    pub fn new(tokens: Arc<dyn AdminTokenSource>, http: reqwest::Client) -> Self {
        Self { tokens, http }
    }

    /// Evaluate `requirement` for `caller`.
    ///
    /// `authorization` is the raw `Authorization` header of the request. Its token must have
    /// been verified upstream.
    pub async fn handle(
        &self,
        caller: &Caller,
        authorization: Option<&str>,
        requirement: &AuthorizationRequirement,
        cancel: &CancellationToken,
    ) -> Decision {
        if !caller.is_authenticated() {
            debug!("Skipping {} for unauthenticated caller", requirement);
            return Decision::Abstain;
        }

        match self.check(caller, authorization, requirement, cancel).await {
            Ok(()) => {
                debug!("Access to {} granted", requirement);
                Decision::Allow
            }
            Err(err) => {
                if err.is_cancelled() {
                    info!("Authorization of {} cancelled", requirement);
                } else {
                    warn!("Access to {} denied: {}", requirement, err);
                }
                Decision::Deny(err)
            }
        }
    }

    async fn check(
        &self,
        caller: &Caller,
        authorization: Option<&str>,
        requirement: &AuthorizationRequirement,
        cancel: &CancellationToken,
    ) -> Result<(), AuthzError> {
        let token = bearer_token(authorization)?;
        let (base_url, realm) = jwt::split_issuer(&jwt::issuer(token)?)?;

        let protected = requirement
            .store()
            .protected_resource_for(&realm)
            .ok_or_else(|| {
                AuthzError::PermissionDenied(format!(
                    "realm {} has no protected resource",
                    realm
                ))
            })?;

        let client = KeycloakClient::new(self.http.clone(), &base_url);
        self.validate_session(&client, &realm, caller, cancel)
            .await?;

        let response = client
            .request_party_token(
                &realm,
                token,
                &protected.resource,
                &[requirement.to_string()],
                cancel,
            )
            .await?;
        debug!(
            "Permission {} on {} confirmed in {:?}",
            requirement, protected.resource, response.metrics.elapsed
        );
        Ok(())
    }

    async fn validate_session(
        &self,
        client: &KeycloakClient,
        realm: &str,
        caller: &Caller,
        cancel: &CancellationToken,
    ) -> Result<(), AuthzError> {
        let admin_token = self.tokens.try_get_admin_token(realm, cancel).await?;

        let user_id = caller
            .subject()
            .ok_or_else(|| AuthzError::UserNotFound("unable to extract user subject".to_string()))?;
        client
            .get_user(realm, &admin_token, user_id, cancel)
            .await
            .map_err(|err| match err {
                ProviderError::Cancelled { .. } => AuthzError::Cancelled,
                err => AuthzError::UserNotFound(format!("user {} not found: {}", user_id, err)),
            })?;

        let session_id = caller
            .session_id()
            .ok_or_else(|| AuthzError::SessionClosed("unable to extract session id".to_string()))?;
        let sessions = client
            .user_sessions(realm, &admin_token, user_id, cancel)
            .await
            .map_err(|err| match err {
                ProviderError::Cancelled { .. } => AuthzError::Cancelled,
                err => AuthzError::SessionClosed(format!(
                    "no active session found for user {}: {}",
                    user_id, err
                )),
            })?
            .value;

        if !sessions.iter().any(|session| session.id == session_id) {
            return Err(AuthzError::SessionClosed(format!(
                "session {} not found for user {}",
                session_id, user_id
            )));
        }
        Ok(())
    }
}

/// Token of a `Bearer` authorization header
fn bearer_token(authorization: Option<&str>) -> Result<&str, AuthzError> {
    let header = authorization
        .ok_or_else(|| AuthzError::InvalidToken("missing authorization header".to_string()))?;
    match header.split_once(' ') {
        Some((scheme, token)) if scheme == BEARER_SCHEME && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthzError::InvalidToken(
            "authorization header is not a bearer token".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{unsigned_jwt, TestFixture};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn requirement(fixture: &TestFixture) -> AuthorizationRequirement {
        AuthorizationRequirement::new(fixture.stores.clone(), "Orders", "read").unwrap()
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert!(bearer_token(None).is_err());
        assert!(bearer_token(Some("Basic abc")).is_err());
        assert!(bearer_token(Some("Bearer ")).is_err());
        assert!(bearer_token(Some("Bearer")).is_err());
    }

    #[tokio::test]
    async fn test_unauthenticated_caller_abstains() {
        let fixture = TestFixture::new().await;
        let decision = fixture
            .authorization_handler()
            .handle(
                &Caller::anonymous(),
                None,
                &requirement(&fixture),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(decision, Decision::Abstain));
    }

    #[tokio::test]
    async fn test_allows_active_session_with_granted_permission() {
        let fixture = TestFixture::new().await;
        fixture.mount_admin_token(1).await;
        fixture.mount_user("user-1", 1).await;
        fixture.mount_sessions("user-1", &["sid-0", "sid-1"], 1).await;
        Mock::given(method("POST"))
            .and(path("/realms/tenant/protocol/openid-connect/token"))
            .and(body_string_contains("audience=orders-api"))
            .and(body_string_contains("permission=Orders%23read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "rpt",
                "expires_in": 300,
            })))
            .expect(1)
            .mount(&fixture.idp)
            .await;

        let (caller, header) = fixture.caller("user-1", "sid-1");
        let decision = fixture
            .authorization_handler()
            .handle(
                &caller,
                Some(header.as_str()),
                &requirement(&fixture),
                &CancellationToken::new(),
            )
            .await;
        assert!(decision.is_allowed(), "{:?}", decision);
    }

    #[tokio::test]
    async fn test_denied_permission() {
        let fixture = TestFixture::new().await;
        fixture.mount_admin_token(1).await;
        fixture.mount_user("user-1", 1).await;
        fixture.mount_sessions("user-1", &["sid-1"], 1).await;
        fixture.mount_party_token(403, 1).await;

        let (caller, header) = fixture.caller("user-1", "sid-1");
        let decision = fixture
            .authorization_handler()
            .handle(
                &caller,
                Some(header.as_str()),
                &requirement(&fixture),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(decision, Decision::Deny(AuthzError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_unregistered_realm_denies_without_network_calls() {
        let fixture = TestFixture::new().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&fixture.idp)
            .await;

        let token = unsigned_jwt(&json!({
            "iss": format!("{}/realms/other", fixture.idp.uri()),
            "sub": "user-1",
            "sid": "sid-1",
        }));
        let (caller, _) = fixture.caller("user-1", "sid-1");
        let decision = fixture
            .authorization_handler()
            .handle(
                &caller,
                Some(format!("Bearer {}", token).as_str()),
                &requirement(&fixture),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(decision, Decision::Deny(AuthzError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_closed_session_denies_without_permission_request() {
        let fixture = TestFixture::new().await;
        fixture.mount_admin_token(1).await;
        fixture.mount_user("user-1", 1).await;
        fixture.mount_sessions("user-1", &["sid-other"], 1).await;
        fixture.mount_party_token(200, 0).await;

        let (caller, header) = fixture.caller("user-1", "sid-1");
        let decision = fixture
            .authorization_handler()
            .handle(
                &caller,
                Some(header.as_str()),
                &requirement(&fixture),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(decision, Decision::Deny(AuthzError::SessionClosed(_))));
    }

    #[tokio::test]
    async fn test_no_sessions_denies() {
        let fixture = TestFixture::new().await;
        fixture.mount_admin_token(1).await;
        fixture.mount_user("user-1", 1).await;
        fixture.mount_sessions("user-1", &[], 1).await;
        fixture.mount_party_token(200, 0).await;

        let (caller, header) = fixture.caller("user-1", "sid-1");
        let decision = fixture
            .authorization_handler()
            .handle(
                &caller,
                Some(header.as_str()),
                &requirement(&fixture),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(decision, Decision::Deny(AuthzError::SessionClosed(_))));
    }

    #[tokio::test]
    async fn test_unknown_user_denies() {
        let fixture = TestFixture::new().await;
        fixture.mount_admin_token(1).await;
        Mock::given(method("GET"))
            .and(path("/admin/realms/tenant/users/user-1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&fixture.idp)
            .await;
        fixture.mount_party_token(200, 0).await;

        let (caller, header) = fixture.caller("user-1", "sid-1");
        let decision = fixture
            .authorization_handler()
            .handle(
                &caller,
                Some(header.as_str()),
                &requirement(&fixture),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(decision, Decision::Deny(AuthzError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_non_bearer_header_denies() {
        let fixture = TestFixture::new().await;
        let (caller, _) = fixture.caller("user-1", "sid-1");
        let decision = fixture
            .authorization_handler()
            .handle(
                &caller,
                Some("Basic dXNlcjpwYXNz"),
                &requirement(&fixture),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(decision, Decision::Deny(AuthzError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_cancellation_denies() {
        let fixture = TestFixture::new().await;
        fixture.mount_party_token(200, 0).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (caller, header) = fixture.caller("user-1", "sid-1");
        let decision = fixture
            .authorization_handler()
            .handle(&caller, Some(header.as_str()), &requirement(&fixture), &cancel)
            .await;
        assert!(matches!(decision, Decision::Deny(AuthzError::Cancelled)));
    }
}
