use crate::authz::{AuthorizationHandler, Caller, PolicyEvaluator};
use crate::config::Settings;
use crate::middleware::PolicyGuard;
use crate::policy::{
    AuthorizationPolicy, PolicyCatalog, PolicyRequirement, ProtectedResourcePolicyProvider,
};
use crate::store::ConfiguredStores;
use crate::token_handler::RealmAdminTokenHandler;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use log::LevelFilter;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Encode `claims` as a JWT with an `alg: none` header and a dummy signature
pub fn unsigned_jwt(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(json!({"alg": "none", "typ": "JWT"}).to_string());
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

/// Test fixture with a mock Keycloak server and the components wired against it.
///
/// The settings hold a single `tenant` realm whose protected resource is `orders-api`,
/// administered by `admin-cli` with the `admin`/`secret` credentials.
pub struct TestFixture {
    /// Mock identity provider
    pub idp: MockServer,
    pub settings: Settings,
    pub stores: Arc<ConfiguredStores>,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::setup_logger(LevelFilter::Debug);

        let idp = MockServer::start().await;
        let settings = Settings::for_test_with_mock(&idp);
        let stores = Arc::new(ConfiguredStores::from(&settings));

        Self {
            idp,
            settings,
            stores,
        }
    }

    pub fn setup_logger(level: LevelFilter) {
        let _ = env_logger::builder()
            .filter_level(level)
            .is_test(true)
            .try_init();
    }

    /// Issuer of tokens minted by the mock realm
    pub fn issuer(&self) -> String {
        format!("{}/realms/tenant", self.idp.uri())
    }

    pub fn http_client(&self) -> reqwest::Client {
        self.settings
            .http
            .build_client()
            .expect("Failed to build HTTP client")
    }

    pub fn token_handler(&self) -> RealmAdminTokenHandler {
        RealmAdminTokenHandler::new(
            self.stores.clone(),
            self.http_client(),
            self.settings.cache.clone(),
        )
        .expect("Failed to create token handler")
    }

    pub fn authorization_handler(&self) -> AuthorizationHandler {
        AuthorizationHandler::new(Arc::new(self.token_handler()), self.http_client())
    }

    pub fn evaluator(&self) -> PolicyEvaluator {
        PolicyEvaluator::new(Arc::new(self.authorization_handler()))
    }

    /// Policy provider with an `admins` policy registered
    pub fn policy_provider(&self) -> ProtectedResourcePolicyProvider {
        let catalog = PolicyCatalog::new().with_policy(AuthorizationPolicy::new(
            "admins",
            vec![
                PolicyRequirement::Authenticated,
                PolicyRequirement::Role("admin".to_string()),
            ],
        ));
        ProtectedResourcePolicyProvider::new(catalog, self.stores.clone())
    }

    pub fn guard(&self, policy: &str) -> PolicyGuard {
        PolicyGuard::new(
            Arc::new(self.policy_provider()),
            self.evaluator(),
            policy,
            CancellationToken::new(),
        )
    }

    /// Authenticated caller of the mock realm and the matching `Authorization` header
    pub fn caller(&self, user_id: &str, session_id: &str) -> (Caller, String) {
        let claims = json!({
            "iss": self.issuer(),
            "sub": user_id,
            "sid": session_id,
            "azp": "orders-web",
        });
        let header = format!("Bearer {}", unsigned_jwt(&claims));
        let claims = claims.as_object().cloned().unwrap_or_default();
        (Caller::authenticated(claims), header)
    }

    /// Password grant for the realm admin
    pub async fn mount_admin_token(&self, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/realms/tenant/protocol/openid-connect/token"))
            .and(body_string_contains("grant_type=password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "admin-access",
                "refresh_token": "admin-refresh",
                "expires_in": 300,
                "refresh_expires_in": 1800,
                "token_type": "Bearer",
            })))
            .expect(expected_calls)
            .mount(&self.idp)
            .await;
    }

    pub async fn mount_user(&self, user_id: &str, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/admin/realms/tenant/users/{}", user_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": user_id,
                "username": "alice",
                "enabled": true,
            })))
            .expect(expected_calls)
            .mount(&self.idp)
            .await;
    }

    pub async fn mount_sessions(&self, user_id: &str, session_ids: &[&str], expected_calls: u64) {
        let sessions: Vec<Value> = session_ids
            .iter()
            .map(|id| json!({"id": id, "userId": user_id, "username": "alice"}))
            .collect();
        Mock::given(method("GET"))
            .and(path(format!("/admin/realms/tenant/users/{}/sessions", user_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(sessions))
            .expect(expected_calls)
            .mount(&self.idp)
            .await;
    }

    /// UMA ticket grant answering with `status`
    pub async fn mount_party_token(&self, status: u16, expected_calls: u64) {
        let response = if status == 200 {
            ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "rpt",
                "expires_in": 300,
                "token_type": "Bearer",
            }))
        } else {
            ResponseTemplate::new(status).set_body_json(json!({
                "error": "access_denied",
                "error_description": "not_authorized",
            }))
        };
        Mock::given(method("POST"))
            .and(path("/realms/tenant/protocol/openid-connect/token"))
            .and(body_string_contains("grant-type%3Auma-ticket"))
            .respond_with(response)
            .expect(expected_calls)
            .mount(&self.idp)
            .await;
    }
}
