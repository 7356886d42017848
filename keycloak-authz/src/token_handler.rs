//! Realm admin token acquisition: cache, then refresh grant, then full password grant

use crate::cache::{TokenCache, TokenKey};
use crate::config::{CacheConfig, RealmAdminConfig};
use crate::errors::AuthzError;
use crate::keycloak::{ClientCredentials, KeycloakClient, ProviderError, TokenResponse};
use crate::store::RealmAdminConfigurationStore;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use moka::future::Cache as MokaCache;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Anything able to hand out an admin access token for a realm
#[async_trait]
pub trait AdminTokenSource: Send + Sync {
    async fn try_get_admin_token(
        &self,
        realm: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AuthzError>;
}

/// Obtains and caches realm admin tokens.
///
/// A fresh cached access token is returned without any network call. Otherwise a cached
/// refresh token is exchanged, and when that is missing or rejected the configured admin
/// credentials are used for a password grant. Tokens are only cached after a successful
/// provider response.
pub struct RealmAdminTokenHandler {
    store: Arc<dyn RealmAdminConfigurationStore>,
    http: reqwest::Client,
    cache: TokenCache,
    config: CacheConfig,
    /// One guard per realm so concurrent misses for a realm share a single provider round trip
    guards: MokaCache<String, Arc<Mutex<()>>>,
}

impl RealmAdminTokenHandler {
    /// Create a handler, validating every realm configuration of `store` up front
    pub fn new(
        store: Arc<dyn RealmAdminConfigurationStore>,
        http: reqwest::Client,
        config: CacheConfig,
    ) -> Result<Self, AuthzError> {
        let realms = store.realms_admin_configuration();
        for realm in &realms {
            realm.validate()?;
        }
        info!(
            "Realm admin token handler ready for {} realm(s)",
            realms.len()
        );

        Ok(Self {
            store,
            http,
            cache: TokenCache::new(config.token_capacity),
            guards: MokaCache::builder()
                .max_capacity(config.token_capacity)
                .build(),
            config,
        })
    }

    fn realm_config(&self, realm: &str) -> Result<RealmAdminConfig, AuthzError> {
        let config = self
            .store
            .realms_admin_configuration()
            .into_iter()
            .find(|config| config.realm == realm)
            .ok_or_else(|| {
                AuthzError::Configuration(format!("realm {} is not configured", realm))
            })?;
        config.validate()?;
        Ok(config)
    }

    async fn cache_tokens(&self, realm: &str, token: TokenResponse) -> Result<String, AuthzError> {
        if token.access_token.is_empty() {
            error!("Keycloak returned an empty access token for realm {}", realm);
            return Err(AuthzError::identity_provider(realm));
        }

        self.cache
            .put(
                TokenKey::access(realm),
                &token.access_token,
                self.config.access_ttl(token.expires_in),
            )
            .await?;
        if let Some(refresh_token) = token.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            self.cache
                .put(
                    TokenKey::refresh(realm),
                    refresh_token,
                    self.config.refresh_ttl(token.expires_in),
                )
                .await?;
        }
        Ok(token.access_token)
    }

    async fn fetch_admin_token(
        &self,
        config: &RealmAdminConfig,
        cancel: &CancellationToken,
    ) -> Result<String, AuthzError> {
        let realm = config.realm.as_str();
        let client = KeycloakClient::new(self.http.clone(), &config.base_url);
        let credentials = ClientCredentials::from(config);

        if let Some(refresh_token) = self.cache.try_get(&TokenKey::refresh(realm)).await {
            debug!("Refreshing admin token for realm {}", realm);
            match client
                .refresh_access_token(realm, &credentials, &refresh_token, cancel)
                .await
            {
                Ok(response) if !response.value.access_token.is_empty() => {
                    return self.cache_tokens(realm, response.value).await
                }
                Ok(_) => warn!(
                    "Refresh grant for realm {} returned no access token, falling back to password grant",
                    realm
                ),
                Err(ProviderError::Cancelled { .. }) => return Err(AuthzError::Cancelled),
                Err(err) => warn!(
                    "Refresh grant for realm {} failed, falling back to password grant: {}",
                    realm, err
                ),
            }
        }

        debug!("Requesting admin token for realm {} with password grant", realm);
        match client
            .resource_owner_password_token(
                realm,
                &credentials,
                &config.credentials.username,
                &config.credentials.password,
                cancel,
            )
            .await
        {
            Ok(response) => self.cache_tokens(realm, response.value).await,
            Err(ProviderError::Cancelled { .. }) => Err(AuthzError::Cancelled),
            Err(err) => {
                error!("Password grant for realm {} failed: {}", realm, err);
                Err(AuthzError::IdentityProvider {
                    realm: realm.to_string(),
                    source: Some(err),
                })
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &TokenCache {
        &self.cache
    }
}

#[async_trait]
impl AdminTokenSource for RealmAdminTokenHandler {
    async fn try_get_admin_token(
        &self,
        realm: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AuthzError> {
        if realm.trim().is_empty() {
            return Err(AuthzError::Argument("realm"));
        }
        if let Some(token) = self.cache.try_get(&TokenKey::access(realm)).await {
            return Ok(token);
        }

        let config = self.realm_config(realm)?;
        let guard = self
            .guards
            .get_with(realm.to_string(), async { Arc::new(Mutex::new(())) })
            .await;
        let _singleflight = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AuthzError::Cancelled),
            held = guard.lock() => held,
        };

        // Another task may have fetched a token while we waited.
        if let Some(token) = self.cache.try_get(&TokenKey::access(realm)).await {
            return Ok(token);
        }
        self.fetch_admin_token(&config, cancel).await
    }
}
