use crate::errors::AuthzError;
use crate::policy::{AuthorizationPolicy, AuthorizationRequirement, PolicyCatalog};
use crate::store::ProtectedResourceStore;
use log::debug;
use moka::future::Cache as MokaCache;
use std::sync::Arc;

const SEPARATOR: char = '#';

/// Resolves policy names to policies.
///
/// Names registered in the [`PolicyCatalog`] win unless they contain `#`. Any other name of
/// the form `resource#scope` resolves to a single requirement policy that is built once and
/// then shared by every later lookup of the same name.
pub struct ProtectedResourcePolicyProvider {
    catalog: PolicyCatalog,
    store: Arc<dyn ProtectedResourceStore>,
    policies: MokaCache<String, Arc<AuthorizationPolicy>>,
}

impl ProtectedResourcePolicyProvider {
    pub fn new(catalog: PolicyCatalog, store: Arc<dyn ProtectedResourceStore>) -> Self {
        Self {
            catalog,
            store,
            // Unbounded: an evicted name would resolve to a different policy instance
            policies: MokaCache::builder().build(),
        }
    }

    /// Look up the policy called `name`.
    ///
    /// Returns `Ok(None)` for names that are neither registered nor a well formed
    /// `resource#scope` pair.
    pub async fn get_policy(
        &self,
        name: &str,
    ) -> Result<Option<Arc<AuthorizationPolicy>>, AuthzError> {
        if name.trim().is_empty() {
            return Err(AuthzError::Argument("policy_name"));
        }

        if !name.contains(SEPARATOR) {
            if let Some(policy) = self.catalog.get(name) {
                return Ok(Some(policy));
            }
        }

        let (resource, scope) = match name.split(SEPARATOR).collect::<Vec<_>>().as_slice() {
            [resource, scope] if !resource.trim().is_empty() && !scope.trim().is_empty() => {
                (resource.to_string(), scope.to_string())
            }
            _ => {
                debug!("No policy named '{}'", name);
                return Ok(None);
            }
        };

        if let Some(policy) = self.policies.get(name).await {
            return Ok(Some(policy));
        }

        let requirement = AuthorizationRequirement::new(self.store.clone(), resource, scope)?;
        let policy = self
            .policies
            .get_with(name.to_string(), async move {
                debug!("Caching dynamic policy '{}'", requirement);
                Arc::new(AuthorizationPolicy::for_requirement(requirement))
            })
            .await;
        Ok(Some(policy))
    }
}
