use crate::errors::AuthzError;
use crate::store::ProtectedResourceStore;
use std::fmt;
use std::sync::Arc;

/// Fine-grained permission on a protected resource, written `resource#scope`
#[derive(Clone)]
pub struct AuthorizationRequirement {
    resource: String,
    scope: String,
    store: Arc<dyn ProtectedResourceStore>,
}

impl AuthorizationRequirement {
    pub fn new(
        store: Arc<dyn ProtectedResourceStore>,
        resource: impl Into<String>,
        scope: impl Into<String>,
    ) -> Result<Self, AuthzError> {
        let resource = resource.into();
        let scope = scope.into();
        if resource.trim().is_empty() {
            return Err(AuthzError::Argument("resource"));
        }
        if scope.trim().is_empty() {
            return Err(AuthzError::Argument("scope"));
        }
        Ok(Self {
            resource,
            scope,
            store,
        })
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Store used to find the realm's protected resource at decision time
    pub fn store(&self) -> &Arc<dyn ProtectedResourceStore> {
        &self.store
    }
}

impl fmt::Display for AuthorizationRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.resource, self.scope)
    }
}

impl fmt::Debug for AuthorizationRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationRequirement")
            .field("resource", &self.resource)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl PartialEq for AuthorizationRequirement {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource && self.scope == other.scope
    }
}
