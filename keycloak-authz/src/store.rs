//! Read-only configuration stores consulted by the token handler and the authorization handler

use crate::config::{RealmAdminConfig, Settings};
use serde::Deserialize;

/// A resource registered for fine-grained authorization in a realm.
///
/// `resource` is the client id used as the audience of the RPT request.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RealmProtectedResource {
    pub realm: String,
    pub resource: String,
}

impl RealmProtectedResource {
    pub fn new(realm: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            resource: resource.into(),
        }
    }
}

/// Source of per-realm admin configurations
pub trait RealmAdminConfigurationStore: Send + Sync {
    fn realms_admin_configuration(&self) -> Vec<RealmAdminConfig>;
}

/// Source of protected resources per realm
pub trait ProtectedResourceStore: Send + Sync {
    fn realm_protected_resources(&self) -> Vec<RealmProtectedResource>;

    /// First resource registered for `realm`
    fn protected_resource_for(&self, realm: &str) -> Option<RealmProtectedResource> {
        self.realm_protected_resources()
            .into_iter()
            .find(|entry| entry.realm == realm)
    }
}

/// Both stores backed by the loaded [`Settings`]
#[derive(Debug, Clone, Default)]
pub struct ConfiguredStores {
    realms: Vec<RealmAdminConfig>,
    protected_resources: Vec<RealmProtectedResource>,
}

impl ConfiguredStores {
    pub fn new(
        realms: Vec<RealmAdminConfig>,
        protected_resources: Vec<RealmProtectedResource>,
    ) -> Self {
        Self {
            realms,
            protected_resources,
        }
    }
}

impl From<&Settings> for ConfiguredStores {
    fn from(settings: &Settings) -> Self {
        Self::new(
            settings.realms.clone(),
            settings.protected_resources.clone(),
        )
    }
}

impl RealmAdminConfigurationStore for ConfiguredStores {
    fn realms_admin_configuration(&self) -> Vec<RealmAdminConfig> {
        self.realms.clone()
    }
}

impl ProtectedResourceStore for ConfiguredStores {
    fn realm_protected_resources(&self) -> Vec<RealmProtectedResource> {
        self.protected_resources.clone()
    }
}
