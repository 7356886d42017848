//! Keycloak backed authorization for axum services.
//!
//! Realm admin tokens are cached and renewed by [`RealmAdminTokenHandler`]. Policies named
//! `resource#scope` are resolved by [`ProtectedResourcePolicyProvider`] and decided by
//! [`AuthorizationHandler`], which checks the caller's Keycloak session and asks Keycloak
//! for the permission with a UMA ticket grant.

pub mod authz;
pub mod cache;
pub mod config;
pub mod errors;
pub mod keycloak;
pub mod middleware;
pub mod policy;
pub mod store;
pub mod token_handler;

#[cfg(test)]
mod test_utils;

pub use authz::{AuthorizationHandler, Caller, Decision, PolicyEvaluator};
pub use config::Settings;
pub use errors::{ApiError, AuthzError};
pub use middleware::{authorize, PolicyGuard};
pub use policy::{
    AuthorizationPolicy, AuthorizationRequirement, PolicyCatalog, PolicyRequirement,
    ProtectedResourcePolicyProvider,
};
pub use store::{
    ConfiguredStores, ProtectedResourceStore, RealmAdminConfigurationStore,
    RealmProtectedResource,
};
pub use token_handler::{AdminTokenSource, RealmAdminTokenHandler};
