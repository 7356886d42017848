//! Authorization policies and their resolution by name

use std::collections::HashMap;
use std::sync::Arc;

pub mod provider;
pub mod requirement;

pub use provider::ProtectedResourcePolicyProvider;
pub use requirement::AuthorizationRequirement;

/// A single condition of a policy
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyRequirement {
    /// The caller must be authenticated
    Authenticated,
    /// The caller must hold this role
    Role(String),
    /// The caller must be granted `resource#scope` by the identity provider
    ProtectedResource(AuthorizationRequirement),
}

/// Named set of requirements, all of which must succeed
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationPolicy {
    name: String,
    requirements: Vec<PolicyRequirement>,
}

impl AuthorizationPolicy {
    pub fn new(name: impl Into<String>, requirements: Vec<PolicyRequirement>) -> Self {
        Self {
            name: name.into(),
            requirements,
        }
    }

    /// Policy holding a single protected resource requirement, named after it
    pub fn for_requirement(requirement: AuthorizationRequirement) -> Self {
        Self::new(
            requirement.to_string(),
            vec![PolicyRequirement::ProtectedResource(requirement)],
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requirements(&self) -> &[PolicyRequirement] {
        &self.requirements
    }
}

/// Policies registered by the host application before startup
#[derive(Debug, Clone, Default)]
pub struct PolicyCatalog {
    policies: HashMap<String, Arc<AuthorizationPolicy>>,
}

impl PolicyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `policy` under its own name, replacing any previous one
    pub fn with_policy(mut self, policy: AuthorizationPolicy) -> Self {
        self.policies
            .insert(policy.name().to_string(), Arc::new(policy));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<AuthorizationPolicy>> {
        self.policies.get(name).cloned()
    }
}
