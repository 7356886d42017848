use crate::authz::roles::RolesMapper;
use serde_json::{Map, Value};

/// Identity of the caller as established by the authentication layer.
///
/// Inserted into request extensions before the authorization middleware runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Caller {
    authenticated: bool,
    claims: Map<String, Value>,
    roles: Vec<String>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(claims: Map<String, Value>) -> Self {
        Self {
            authenticated: true,
            claims,
            roles: Vec::new(),
        }
    }

    /// Attach the roles `mapper` reads from the caller's claims
    pub fn with_roles(mut self, mapper: &RolesMapper) -> Self {
        self.roles = mapper.roles(&self.claims);
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Non-empty string claim
    pub fn claim(&self, name: &str) -> Option<&str> {
        self.claims
            .get(name)
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// User id (`sub`)
    pub fn subject(&self) -> Option<&str> {
        self.claim("sub")
    }

    /// Session id (`sid`)
    pub fn session_id(&self) -> Option<&str> {
        self.claim("sid")
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
