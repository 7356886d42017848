use serde_json::{Map, Value};

/// Where role names are read from in a Keycloak access token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RolesClaimSource {
    /// Roles are not mapped
    #[default]
    None,
    /// `realm_access.roles`
    Realm,
    /// `resource_access.{audience}.roles`
    ResourceAccess,
}

/// Maps token claims to role names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RolesMapper {
    pub source: RolesClaimSource,
    /// Client whose roles are read when the source is [`RolesClaimSource::ResourceAccess`]
    pub audience: Option<String>,
}

impl RolesMapper {
    pub fn realm() -> Self {
        Self {
            source: RolesClaimSource::Realm,
            audience: None,
        }
    }

    pub fn resource_access(audience: impl Into<String>) -> Self {
        Self {
            source: RolesClaimSource::ResourceAccess,
            audience: Some(audience.into()),
        }
    }

    pub fn roles(&self, claims: &Map<String, Value>) -> Vec<String> {
        let roles = match (self.source, self.audience.as_deref()) {
            (RolesClaimSource::Realm, _) => claims.get("realm_access"),
            (RolesClaimSource::ResourceAccess, Some(audience)) => claims
                .get("resource_access")
                .and_then(|access| access.get(audience)),
            _ => None,
        };

        roles
            .and_then(|container| container.get("roles"))
            .and_then(Value::as_array)
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|role| !role.trim().is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
