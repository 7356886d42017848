use crate::authz::caller::Caller;
use crate::authz::handler::{AuthorizationHandler, Decision};
use crate::errors::AuthzError;
use crate::policy::{AuthorizationPolicy, PolicyRequirement};
use log::debug;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Evaluates every requirement of a policy for a caller.
///
/// The first denial wins and skips the remaining requirements. The policy is allowed only
/// when every requirement succeeded; otherwise no decision is made.
#[derive(Clone)]
pub struct PolicyEvaluator {
    handler: Arc<AuthorizationHandler>,
}

impl PolicyEvaluator {
    pub fn new(handler: Arc<AuthorizationHandler>) -> Self {
        Self { handler }
    }

    pub async fn evaluate(
        &self,
        policy: &AuthorizationPolicy,
        caller: &Caller,
        authorization: Option<&str>,
        cancel: &CancellationToken,
    ) -> Decision {
        let mut pending = policy.requirements().is_empty();

        for requirement in policy.requirements() {
            let decision = match requirement {
                PolicyRequirement::Authenticated if caller.is_authenticated() => Decision::Allow,
                PolicyRequirement::Authenticated => Decision::Abstain,
                PolicyRequirement::Role(_) if !caller.is_authenticated() => Decision::Abstain,
                PolicyRequirement::Role(role) if caller.has_role(role) => Decision::Allow,
                PolicyRequirement::Role(role) => Decision::Deny(AuthzError::PermissionDenied(
                    format!("missing role {}", role),
                )),
                PolicyRequirement::ProtectedResource(requirement) => {
                    self.handler
                        .handle(caller, authorization, requirement, cancel)
                        .await
                }
            };

            match decision {
                Decision::Allow => {}
                Decision::Abstain => pending = true,
                Decision::Deny(err) => {
                    debug!("Policy {} denied: {}", policy.name(), err);
                    return Decision::Deny(err);
                }
            }
        }

        if pending {
            Decision::Abstain
        } else {
            Decision::Allow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::roles::RolesMapper;
    use crate::policy::AuthorizationRequirement;
    use crate::test_utils::TestFixture;
    use serde_json::json;

    fn admin_caller() -> Caller {
        let claims = json!({
            "sub": "user-1",
            "realm_access": {"roles": ["admin"]},
        });
        Caller::authenticated(claims.as_object().cloned().unwrap()).with_roles(&RolesMapper::realm())
    }

    #[tokio::test]
    async fn test_role_policy() {
        let fixture = TestFixture::new().await;
        let evaluator = fixture.evaluator();
        let cancel = CancellationToken::new();

        let admins = AuthorizationPolicy::new(
            "admins",
            vec![
                PolicyRequirement::Authenticated,
                PolicyRequirement::Role("admin".to_string()),
            ],
        );
        let auditors = AuthorizationPolicy::new(
            "auditors",
            vec![PolicyRequirement::Role("auditor".to_string())],
        );

        assert!(evaluator
            .evaluate(&admins, &admin_caller(), None, &cancel)
            .await
            .is_allowed());
        assert!(matches!(
            evaluator.evaluate(&auditors, &admin_caller(), None, &cancel).await,
            Decision::Deny(AuthzError::PermissionDenied(_))
        ));
        assert!(matches!(
            evaluator.evaluate(&admins, &Caller::anonymous(), None, &cancel).await,
            Decision::Abstain
        ));
    }

    #[tokio::test]
    async fn test_empty_policy_makes_no_decision() {
        let fixture = TestFixture::new().await;
        let policy = AuthorizationPolicy::new("empty", vec![]);
        assert!(matches!(
            fixture
                .evaluator()
                .evaluate(&policy, &admin_caller(), None, &CancellationToken::new())
                .await,
            Decision::Abstain
        ));
    }

    #[tokio::test]
    async fn test_denial_short_circuits_protected_resource_check() {
        let fixture = TestFixture::new().await;
        wiremock::Mock::given(wiremock::matchers::any())
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(0)
            .mount(&fixture.idp)
            .await;

        let requirement =
            AuthorizationRequirement::new(fixture.stores.clone(), "Orders", "read").unwrap();
        let policy = AuthorizationPolicy::new(
            "auditors-reading-orders",
            vec![
                PolicyRequirement::Role("auditor".to_string()),
                PolicyRequirement::ProtectedResource(requirement),
            ],
        );

        let (caller, header) = fixture.caller("user-1", "sid-1");
        let decision = fixture
            .evaluator()
            .evaluate(&policy, &caller, Some(header.as_str()), &CancellationToken::new())
            .await;
        assert!(matches!(decision, Decision::Deny(_)));
    }
}
