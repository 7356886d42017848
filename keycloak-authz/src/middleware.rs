//! axum adapter enforcing a named policy on a router

use crate::authz::{Caller, Decision, PolicyEvaluator};
use crate::errors::ApiError;
use crate::policy::ProtectedResourcePolicyProvider;
use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use log::{error, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// State of the [`authorize`] middleware: which policy to enforce and how
#[derive(Clone)]
pub struct PolicyGuard {
    provider: Arc<ProtectedResourcePolicyProvider>,
    evaluator: PolicyEvaluator,
    policy: String,
    shutdown: CancellationToken,
}

impl PolicyGuard {
    pub fn new(
        provider: Arc<ProtectedResourcePolicyProvider>,
        evaluator: PolicyEvaluator,
        policy: impl Into<String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            provider,
            evaluator,
            policy: policy.into(),
            shutdown,
        }
    }

    /// Same guard enforcing another policy
    pub fn with_policy(&self, policy: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            ..self.clone()
        }
    }
}

/// Enforce the guard's policy. Use with `axum::middleware::from_fn_with_state`.
///
/// The [`Caller`] is read from the request extensions; a request without one is anonymous.
pub async fn authorize(
    State(guard): State<PolicyGuard>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let policy = match guard.provider.get_policy(&guard.policy).await {
        Ok(Some(policy)) => policy,
        Ok(None) => {
            error!("Authorization policy '{}' is not defined", guard.policy);
            return ApiError::internal("Authorization policy is not configured").into_response();
        }
        Err(err) => {
            error!("Failed to resolve authorization policy: {}", err);
            return ApiError::internal("Authorization policy is not configured").into_response();
        }
    };

    let caller = request
        .extensions()
        .get::<Caller>()
        .cloned()
        .unwrap_or_default();
    let authorization = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let cancel = guard.shutdown.child_token();
    let decision = guard
        .evaluator
        .evaluate(&policy, &caller, authorization.as_deref(), &cancel)
        .await;

    match decision {
        Decision::Allow => next.run(request).await,
        _ if !caller.is_authenticated() => ApiError::unauthorized().into_response(),
        _ => {
            warn!(
                "Request to {} rejected by policy {}",
                request.uri().path(),
                policy.name()
            );
            ApiError::forbidden().into_response()
        }
    }
}
