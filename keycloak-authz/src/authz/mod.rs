//! Request time authorization decisions

pub mod caller;
pub mod evaluator;
pub mod handler;
pub mod jwt;
pub mod roles;

pub use caller::Caller;
pub use evaluator::PolicyEvaluator;
pub use handler::{AuthorizationHandler, Decision};
pub use roles::{RolesClaimSource, RolesMapper};
