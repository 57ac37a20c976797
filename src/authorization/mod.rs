//! Role-based access control over the persisted role → permission policy.

pub mod engine;

pub use engine::{AuthorizationEngine, POLICY_UPDATE_TOPIC, PolicyError};
