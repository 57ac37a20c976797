//! Short-lived security records: refresh sessions and login locks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-side half of a refresh token. Deleting it kills the token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSession {
    pub token_id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

pub const LOCK_REASON_TOO_MANY_ATTEMPTS: &str = "too_many_attempts";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginLock {
    pub until: DateTime<Utc>,
    pub reason: String,
}
