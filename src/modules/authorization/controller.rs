//! Policy administration: read and replace role permission sets.

use axion_core::permissions::{KNOWN_ROLES, all_permissions, is_known_role};
use axion_models::SetRolePermissionsRequest;
use serde_json::json;
use tracing::instrument;

use crate::authorization::AuthorizationEngine;
use crate::dispatcher::{Failure, HandlerInput, HandlerResult, data};

pub async fn list_role_permissions(
    engine: AuthorizationEngine,
    _input: HandlerInput,
) -> HandlerResult {
    let roles = engine.list_role_permissions().await?;
    Ok(json!({ "roles": data(&roles)? }))
}

#[instrument(skip_all)]
pub async fn set_role_permissions(
    engine: AuthorizationEngine,
    input: HandlerInput,
) -> HandlerResult {
    let dto: SetRolePermissionsRequest = input.payload()?;

    let role = dto
        .role
        .as_deref()
        .map(|r| r.trim().to_lowercase())
        .unwrap_or_default();
    if !role.is_empty() && !is_known_role(&role) {
        return Err(Failure::errors(vec![format!(
            "role must be one of: {}",
            KNOWN_ROLES.join(", ")
        )]));
    }

    let permissions = dto.permissions.unwrap_or_default();
    let known = all_permissions();
    let unknown: Vec<&str> = permissions
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty() && !known.iter().any(|k| k == p))
        .collect();
    if !unknown.is_empty() {
        return Err(Failure::errors(vec![format!(
            "unknown permissions: {}",
            unknown.join(", ")
        )]));
    }

    let actor_id = input.auth().and_then(|auth| auth.claims.user_id);
    let write = engine
        .set_role_permissions(&role, &permissions, actor_id.as_deref())
        .await?;
    data(&write)
}
