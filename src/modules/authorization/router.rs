use axum::http::Method;

use super::controller::{list_role_permissions, set_role_permissions};
use crate::authorization::AuthorizationEngine;
use crate::dispatcher::{DispatcherBuilder, with_state};
use crate::middleware::{AUTH, AUTHORIZE};

pub const MODULE: &str = "authorization";

pub fn init_authorization_routes(
    builder: DispatcherBuilder,
    engine: AuthorizationEngine,
) -> DispatcherBuilder {
    builder
        .register(
            MODULE,
            Method::GET,
            "v1_listRolePermissions",
            &[AUTH, AUTHORIZE],
            with_state(engine.clone(), list_role_permissions),
        )
        .register(
            MODULE,
            Method::POST,
            "v1_setRolePermissions",
            &[AUTH, AUTHORIZE],
            with_state(engine, set_role_permissions),
        )
}
