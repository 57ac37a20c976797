use axum::http::Method;

use super::controller::{
    bootstrap_superadmin, create_school_admin, delete_user, list_users, login, logout, me,
    refresh_token, revoke_user_tokens, update_user,
};
use super::service::AuthService;
use crate::dispatcher::{DispatcherBuilder, with_state};
use crate::middleware::{AUTH, AUTHORIZE, QUERY};

pub const MODULE: &str = "auth";

pub fn init_auth_routes(builder: DispatcherBuilder, service: AuthService) -> DispatcherBuilder {
    let s = || service.clone();
    builder
        .register(MODULE, Method::POST, "v1_bootstrapSuperadmin", &[], with_state(s(), bootstrap_superadmin))
        .register(MODULE, Method::POST, "v1_login", &[], with_state(s(), login))
        .register(MODULE, Method::POST, "v1_refreshToken", &[], with_state(s(), refresh_token))
        .register(MODULE, Method::POST, "v1_logout", &[AUTH], with_state(s(), logout))
        .register(MODULE, Method::GET, "v1_me", &[AUTH, AUTHORIZE], with_state(s(), me))
        .register(
            MODULE,
            Method::POST,
            "v1_createSchoolAdmin",
            &[AUTH, AUTHORIZE],
            with_state(s(), create_school_admin),
        )
        .register(
            MODULE,
            Method::GET,
            "v1_listUsers",
            &[AUTH, AUTHORIZE, QUERY],
            with_state(s(), list_users),
        )
        .register(MODULE, Method::PATCH, "v1_updateUser", &[AUTH, AUTHORIZE], with_state(s(), update_user))
        .register(MODULE, Method::DELETE, "v1_deleteUser", &[AUTH, AUTHORIZE], with_state(s(), delete_user))
        .register(
            MODULE,
            Method::POST,
            "v1_revokeUserTokens",
            &[AUTH, AUTHORIZE],
            with_state(s(), revoke_user_tokens),
        )
}
