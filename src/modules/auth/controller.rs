use axion_models::{
    BootstrapSuperadminRequest, CreateSchoolAdminRequest, ListUsersQuery, LoginRequest,
    LogoutRequest, RefreshTokenRequest, UpdateUserRequest, UserIdRequest,
};
use serde_json::json;
use tracing::instrument;

use super::service::AuthService;
use crate::dispatcher::{HandlerInput, HandlerResult, data};

#[instrument(skip_all)]
pub async fn bootstrap_superadmin(service: AuthService, input: HandlerInput) -> HandlerResult {
    let dto: BootstrapSuperadminRequest = input.payload()?;
    data(&service.bootstrap_superadmin(dto).await?)
}

#[instrument(skip_all)]
pub async fn login(service: AuthService, input: HandlerInput) -> HandlerResult {
    let dto: LoginRequest = input.payload()?;
    data(&service.login(dto).await?)
}

#[instrument(skip_all)]
pub async fn refresh_token(service: AuthService, input: HandlerInput) -> HandlerResult {
    let dto: RefreshTokenRequest = input.payload()?;
    data(&service.refresh_token(dto).await?)
}

#[instrument(skip_all)]
pub async fn logout(service: AuthService, input: HandlerInput) -> HandlerResult {
    let dto: LogoutRequest = input.payload()?;
    service.logout(input.auth().as_ref(), dto).await
}

pub async fn me(service: AuthService, input: HandlerInput) -> HandlerResult {
    let user = service.me(input.auth().as_ref()).await?;
    Ok(json!({ "user": data(&user)? }))
}

#[instrument(skip_all)]
pub async fn create_school_admin(service: AuthService, input: HandlerInput) -> HandlerResult {
    let dto: CreateSchoolAdminRequest = input.payload()?;
    let user = service
        .create_school_admin(input.auth().as_ref(), dto)
        .await?;
    Ok(json!({ "user": data(&user)? }))
}

pub async fn list_users(service: AuthService, input: HandlerInput) -> HandlerResult {
    let query: ListUsersQuery = input.query()?;
    let users = service.list_users(input.auth().as_ref(), query).await?;
    Ok(json!({ "users": data(&users)? }))
}

#[instrument(skip_all)]
pub async fn update_user(service: AuthService, input: HandlerInput) -> HandlerResult {
    let dto: UpdateUserRequest = input.payload()?;
    let user = service.update_user(input.auth().as_ref(), dto).await?;
    Ok(json!({ "user": data(&user)? }))
}

#[instrument(skip_all)]
pub async fn delete_user(service: AuthService, input: HandlerInput) -> HandlerResult {
    let dto: UserIdRequest = input.payload()?;
    service.delete_user(input.auth().as_ref(), dto).await
}

#[instrument(skip_all)]
pub async fn revoke_user_tokens(service: AuthService, input: HandlerInput) -> HandlerResult {
    let dto: UserIdRequest = input.payload()?;
    service.revoke_user_tokens(input.auth().as_ref(), dto).await
}
