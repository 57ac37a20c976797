use std::sync::Arc;

use axion_auth::{TokenService, TokenSubject};
use axion_config::LoginGuardConfig;
use axion_core::permissions::{
    ACTION_CONFIG, RESOURCE_SCHOOL, RESOURCE_USER, ROLE_SCHOOL_ADMIN, ROLE_SUPERADMIN,
};
use axion_core::{hash_password_with_cost, verify_password};
use axion_models::{
    AuditEvent, AuditStatus, AuthTokens, BootstrapSuperadminRequest, CreateSchoolAdminRequest,
    ListUsersQuery, LoginRequest, LogoutRequest, PublicUser, RefreshTokenRequest,
    UpdateUserRequest, UserIdRequest, UserRecord, UserStatus,
};
use axion_store::{AuditSink, DataStore, keys};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use tracing::{info, instrument, warn};

use crate::authorization::AuthorizationEngine;
use crate::dispatcher::Failure;
use crate::metrics::{
    track_tokens_issued, track_user_created, track_user_login_failure, track_user_login_success,
};
use crate::middleware::auth::AuthContext;

pub const LOCKED_MESSAGE: &str = "account temporarily locked. try again later";
const INVALID_CREDENTIALS: &str = "invalid credentials";

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn unauthorized() -> Failure {
    Failure::error("unauthorized")
}

fn forbidden() -> Failure {
    Failure::error("forbidden")
}

fn locked() -> Failure {
    Failure::error(LOCKED_MESSAGE).with_code(423)
}

fn decode_user(doc: Value) -> Result<UserRecord, Failure> {
    serde_json::from_value(doc).map_err(|e| {
        warn!(error = %e, "Stored user does not decode");
        Failure::internal()
    })
}

/// Account lifecycle: bootstrap, login with lockout, token rotation,
/// forced logout, and superadmin user management.
#[derive(Clone)]
pub struct AuthService {
    store: DataStore,
    tokens: Arc<TokenService>,
    engine: AuthorizationEngine,
    guard: LoginGuardConfig,
}

impl AuthService {
    pub fn new(
        store: DataStore,
        tokens: Arc<TokenService>,
        engine: AuthorizationEngine,
        guard: LoginGuardConfig,
    ) -> Self {
        Self {
            store,
            tokens,
            engine,
            guard,
        }
    }

    async fn audit(&self, event: AuditEvent) {
        if let Err(e) = self.store.record_audit_event(event).await {
            warn!(error = %e, "Failed to record audit event");
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, Failure> {
        let Some(user_id) = self.store.get_user_id_by_email(email).await? else {
            return Ok(None);
        };
        Ok(self.store.get_user(&user_id).await?)
    }

    async fn ensure_email_free(&self, email: &str, owner: Option<&str>) -> Result<(), Failure> {
        if let Some(existing) = self.find_user_by_email(email).await? {
            if Some(existing.id.as_str()) != owner {
                return Err(Failure::error("email already in use"));
            }
        }
        Ok(())
    }

    async fn ensure_school_exists(&self, school_id: &str) -> Result<(), Failure> {
        if self.store.get_doc(keys::SCHOOLS, school_id).await?.is_none() {
            return Err(Failure::error("school not found"));
        }
        Ok(())
    }

    fn hash(&self, password: &str) -> Result<String, Failure> {
        Ok(hash_password_with_cost(password, self.guard.salt_rounds)?)
    }

    /// Live user record behind an `__auth` result, if any.
    pub async fn ensure_authenticated_actor(
        &self,
        auth: Option<&AuthContext>,
    ) -> Result<Option<UserRecord>, Failure> {
        let Some(user_id) = auth.and_then(|a| a.claims.user_id.as_deref()) else {
            return Ok(None);
        };
        Ok(self.store.get_user(user_id).await?)
    }

    /// Actor holding global `school:config`.
    pub async fn ensure_superadmin(&self, auth: Option<&AuthContext>) -> Result<UserRecord, Failure> {
        let Some(actor) = self.ensure_authenticated_actor(auth).await? else {
            return Err(unauthorized());
        };

        let granted = self
            .engine
            .has_global_permission(&actor.actor(), RESOURCE_SCHOOL, ACTION_CONFIG)
            .await?;
        if !granted {
            return Err(forbidden());
        }

        Ok(actor)
    }

    /// Signs an access/refresh pair and persists the refresh session.
    async fn issue_tokens(&self, user: &UserRecord) -> Result<AuthTokens, Failure> {
        let subject = TokenSubject::from(user);
        let access = self.tokens.create_access_token(&subject, None)?;
        let refresh = self.tokens.create_refresh_token(&subject, None)?;

        let expires_at = DateTime::<Utc>::from_timestamp(refresh.expires_at, 0).ok_or_else(|| {
            warn!(expires_at = refresh.expires_at, "Refresh expiry out of range");
            Failure::internal()
        })?;
        self.store
            .create_refresh_session(&refresh.jti, &user.id, expires_at)
            .await?;

        track_tokens_issued("access");
        track_tokens_issued("refresh");

        Ok(AuthTokens {
            token: access.token,
            refresh_token: refresh.token,
            user: user.public(),
        })
    }

    async fn count_superadmins(&self) -> Result<usize, Failure> {
        let users: Vec<UserRecord> = self.store.list_typed(keys::USERS).await?;
        Ok(users.iter().filter(|u| u.role == ROLE_SUPERADMIN).count())
    }

    async fn create_user(
        &self,
        email: String,
        password: &str,
        first_name: &str,
        last_name: &str,
        role: &str,
        school_id: Option<&str>,
    ) -> Result<UserRecord, Failure> {
        let doc = json!({
            "email": email,
            "passwordHash": self.hash(password)?,
            "firstName": first_name.trim(),
            "lastName": last_name.trim(),
            "role": role,
            "schoolId": school_id,
            "status": UserStatus::Active,
            "tokenVersion": 1,
        });
        let user = decode_user(self.store.upsert_doc(keys::USERS, None, doc).await?)?;
        self.store.set_user_email_index(&user.email, &user.id).await?;
        track_user_created(role);
        Ok(user)
    }

    #[instrument(skip(self, req), fields(user.email = %req.email))]
    pub async fn bootstrap_superadmin(
        &self,
        req: BootstrapSuperadminRequest,
    ) -> Result<AuthTokens, Failure> {
        if self.count_superadmins().await? > 0 {
            return Err(Failure::error("superadmin already exists. use login."));
        }

        let email = normalize_email(&req.email);
        self.ensure_email_free(&email, None).await?;

        let user = self
            .create_user(email, &req.password, &req.first_name, &req.last_name, ROLE_SUPERADMIN, None)
            .await?;
        info!(user.id = %user.id, "Superadmin bootstrapped");

        self.audit(
            AuditEvent::new("auth.bootstrap_superadmin")
                .actor(Some(user.id.clone()))
                .resource("user", Some(user.id.clone())),
        )
        .await;

        self.issue_tokens(&user).await
    }

    /// Counts a failed attempt and locks the account once the limit is reached.
    async fn register_failure(&self, email: &str, reason: &'static str) -> Result<Failure, Failure> {
        track_user_login_failure(reason);
        let failures = self
            .store
            .register_login_failure(email, self.guard.window_secs)
            .await?;

        if failures >= self.guard.max_failures {
            self.store.set_login_lock(email, self.guard.lock_secs).await?;
            warn!(user.email = %email, failures, "Account locked after repeated failures");
            self.audit(
                AuditEvent::new("auth.login_locked")
                    .resource("user", None)
                    .status(AuditStatus::Failure)
                    .metadata(json!({ "email": email, "failures": failures })),
            )
            .await;
            return Ok(locked());
        }

        Ok(Failure::error(INVALID_CREDENTIALS))
    }

    #[instrument(skip(self, req), fields(user.email = %req.email))]
    pub async fn login(&self, req: LoginRequest) -> Result<AuthTokens, Failure> {
        let email = normalize_email(&req.email);

        if self.store.get_login_lock(&email).await?.is_some() {
            track_user_login_failure("locked");
            return Err(locked());
        }

        let Some(user) = self.find_user_by_email(&email).await? else {
            return Err(self.register_failure(&email, "unknown_user").await?);
        };

        if !user.status.is_active() {
            track_user_login_failure("inactive");
            return Err(Failure::error("account is inactive"));
        }

        let valid = match user.password_hash.as_deref() {
            Some(hash) => verify_password(&req.password, hash)?,
            None => false,
        };
        if !valid {
            return Err(self.register_failure(&email, "bad_password").await?);
        }

        self.store.clear_login_failures(&email).await?;
        self.store.clear_login_lock(&email).await?;

        let tokens = self.issue_tokens(&user).await?;
        track_user_login_success(&user.role);
        info!(user.id = %user.id, "User logged in");

        self.audit(
            AuditEvent::new("auth.login")
                .actor(Some(user.id.clone()))
                .resource("user", Some(user.id.clone())),
        )
        .await;

        Ok(tokens)
    }

    pub async fn me(&self, auth: Option<&AuthContext>) -> Result<PublicUser, Failure> {
        self.ensure_authenticated_actor(auth)
            .await?
            .map(|user| user.public())
            .ok_or_else(unauthorized)
    }

    #[instrument(skip(self, auth, req), fields(school.id = %req.school_id))]
    pub async fn create_school_admin(
        &self,
        auth: Option<&AuthContext>,
        req: CreateSchoolAdminRequest,
    ) -> Result<PublicUser, Failure> {
        let actor = self.ensure_superadmin(auth).await?;
        self.ensure_school_exists(&req.school_id).await?;

        let email = normalize_email(&req.email);
        self.ensure_email_free(&email, None).await?;

        let user = self
            .create_user(
                email,
                &req.password,
                &req.first_name,
                &req.last_name,
                ROLE_SCHOOL_ADMIN,
                Some(req.school_id.trim()),
            )
            .await?;

        self.audit(
            AuditEvent::new("auth.create_school_admin")
                .actor(Some(actor.id))
                .resource("user", Some(user.id.clone()))
                .metadata(json!({ "schoolId": user.school_id })),
        )
        .await;

        Ok(user.public())
    }

    pub async fn list_users(
        &self,
        auth: Option<&AuthContext>,
        query: ListUsersQuery,
    ) -> Result<Vec<PublicUser>, Failure> {
        let Some(actor) = self.ensure_authenticated_actor(auth).await? else {
            return Err(unauthorized());
        };
        let role_filter = query
            .role
            .map(|r| r.trim().to_lowercase())
            .filter(|r| !r.is_empty());

        let mut users: Vec<UserRecord> = self.store.list_typed(keys::USERS).await?;

        let view_all = self
            .engine
            .has_global_permission(&actor.actor(), RESOURCE_USER, ACTION_CONFIG)
            .await?;
        if !view_all {
            let Some(school_id) = actor.school_id.as_deref() else {
                return Err(forbidden());
            };
            if !self
                .engine
                .can_list_users_in_school(&actor.actor(), Some(school_id))
                .await?
            {
                return Err(forbidden());
            }
            users.retain(|u| u.school_id.as_deref() == Some(school_id));
        }

        if let Some(role) = role_filter {
            users.retain(|u| u.role == role);
        }

        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users.iter().map(UserRecord::public).collect())
    }

    /// Partial update of a non-superadmin user. A password or status change
    /// bumps `tokenVersion`, cutting off every outstanding access token.
    #[instrument(skip(self, auth, req), fields(user.id = %req.user_id))]
    pub async fn update_user(
        &self,
        auth: Option<&AuthContext>,
        req: UpdateUserRequest,
    ) -> Result<PublicUser, Failure> {
        let actor = self.ensure_superadmin(auth).await?;

        let Some(target) = self.store.get_user(&req.user_id).await? else {
            return Err(Failure::error("user not found"));
        };
        if target.role == ROLE_SUPERADMIN {
            return Err(Failure::error("cannot update superadmin user"));
        }

        let status = match req.status.as_deref() {
            Some(raw) => Some(UserStatus::parse(raw).ok_or_else(|| {
                Failure::errors(vec![format!(
                    "status must be one of: {}",
                    UserStatus::ALLOWED.join(", ")
                )])
            })?),
            None => None,
        };

        if let Some(school_id) = req.school_id.as_deref() {
            self.ensure_school_exists(school_id.trim()).await?;
        }

        let mut update = Map::new();
        let mut new_email = None;

        if let Some(email) = req.email.as_deref().map(normalize_email) {
            if email != target.email {
                self.ensure_email_free(&email, Some(&target.id)).await?;
                update.insert("email".into(), json!(email));
                new_email = Some(email);
            }
        }
        if let Some(password) = req.password.as_deref() {
            update.insert("passwordHash".into(), json!(self.hash(password)?));
        }
        if let Some(first_name) = req.first_name.as_deref() {
            update.insert("firstName".into(), json!(first_name.trim()));
        }
        if let Some(last_name) = req.last_name.as_deref() {
            update.insert("lastName".into(), json!(last_name.trim()));
        }
        if let Some(status) = status {
            update.insert("status".into(), json!(status));
        }
        if let Some(school_id) = req.school_id.as_deref() {
            update.insert("schoolId".into(), json!(school_id.trim()));
        }

        if update.is_empty() {
            return Err(Failure::error("no update fields provided"));
        }

        let credentials_changed =
            req.password.is_some() || status.is_some_and(|s| s != target.status);
        if credentials_changed {
            update.insert("tokenVersion".into(), json!(target.token_version + 1));
        }

        let updated = decode_user(
            self.store
                .upsert_doc(keys::USERS, Some(&target.id), Value::Object(update))
                .await?,
        )?;

        if let Some(email) = new_email {
            self.store.clear_user_email_index(&target.email).await?;
            self.store.set_user_email_index(&email, &updated.id).await?;
        }

        self.audit(
            AuditEvent::new("auth.update_user")
                .actor(Some(actor.id))
                .resource("user", Some(updated.id.clone()))
                .metadata(json!({ "tokenVersionBumped": credentials_changed })),
        )
        .await;

        Ok(updated.public())
    }

    #[instrument(skip(self, auth, req), fields(user.id = %req.user_id))]
    pub async fn delete_user(
        &self,
        auth: Option<&AuthContext>,
        req: UserIdRequest,
    ) -> Result<Value, Failure> {
        let actor = self.ensure_superadmin(auth).await?;
        if actor.id == req.user_id {
            return Err(Failure::error("cannot delete current user"));
        }

        let Some(target) = self.store.get_user(&req.user_id).await? else {
            return Err(Failure::error("user not found"));
        };
        if target.role == ROLE_SUPERADMIN {
            return Err(Failure::error("cannot delete superadmin user"));
        }

        self.store.delete_doc(keys::USERS, &target.id).await?;
        self.store.clear_user_email_index(&target.email).await?;

        self.audit(
            AuditEvent::new("auth.delete_user")
                .actor(Some(actor.id))
                .resource("user", Some(target.id.clone())),
        )
        .await;

        Ok(json!({ "deleted": { "userId": target.id, "role": target.role } }))
    }

    /// Single-use rotation: the presented refresh session is consumed and a
    /// fresh pair issued.
    #[instrument(skip(self, req))]
    pub async fn refresh_token(&self, req: RefreshTokenRequest) -> Result<AuthTokens, Failure> {
        let claims = self
            .tokens
            .verify_refresh_token(&req.refresh_token)
            .map_err(|_| unauthorized())?;
        if !claims.is_refresh() {
            return Err(unauthorized());
        }
        let (Some(jti), Some(user_id)) = (claims.jti.as_deref(), claims.user_id.as_deref()) else {
            return Err(unauthorized());
        };

        let session = self.store.get_refresh_session(jti).await?;
        if session.is_none_or(|s| s.user_id != user_id) {
            return Err(unauthorized());
        }

        let Some(user) = self.store.get_user(user_id).await? else {
            return Err(unauthorized());
        };
        if !user.status.is_active() || user.token_version != claims.token_version {
            return Err(unauthorized());
        }

        self.store.delete_refresh_session(jti).await?;
        self.issue_tokens(&user).await
    }

    /// Revokes the presented access token and, when given, the caller's
    /// refresh session.
    pub async fn logout(
        &self,
        auth: Option<&AuthContext>,
        req: LogoutRequest,
    ) -> Result<Value, Failure> {
        let Some(auth) = auth else {
            return Err(unauthorized());
        };

        let meta = self.tokens.get_token_meta(&auth.raw_token);
        let jti = auth
            .claims
            .jti
            .clone()
            .or_else(|| meta.as_ref().and_then(|m| m.jti.clone()));
        let exp = auth.claims.exp.or_else(|| meta.as_ref().and_then(|m| m.exp));

        if let Some(jti) = jti {
            let ttl = self.tokens.compute_revocation_ttl_sec(exp);
            self.store.revoke_access_token(&jti, exp, Some(ttl)).await?;
        }

        if let Some(refresh) = req.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            if let Ok(claims) = self.tokens.verify_refresh_token(refresh) {
                if claims.user_id.is_some() && claims.user_id == auth.claims.user_id {
                    if let Some(refresh_jti) = claims.jti.as_deref() {
                        self.store.delete_refresh_session(refresh_jti).await?;
                    }
                }
            }
        }

        info!(user.id = ?auth.claims.user_id, "User logged out");
        Ok(json!({ "logout": true }))
    }

    /// Bumps the target's `tokenVersion`, invalidating every access token
    /// issued to them so far.
    #[instrument(skip(self, auth, req), fields(user.id = %req.user_id))]
    pub async fn revoke_user_tokens(
        &self,
        auth: Option<&AuthContext>,
        req: UserIdRequest,
    ) -> Result<Value, Failure> {
        let actor = self.ensure_superadmin(auth).await?;

        let Some(target) = self.store.get_user(&req.user_id).await? else {
            return Err(Failure::error("user not found"));
        };

        let token_version = target.token_version + 1;
        self.store
            .upsert_doc(
                keys::USERS,
                Some(&target.id),
                json!({ "tokenVersion": token_version }),
            )
            .await?;

        self.audit(
            AuditEvent::new("auth.revoke_user_tokens")
                .actor(Some(actor.id))
                .resource("user", Some(target.id.clone()))
                .metadata(json!({ "tokenVersion": token_version })),
        )
        .await;

        info!(token_version, "User tokens revoked");
        Ok(json!({ "userId": target.id, "tokenVersion": token_version }))
    }
}
