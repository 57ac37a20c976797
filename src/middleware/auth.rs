use std::sync::Arc;

use async_trait::async_trait;
use axion_auth::{TokenClaims, TokenService};
use axion_core::AppError;
use axion_store::DataStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::metrics::track_auth_rejection;
use crate::pipeline::{Middleware, Rejection, RequestContext, StepOutcome, StepResults};

/// Output of the `__auth` step: verified claims plus the presented token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    #[serde(flatten)]
    pub claims: TokenClaims,
    pub raw_token: String,
}

/// Token from the `token` header, else from `Authorization: Bearer`.
pub fn extract_token(ctx: &RequestContext) -> Option<String> {
    if let Some(token) = ctx.header("token") {
        return Some(token.to_string());
    }

    ctx.header("authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Resolves a bearer token into verified claims, checking revocation and
/// the live user record. Every failure is a 401.
pub struct Authenticate {
    store: DataStore,
    tokens: Arc<TokenService>,
}

impl Authenticate {
    pub fn new(store: DataStore, tokens: Arc<TokenService>) -> Self {
        Self { store, tokens }
    }

    fn reject(reason: &'static str) -> StepOutcome {
        debug!(reason, "Authentication rejected");
        track_auth_rejection(reason);
        StepOutcome::Reject(Rejection::unauthorized())
    }

    async fn resolve(&self, ctx: &RequestContext) -> Result<StepOutcome, AppError> {
        let Some(token) = extract_token(ctx) else {
            return Ok(Self::reject("missing_token"));
        };

        let claims = match self
            .tokens
            .verify_access_token(&token)
            .or_else(|_| self.tokens.verify_short_token(&token))
        {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "Token verification failed");
                return Ok(Self::reject("invalid_token"));
            }
        };

        if claims.token_type.is_some() && !claims.is_access() {
            return Ok(Self::reject("wrong_token_type"));
        }

        if let Some(jti) = claims.jti.as_deref() {
            if self.store.is_access_token_revoked(jti).await? {
                return Ok(Self::reject("revoked"));
            }
        }

        if let Some(user_id) = claims.user_id.as_deref() {
            let Some(user) = self.store.get_user(user_id).await? else {
                return Ok(Self::reject("unknown_user"));
            };
            if !user.status.is_active() {
                return Ok(Self::reject("inactive_user"));
            }
            if user.token_version != claims.token_version {
                return Ok(Self::reject("token_version"));
            }
        }

        let context = AuthContext {
            claims,
            raw_token: token,
        };
        Ok(StepOutcome::Next(serde_json::to_value(context)?))
    }
}

#[async_trait]
impl Middleware for Authenticate {
    async fn handle(
        &self,
        ctx: &RequestContext,
        _results: &StepResults,
    ) -> Result<StepOutcome, AppError> {
        match self.resolve(ctx).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(error = %e, "Authentication lookup failed");
                track_auth_rejection("error");
                Ok(StepOutcome::Reject(Rejection::unauthorized()))
            }
        }
    }
}
