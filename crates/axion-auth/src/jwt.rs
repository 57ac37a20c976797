//! Token creation and verification.
//!
//! [`TokenService`] signs access tokens with the active key of a
//! [`KeyRing`] (its kid goes into the JWT header) and refresh tokens with a
//! single refresh secret. Verification of access tokens walks the ring so
//! tokens signed under a rotated-out key keep working while that key stays
//! configured, then tries the fallback secret once.
//!
//! # Example
//!
//! ```ignore
//! use axion_auth::{TokenService, TokenSubject};
//! use axion_config::TokenConfig;
//!
//! let tokens = TokenService::new(&TokenConfig::from_env(), clock);
//! let issued = tokens.create_access_token(&TokenSubject::from(&user), None)?;
//! let claims = tokens.verify_access_token(&issued.token)?;
//! ```

use std::sync::Arc;

use axion_config::TokenConfig;
use axion_core::clock::Clock;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
};
use tracing::debug;
use uuid::Uuid;

use crate::claims::{
    IssuedToken, TOKEN_TYPE_ACCESS, TOKEN_TYPE_REFRESH, TokenClaims, TokenMeta, TokenSubject,
};
use crate::error::{TokenError, VerifyError};
use crate::keyring::{KeyRing, build_key_ring};

const MIN_REVOCATION_TTL_SECS: i64 = 60;

#[derive(Clone)]
pub struct TokenService {
    ring: KeyRing,
    fallback_secret: Option<String>,
    refresh_secret: Option<String>,
    access_token_ttl: i64,
    refresh_token_ttl: i64,
    default_revoke_ttl: i64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ring", &self.ring)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish_non_exhaustive()
    }
}

fn new_jti() -> String {
    Uuid::new_v4().to_string()
}

fn verify_with(token: &str, secret: &str) -> Result<TokenClaims, VerifyError> {
    decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(VerifyError::from)
}

impl TokenService {
    pub fn new(config: &TokenConfig, clock: Arc<dyn Clock>) -> Self {
        let keys = build_key_ring(&config.key_ring_spec, config.fallback_secret.as_deref());
        Self {
            ring: KeyRing::new(keys, config.active_kid.as_deref()),
            fallback_secret: config.fallback_secret.clone(),
            refresh_secret: config.refresh_secret.clone(),
            access_token_ttl: config.access_token_ttl,
            refresh_token_ttl: config.refresh_token_ttl,
            default_revoke_ttl: config.default_revoke_ttl,
            clock,
        }
    }

    pub fn key_ring(&self) -> &KeyRing {
        &self.ring
    }

    fn claims_for(
        &self,
        subject: &TokenSubject,
        token_type: &str,
        jti: String,
        ttl: i64,
    ) -> TokenClaims {
        let now = self.clock.now_secs();
        TokenClaims {
            user_id: Some(subject.user_id.clone()),
            role: Some(subject.role.clone()),
            school_id: subject.school_id.clone(),
            email: subject.email.clone(),
            token_type: Some(token_type.to_string()),
            token_version: subject.token_version,
            jti: Some(jti),
            exp: Some(now + ttl),
            iat: Some(now),
        }
    }

    /// Signs an access token with the active key. A fresh `jti` is generated when none is given.
    pub fn create_access_token(
        &self,
        subject: &TokenSubject,
        jti: Option<&str>,
    ) -> Result<IssuedToken, TokenError> {
        let key = self.ring.active().ok_or(TokenError::MissingSigningKey)?;
        let jti = jti.map(str::to_string).unwrap_or_else(new_jti);
        let claims = self.claims_for(subject, TOKEN_TYPE_ACCESS, jti.clone(), self.access_token_ttl);

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(key.kid.clone());

        let token = encode(
            &header,
            &claims,
            &EncodingKey::from_secret(key.secret.as_bytes()),
        )?;

        Ok(IssuedToken {
            token,
            jti,
            expires_at: claims.exp.unwrap_or_default(),
        })
    }

    /// Signs a refresh token with the refresh secret. `token_id` becomes the `jti`.
    pub fn create_refresh_token(
        &self,
        subject: &TokenSubject,
        token_id: Option<&str>,
    ) -> Result<IssuedToken, TokenError> {
        let secret = self
            .refresh_secret
            .as_deref()
            .ok_or(TokenError::MissingRefreshSecret)?;
        let jti = token_id.map(str::to_string).unwrap_or_else(new_jti);
        let claims =
            self.claims_for(subject, TOKEN_TYPE_REFRESH, jti.clone(), self.refresh_token_ttl);

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;

        Ok(IssuedToken {
            token,
            jti,
            expires_at: claims.exp.unwrap_or_default(),
        })
    }

    /// Verifies against the header's kid first, then every other ring key,
    /// then the fallback secret.
    pub fn verify_access_token(&self, token: &str) -> Result<TokenClaims, VerifyError> {
        let header = decode_header(token).map_err(|_| VerifyError::Malformed)?;
        let mut last_error = VerifyError::NoKey;

        for key in self.ring.candidates(header.kid.as_deref()) {
            match verify_with(token, &key.secret) {
                Ok(claims) => return Ok(claims),
                Err(err) => last_error = pick_error(last_error, err),
            }
        }

        match self.verify_short_token(token) {
            Ok(claims) => Ok(claims),
            Err(VerifyError::NoKey) => Err(last_error),
            Err(err) => {
                let err = pick_error(last_error, err);
                debug!(token.kid = ?header.kid, reason = %err, "Access token rejected");
                Err(err)
            }
        }
    }

    /// Single-secret verification with the fallback secret.
    pub fn verify_short_token(&self, token: &str) -> Result<TokenClaims, VerifyError> {
        let secret = self.fallback_secret.as_deref().ok_or(VerifyError::NoKey)?;
        verify_with(token, secret)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<TokenClaims, VerifyError> {
        let secret = self.refresh_secret.as_deref().ok_or(VerifyError::NoKey)?;
        verify_with(token, secret)
    }

    /// Reads header and claims without checking the signature or expiry.
    pub fn get_token_meta(&self, token: &str) -> Option<TokenMeta> {
        let header = decode_header(token).ok()?;

        let mut validation = Validation::new(header.alg);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let claims = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .ok()?
            .claims;

        Some(TokenMeta {
            kid: header.kid,
            alg: format!("{:?}", header.alg),
            exp: claims.exp,
            iat: claims.iat,
            jti: claims.jti,
            token_type: claims.token_type,
        })
    }

    /// Revocation marker lifetime: one minute past `exp`, never below one minute.
    /// Falls back to the configured default when `exp` is missing.
    pub fn compute_revocation_ttl_sec(&self, exp: Option<i64>) -> u64 {
        match exp.filter(|exp| *exp > 0) {
            Some(exp) => {
                let remaining = exp - self.clock.now_secs() + MIN_REVOCATION_TTL_SECS;
                remaining.max(MIN_REVOCATION_TTL_SECS) as u64
            }
            None => self.default_revoke_ttl.max(MIN_REVOCATION_TTL_SECS) as u64,
        }
    }
}

/// An expiry seen on any key beats a signature mismatch on another.
fn pick_error(current: VerifyError, next: VerifyError) -> VerifyError {
    match (current, next) {
        (VerifyError::Expired, _) => VerifyError::Expired,
        (_, next) => next,
    }
}
