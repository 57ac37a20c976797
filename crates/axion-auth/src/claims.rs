//! JWT claim structures for access and refresh tokens.
//!
//! Both token kinds carry the same claim set and differ only in `tokenType`
//! and the key that signs them. Claims are camelCase on the wire.

use axion_models::UserRecord;
use serde::{Deserialize, Serialize};

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

fn default_token_version() -> i64 {
    1
}

/// Decoded token payload.
///
/// Every identity field is optional so tokens minted by older deployments
/// still decode; callers decide which absences are fatal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub school_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// `access` or `refresh`; absent on legacy tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default = "default_token_version")]
    pub token_version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Expiration (Unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Issued-at (Unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl TokenClaims {
    pub fn is_access(&self) -> bool {
        self.token_type.as_deref() == Some(TOKEN_TYPE_ACCESS)
    }

    pub fn is_refresh(&self) -> bool {
        self.token_type.as_deref() == Some(TOKEN_TYPE_REFRESH)
    }
}

/// Identity a token is minted for.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSubject {
    pub user_id: String,
    pub role: String,
    pub school_id: Option<String>,
    pub email: Option<String>,
    pub token_version: i64,
}

impl From<&UserRecord> for TokenSubject {
    fn from(user: &UserRecord) -> Self {
        Self {
            user_id: user.id.clone(),
            role: user.role.clone(),
            school_id: user.school_id.clone(),
            email: Some(user.email.clone()),
            token_version: user.token_version,
        }
    }
}

/// A freshly signed token plus the bookkeeping fields callers persist.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    /// Expiration (Unix seconds).
    pub expires_at: i64,
}

/// Unverified header and claim fields, read for revocation bookkeeping.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenMeta {
    pub kid: Option<String>,
    pub alg: String,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
    pub jti: Option<String>,
    pub token_type: Option<String>,
}
