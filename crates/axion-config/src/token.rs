use std::env;

use crate::duration::env_duration;

pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 12 * 60 * 60;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;
pub const DEFAULT_REVOKE_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Signing material and lifetimes for access and refresh tokens.
///
/// # Environment Variables
///
/// - `SHORT_TOKEN_SECRET`: fallback single secret, also the legacy verification key
/// - `ACCESS_TOKEN_KEYS`: key ring spec, `kid:secret` pairs separated by commas
/// - `ACCESS_TOKEN_ACTIVE_KID`: kid used for new access tokens (default: first ring entry)
/// - `ACCESS_TOKEN_EXPIRES_IN`: access token lifetime (default: `12h`)
/// - `REFRESH_TOKEN_SECRET`: refresh signing secret (default: `SHORT_TOKEN_SECRET`)
/// - `REFRESH_TOKEN_EXPIRES_IN`: refresh token lifetime (default: `30d`)
/// - `TOKEN_REVOKE_TTL_SEC`: revocation marker TTL when a token has no usable `exp` (default: 7 days)
#[derive(Clone)]
pub struct TokenConfig {
    pub fallback_secret: Option<String>,
    pub key_ring_spec: String,
    pub active_kid: Option<String>,
    pub access_token_ttl: i64,
    pub refresh_secret: Option<String>,
    pub refresh_token_ttl: i64,
    pub default_revoke_ttl: i64,
}

impl TokenConfig {
    pub fn from_env() -> Self {
        let fallback_secret = non_empty(env::var("SHORT_TOKEN_SECRET").ok());
        let refresh_secret =
            non_empty(env::var("REFRESH_TOKEN_SECRET").ok()).or_else(|| fallback_secret.clone());

        Self {
            fallback_secret,
            key_ring_spec: env::var("ACCESS_TOKEN_KEYS").unwrap_or_default(),
            active_kid: non_empty(env::var("ACCESS_TOKEN_ACTIVE_KID").ok()),
            access_token_ttl: env_duration("ACCESS_TOKEN_EXPIRES_IN", DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_secret,
            refresh_token_ttl: env_duration(
                "REFRESH_TOKEN_EXPIRES_IN",
                DEFAULT_REFRESH_TOKEN_TTL_SECS,
            ),
            default_revoke_ttl: env::var("TOKEN_REVOKE_TTL_SEC")
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .filter(|ttl| *ttl > 0)
                .unwrap_or(DEFAULT_REVOKE_TTL_SECS),
        }
    }

    /// Config with a single shared secret, mostly for tests and local runs.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        let secret = secret.into();
        Self {
            fallback_secret: Some(secret.clone()),
            refresh_secret: Some(secret),
            ..Self::default()
        }
    }

    /// Fails when nothing could sign an access or refresh token.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fallback_secret.is_none() && self.key_ring_spec.trim().is_empty() {
            anyhow::bail!("missing required env variables: SHORT_TOKEN_SECRET");
        }
        if self.refresh_secret.is_none() {
            anyhow::bail!("missing required env variables: REFRESH_TOKEN_SECRET");
        }
        Ok(())
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            fallback_secret: None,
            key_ring_spec: String::new(),
            active_kid: None,
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            refresh_secret: None,
            refresh_token_ttl: DEFAULT_REFRESH_TOKEN_TTL_SECS,
            default_revoke_ttl: DEFAULT_REVOKE_TTL_SECS,
        }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("fallback_secret", &self.fallback_secret.as_ref().map(|_| "<redacted>"))
            .field("key_ring_spec", &"<redacted>")
            .field("active_kid", &self.active_kid)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_secret", &self.refresh_secret.as_ref().map(|_| "<redacted>"))
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("default_revoke_ttl", &self.default_revoke_ttl)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TokenConfig::default();
        assert_eq!(config.access_token_ttl, 43_200);
        assert_eq!(config.refresh_token_ttl, 2_592_000);
        assert_eq!(config.default_revoke_ttl, 604_800);
    }

    #[test]
    fn test_validate_requires_a_secret() {
        assert!(TokenConfig::default().validate().is_err());
        assert!(TokenConfig::with_secret("s3cret").validate().is_ok());
    }

    #[test]
    fn test_key_ring_alone_still_needs_refresh_secret() {
        let config = TokenConfig {
            key_ring_spec: "v1:abc".into(),
            ..TokenConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", TokenConfig::with_secret("super-secret-value"));
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("<redacted>"));
    }
}
