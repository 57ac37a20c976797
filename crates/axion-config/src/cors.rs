use std::env;

use crate::duration::env_bool;

/// Allowed browser origins.
///
/// `CORS_ALLOW_ALL` (default `true`) accepts any origin; otherwise only the
/// comma-separated `CORS_ORIGINS` are allowed.
#[derive(Clone, Debug)]
pub struct CorsConfig {
    pub allow_all: bool,
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn from_env() -> Self {
        let allowed_origins = env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            allow_all: env_bool("CORS_ALLOW_ALL", true),
            allowed_origins,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_all: true,
            allowed_origins: Vec::new(),
        }
    }
}
