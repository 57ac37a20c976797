//! Store backend configuration.
//!
//! This module selects between the in-process store and Redis, and carries
//! the Redis connection settings loaded from environment variables.

use std::env;

/// Which [`KvStore`](axion_store::KvStore) implementation backs the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
}

impl StoreBackend {
    /// Unknown values fall back to [`StoreBackend::Memory`].
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => Self::Redis,
            _ => Self::Memory,
        }
    }
}

/// Store configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `STORE_BACKEND`: `memory` or `redis` (default: `memory`)
/// - `REDIS_URL`: Redis connection URL (default: `redis://127.0.0.1:6379`)
/// - `CACHE_PREFIX`: Keyspace prefix for document keys (default: `sms`)
#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub backend: StoreBackend,

    /// Redis connection URL.
    pub redis_url: String,

    /// Prefix for document and security keys.
    pub key_prefix: String,
}

impl CacheConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: env::var("STORE_BACKEND")
                .map(|v| StoreBackend::parse(&v))
                .unwrap_or(defaults.backend),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            key_prefix: env::var("CACHE_PREFIX")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.key_prefix),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".into(),
            key_prefix: "sms".into(),
        }
    }
}
