//! # Axion Cache
//!
//! Redis backend for the Axion store traits.
//!
//! This crate provides:
//! - [`RedisCache`], implementing both [`KvStore`](axion_store::KvStore) and
//!   [`PubSub`](axion_store::PubSub) over one Redis deployment
//! - [`CacheConfig`], selecting the backend and Redis URL from the environment
//!
//! # Example
//!
//! ```ignore
//! use axion_cache::{CacheConfig, RedisCache};
//!
//! let config = CacheConfig::from_env();
//! let cache = RedisCache::new(&config.redis_url).await?;
//! cache.set("key", "value", Some(60)).await?;
//! ```

pub mod config;
pub mod redis;

pub use config::{CacheConfig, StoreBackend};
pub use redis::{CacheError, RedisCache};
