//! Backend-neutral interfaces for the shared key-value store and the
//! publish/subscribe bus.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::StoreError;

/// Keyed scalar, counter, hash-counter, and set operations.
///
/// Values are strings; callers encode documents as JSON. TTLs are in seconds.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Returns false when the key does not exist.
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError>;

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError>;

    async fn hash_incr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError>;

    async fn set_add(&self, key: &str, members: &[String]) -> Result<(), StoreError>;

    async fn set_remove(&self, key: &str, members: &[String]) -> Result<(), StoreError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;
}

/// Messages delivered to one subscriber, in publish order.
pub type Subscription = mpsc::UnboundedReceiver<String>;

#[async_trait]
pub trait PubSub: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), StoreError>;

    async fn subscribe(&self, topic: &str) -> Result<Subscription, StoreError>;
}
