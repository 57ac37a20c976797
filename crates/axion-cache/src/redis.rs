//! Redis-backed [`KvStore`] and [`PubSub`].
//!
//! Commands go through a shared [`ConnectionManager`], which reconnects on
//! its own. Subscriptions open a dedicated pub/sub connection per topic and
//! forward messages into an mpsc channel from a background task.

use async_trait::async_trait;
use axion_store::{KvStore, PubSub, StoreError, Subscription};
use futures_util::StreamExt;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

/// Redis client implementing the store traits.
#[derive(Clone)]
pub struct RedisCache {
    client: Client,
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

/// Error type for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis connection error: {0}")]
    Connection(#[from] redis::RedisError),
}

impl From<CacheError> for StoreError {
    fn from(err: CacheError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

fn backend(err: redis::RedisError) -> StoreError {
    CacheError::from(err).into()
}

impl RedisCache {
    /// Connects to `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Connection` if the URL is invalid or the server is unreachable.
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client.clone()).await?;

        Ok(Self { client, conn })
    }
}

#[async_trait]
impl KvStore for RedisCache {
    #[instrument(skip(self), fields(cache.operation = "GET"))]
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.map_err(backend)?;
        debug!(cache.key = %key, cache.hit = value.is_some(), "Cache get");
        Ok(value)
    }

    #[instrument(skip(self, value), fields(cache.operation = "SET"))]
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        match ttl_secs {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl.max(1)).await,
            None => conn.set::<_, _, ()>(key, value).await,
        }
        .map_err(backend)
    }

    #[instrument(skip(self), fields(cache.operation = "DEL"))]
    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await.map_err(backend)?;
        Ok(removed > 0)
    }

    #[instrument(skip(self), fields(cache.operation = "EXISTS"))]
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(backend)
    }

    #[instrument(skip(self), fields(cache.operation = "EXPIRE"))]
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        conn.expire(key, ttl_secs as i64).await.map_err(backend)
    }

    #[instrument(skip(self), fields(cache.operation = "INCRBY"))]
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        conn.incr(key, delta).await.map_err(backend)
    }

    #[instrument(skip(self), fields(cache.operation = "HINCRBY"))]
    async fn hash_incr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        conn.hincr(key, field, delta).await.map_err(backend)
    }

    #[instrument(skip(self, members), fields(cache.operation = "SADD"))]
    async fn set_add(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(key, members.to_vec())
            .await
            .map_err(backend)
    }

    #[instrument(skip(self, members), fields(cache.operation = "SREM"))]
    async fn set_remove(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(key, members.to_vec())
            .await
            .map_err(backend)
    }

    #[instrument(skip(self), fields(cache.operation = "SMEMBERS"))]
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let mut members: Vec<String> = conn.smembers(key).await.map_err(backend)?;
        members.sort();
        Ok(members)
    }
}

#[async_trait]
impl PubSub for RedisCache {
    #[instrument(skip(self, payload), fields(cache.operation = "PUBLISH"))]
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(topic, payload)
            .await
            .map_err(backend)
    }

    #[instrument(skip(self), fields(cache.operation = "SUBSCRIBE"))]
    async fn subscribe(&self, topic: &str) -> Result<Subscription, StoreError> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(backend)?;
        pubsub.subscribe(topic).await.map_err(backend)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let topic = topic.to_string();
        tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            while let Some(msg) = messages.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(cache.topic = %topic, error = %e, "Dropping undecodable message");
                        continue;
                    }
                };
                if tx.send(payload).is_err() {
                    break;
                }
            }
            debug!(cache.topic = %topic, "Subscription ended");
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Integration tests require a running Redis instance

    fn unique(name: &str) -> String {
        format!("axion-test:{}:{}", name, uuid::Uuid::new_v4())
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_set_get_delete() {
        let cache = RedisCache::new("redis://localhost:6379").await.unwrap();
        let key = unique("kv");

        cache.set(&key, "value", Some(60)).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("value"));
        assert!(cache.delete(&key).await.unwrap());
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_hash_counter_and_sets() {
        let cache = RedisCache::new("redis://localhost:6379").await.unwrap();
        let hash = unique("hash");
        let set = unique("set");

        assert_eq!(cache.hash_incr_by(&hash, "count", 1).await.unwrap(), 1);
        assert_eq!(cache.hash_incr_by(&hash, "count", 1).await.unwrap(), 2);
        assert!(cache.expire(&hash, 5).await.unwrap());

        cache
            .set_add(&set, &["b".to_string(), "a".to_string()])
            .await
            .unwrap();
        assert_eq!(cache.set_members(&set).await.unwrap(), vec!["a", "b"]);

        cache.delete(&hash).await.unwrap();
        cache.delete(&set).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_publish_reaches_subscriber() {
        let cache = RedisCache::new("redis://localhost:6379").await.unwrap();
        let topic = unique("topic");

        let mut rx = cache.subscribe(&topic).await.unwrap();
        cache.publish(&topic, "hello").await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }
}
