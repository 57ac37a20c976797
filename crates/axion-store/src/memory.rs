//! In-memory implementations of [`KvStore`] and [`PubSub`].
//!
//! State lives in `HashMap`s behind `tokio::sync::RwLock`, so a single
//! instance can be cloned into many tasks. Nothing is durable and nothing
//! is shared across processes. Expiry is evaluated lazily against the
//! injected [`Clock`], which lets tests move time forward deterministically.
//! Keys that are never read again are dropped by [`MemoryKv::purge_expired`],
//! run periodically by [`MemoryKv::spawn_sweeper`].

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use axion_core::clock::{Clock, SystemClock};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::StoreError;
use crate::kv::{KvStore, PubSub, Subscription};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, i64>),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at_ms: Option<i64>,
}

impl Entry {
    fn live(&self, now_ms: i64) -> bool {
        self.expires_at_ms.is_none_or(|at| at > now_ms)
    }
}

type Entries = RwLock<HashMap<String, Entry>>;

#[derive(Clone)]
pub struct MemoryKv {
    entries: Arc<Entries>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MemoryKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKv").finish_non_exhaustive()
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryKv {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Removes every expired entry and returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        purge(&self.entries, self.clock.now_millis()).await
    }

    /// Purges expired entries every `period` until the last clone of this
    /// store is dropped.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let entries: Weak<Entries> = Arc::downgrade(&self.entries);
        let clock = self.clock.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(entries) = entries.upgrade() else {
                    break;
                };
                let removed = purge(&entries, clock.now_millis()).await;
                if removed > 0 {
                    debug!(removed, "Purged expired in-memory keys");
                }
            }
        })
    }

    fn deadline(&self, ttl_secs: Option<u64>) -> Option<i64> {
        ttl_secs.map(|ttl| self.clock.now_millis() + (ttl as i64) * 1000)
    }

    /// Drops the entry when it has expired, then returns a mutable handle to whatever is left.
    fn live_entry<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
        now_ms: i64,
    ) -> Option<&'a mut Entry> {
        if entries.get(key).is_some_and(|e| !e.live(now_ms)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }
}

async fn purge(entries: &Entries, now_ms: i64) -> usize {
    let mut entries = entries.write().await;
    let before = entries.len();
    entries.retain(|_, entry| entry.live(now_ms));
    before - entries.len()
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now_millis();
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.live(now) => match &entry.value {
                Value::Str(s) => Ok(Some(s.clone())),
                Value::Hash(_) | Value::Set(_) => Err(StoreError::WrongType(key.to_string())),
            },
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError> {
        let expires_at_ms = self.deadline(ttl_secs);
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = self.clock.now_millis();
        let removed = self.entries.write().await.remove(key);
        Ok(removed.is_some_and(|e| e.live(now)))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let now = self.clock.now_millis();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .is_some_and(|e| e.live(now)))
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let now = self.clock.now_millis();
        let deadline = self.deadline(Some(ttl_secs));
        let mut entries = self.entries.write().await;
        match Self::live_entry(&mut entries, key, now) {
            Some(entry) => {
                entry.expires_at_ms = deadline;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.write().await;
        let next = match Self::live_entry(&mut entries, key, now) {
            Some(entry) => match &mut entry.value {
                Value::Str(current) => {
                    let parsed: i64 = current
                        .parse()
                        .map_err(|_| StoreError::WrongType(key.to_string()))?;
                    let next = parsed + delta;
                    *current = next.to_string();
                    next
                }
                _ => return Err(StoreError::WrongType(key.to_string())),
            },
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Str(delta.to_string()),
                        expires_at_ms: None,
                    },
                );
                delta
            }
        };
        Ok(next)
    }

    async fn hash_incr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.write().await;
        if Self::live_entry(&mut entries, key, now).is_none() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Hash(HashMap::new()),
                    expires_at_ms: None,
                },
            );
        }
        match entries.get_mut(key).map(|e| &mut e.value) {
            Some(Value::Hash(fields)) => {
                let counter = fields.entry(field.to_string()).or_insert(0);
                *counter += delta;
                Ok(*counter)
            }
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.write().await;
        if Self::live_entry(&mut entries, key, now).is_none() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Set(BTreeSet::new()),
                    expires_at_ms: None,
                },
            );
        }
        match entries.get_mut(key).map(|e| &mut e.value) {
            Some(Value::Set(set)) => {
                set.extend(members.iter().cloned());
                Ok(())
            }
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.write().await;
        let Some(entry) = Self::live_entry(&mut entries, key, now) else {
            return Ok(());
        };
        match &mut entry.value {
            Value::Set(set) => {
                for member in members {
                    set.remove(member);
                }
                if set.is_empty() {
                    entries.remove(key);
                }
                Ok(())
            }
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let now = self.clock.now_millis();
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.live(now) => match &entry.value {
                Value::Set(set) => Ok(set.iter().cloned().collect()),
                _ => Err(StoreError::WrongType(key.to_string())),
            },
            _ => Ok(Vec::new()),
        }
    }
}

/// Process-local pub/sub. Clones share the same subscriber table, so two
/// engines built from clones of one bus see each other's messages.
#[derive(Clone, Default)]
pub struct MemoryPubSub {
    subscribers: Arc<RwLock<HashMap<String, Vec<mpsc::UnboundedSender<String>>>>>,
}

impl std::fmt::Debug for MemoryPubSub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPubSub").finish_non_exhaustive()
    }
}

impl MemoryPubSub {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PubSub for MemoryPubSub {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), StoreError> {
        let mut subscribers = self.subscribers.write().await;
        if let Some(senders) = subscribers.get_mut(topic) {
            senders.retain(|tx| tx.send(payload.to_string()).is_ok());
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .write()
            .await
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}
