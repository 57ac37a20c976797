//! Document layer over a [`KvStore`].
//!
//! Documents are JSON objects stored at `<keyspace>:<collection>:<id>`, with
//! the id of every document tracked in a per-collection index set. On top of
//! that sit the security records (revocation markers, login counters and
//! locks, refresh sessions) and the authorization policy documents.

use std::sync::Arc;

use async_trait::async_trait;
use axion_core::clock::Clock;
use axion_models::{
    AuditEvent, LoginLock, RefreshSession, RolePermissions, UserRecord,
    LOCK_REASON_TOO_MANY_ATTEMPTS,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::keys::{self, Keyspace};
use crate::kv::KvStore;
use crate::policy::{AuditSink, PolicyStore};

#[derive(Clone)]
pub struct DataStore {
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    keys: Keyspace,
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore")
            .field("keyspace", &self.keys.prefix())
            .finish_non_exhaustive()
    }
}

/// Removes duplicates and blanks, keeping first-seen order.
pub fn normalize_permissions(permissions: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    permissions
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .filter(|p| seen.insert(p.to_string()))
        .map(str::to_string)
        .collect()
}

impl DataStore {
    pub fn new(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_keyspace(kv, clock, Keyspace::default())
    }

    pub fn with_keyspace(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>, keys: Keyspace) -> Self {
        Self { kv, clock, keys }
    }

    pub fn kv(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    pub fn keys(&self) -> &Keyspace {
        &self.keys
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.clock.now_millis()).unwrap_or_else(Utc::now)
    }

    async fn read_json(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let Some(raw) = self.kv.get(key).await? else {
            return Ok(None);
        };
        if raw == "null" {
            return Ok(None);
        }
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(store.key = %key, error = %e, "Discarding unparseable document");
                Ok(None)
            }
        }
    }

    async fn write_json<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: Option<u64>,
    ) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.kv.set(key, &raw, ttl_secs).await
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Merges `doc` over the previous document (if any) and stamps `_id`,
    /// `createdAt`, and `updatedAt`. A missing id gets a fresh one.
    #[instrument(skip(self, doc), fields(store.collection = %collection))]
    pub async fn upsert_doc(
        &self,
        collection: &str,
        id: Option<&str>,
        doc: Value,
    ) -> Result<Value, StoreError> {
        let Value::Object(fields) = doc else {
            return Err(StoreError::InvalidDocument);
        };

        let id = match id.filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().simple().to_string(),
        };
        let now = Value::String(self.now().to_rfc3339());
        let previous = self.get_doc(collection, &id).await?;

        let mut merged = match previous {
            Some(Value::Object(prev)) => prev,
            _ => Map::new(),
        };
        let created_at = merged.get("createdAt").cloned().unwrap_or_else(|| now.clone());
        merged.extend(fields);
        merged.insert("_id".into(), Value::String(id.clone()));
        merged.insert("createdAt".into(), created_at);
        merged.insert("updatedAt".into(), now);

        let merged = Value::Object(merged);
        self.write_json(&self.keys.doc(collection, &id), &merged, None)
            .await?;
        self.kv
            .set_add(&self.keys.collection_index(collection), &[id])
            .await?;

        Ok(merged)
    }

    pub async fn get_doc(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        if id.is_empty() {
            return Ok(None);
        }
        self.read_json(&self.keys.doc(collection, id)).await
    }

    /// Typed read; a document that does not fit `T` reads as absent.
    pub async fn get_typed<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        Ok(self
            .get_doc(collection, id)
            .await?
            .and_then(|doc| decode(collection, doc)))
    }

    pub async fn list_ids(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        self.kv
            .set_members(&self.keys.collection_index(collection))
            .await
    }

    /// Documents for `ids`, or for the whole collection when `ids` is `None`.
    /// Ids without a document are skipped.
    pub async fn list_docs(
        &self,
        collection: &str,
        ids: Option<&[String]>,
    ) -> Result<Vec<Value>, StoreError> {
        let ids = match ids {
            Some(ids) => ids.to_vec(),
            None => self.list_ids(collection).await?,
        };

        let mut docs = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(doc) = self.get_doc(collection, id).await? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    pub async fn list_typed<T: DeserializeOwned>(
        &self,
        collection: &str,
    ) -> Result<Vec<T>, StoreError> {
        Ok(self
            .list_docs(collection, None)
            .await?
            .into_iter()
            .filter_map(|doc| decode(collection, doc))
            .collect())
    }

    pub async fn delete_doc(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        if id.is_empty() {
            return Ok(false);
        }
        self.kv.delete(&self.keys.doc(collection, id)).await?;
        self.kv
            .set_remove(&self.keys.collection_index(collection), &[id.to_string()])
            .await?;
        Ok(true)
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        self.get_typed(keys::USERS, user_id).await
    }

    pub async fn set_user_email_index(&self, email: &str, user_id: &str) -> Result<(), StoreError> {
        self.kv
            .set(&self.keys.user_email_index(email), user_id, None)
            .await
    }

    pub async fn get_user_id_by_email(&self, email: &str) -> Result<Option<String>, StoreError> {
        if email.is_empty() {
            return Ok(None);
        }
        Ok(self
            .kv
            .get(&self.keys.user_email_index(email))
            .await?
            .filter(|id| !id.is_empty() && id != "null"))
    }

    pub async fn clear_user_email_index(&self, email: &str) -> Result<bool, StoreError> {
        self.kv.delete(&self.keys.user_email_index(email)).await
    }

    // =========================================================================
    // Access token revocation
    // =========================================================================

    /// Marks `jti` revoked. Without an explicit TTL the marker outlives the
    /// token's own expiry by a minute, and never lives less than a minute.
    #[instrument(skip(self))]
    pub async fn revoke_access_token(
        &self,
        jti: &str,
        expires_at_sec: Option<i64>,
        ttl_secs: Option<u64>,
    ) -> Result<(), StoreError> {
        let now = self.clock.now_secs();
        let ttl = match ttl_secs.filter(|ttl| *ttl > 0) {
            Some(ttl) => ttl,
            None => (expires_at_sec.unwrap_or(now) - now + 60).max(60) as u64,
        };
        self.kv
            .set(&self.keys.revoked_access_token(jti), "1", Some(ttl))
            .await
    }

    pub async fn is_access_token_revoked(&self, jti: &str) -> Result<bool, StoreError> {
        if jti.is_empty() {
            return Ok(false);
        }
        self.kv.exists(&self.keys.revoked_access_token(jti)).await
    }

    // =========================================================================
    // Login failures and locks
    // =========================================================================

    /// Counts a failed login; each failure pushes the window out again.
    pub async fn register_login_failure(
        &self,
        email: &str,
        window_secs: u64,
    ) -> Result<u64, StoreError> {
        let key = self.keys.login_failures(email);
        let count = self.kv.hash_incr_by(&key, "count", 1).await?;
        self.kv.expire(&key, window_secs).await?;
        Ok(count.max(0) as u64)
    }

    pub async fn clear_login_failures(&self, email: &str) -> Result<bool, StoreError> {
        self.kv.delete(&self.keys.login_failures(email)).await
    }

    pub async fn set_login_lock(&self, email: &str, lock_secs: u64) -> Result<LoginLock, StoreError> {
        let until = self.now() + chrono::Duration::seconds(lock_secs as i64);
        let lock = LoginLock {
            until,
            reason: LOCK_REASON_TOO_MANY_ATTEMPTS.to_string(),
        };
        self.write_json(&self.keys.login_lock(email), &lock, Some(lock_secs))
            .await?;
        Ok(lock)
    }

    /// Active lock for `email`. A lock whose `until` has passed is cleared and ignored.
    pub async fn get_login_lock(&self, email: &str) -> Result<Option<LoginLock>, StoreError> {
        let Some(raw) = self.read_json(&self.keys.login_lock(email)).await? else {
            return Ok(None);
        };
        let Ok(lock) = serde_json::from_value::<LoginLock>(raw) else {
            return Ok(None);
        };
        if lock.until <= self.now() {
            self.clear_login_lock(email).await?;
            return Ok(None);
        }
        Ok(Some(lock))
    }

    pub async fn clear_login_lock(&self, email: &str) -> Result<bool, StoreError> {
        self.kv.delete(&self.keys.login_lock(email)).await
    }

    // =========================================================================
    // Refresh sessions
    // =========================================================================

    pub async fn create_refresh_session(
        &self,
        token_id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshSession, StoreError> {
        let session = RefreshSession {
            token_id: token_id.to_string(),
            user_id: user_id.to_string(),
            expires_at,
        };
        let ttl = ((expires_at - self.now()).num_seconds()).max(60) as u64;
        self.write_json(&self.keys.refresh_session(token_id), &session, Some(ttl))
            .await?;
        Ok(session)
    }

    pub async fn get_refresh_session(
        &self,
        token_id: &str,
    ) -> Result<Option<RefreshSession>, StoreError> {
        if token_id.is_empty() {
            return Ok(None);
        }
        Ok(self
            .read_json(&self.keys.refresh_session(token_id))
            .await?
            .and_then(|raw| serde_json::from_value(raw).ok()))
    }

    pub async fn delete_refresh_session(&self, token_id: &str) -> Result<bool, StoreError> {
        self.kv.delete(&self.keys.refresh_session(token_id)).await
    }

    /// Liveness probe used by the health endpoint.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.kv.exists("__health__:cache").await.map(|_| ())
    }
}

fn decode<T: DeserializeOwned>(collection: &str, doc: Value) -> Option<T> {
    match serde_json::from_value(doc) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(store.collection = %collection, error = %e, "Document does not match expected shape");
            None
        }
    }
}

#[async_trait]
impl PolicyStore for DataStore {
    async fn list_role_permissions(&self) -> Result<Vec<RolePermissions>, StoreError> {
        self.list_typed(keys::ROLE_PERMISSIONS).await
    }

    async fn get_role_permissions(
        &self,
        role: &str,
    ) -> Result<Option<RolePermissions>, StoreError> {
        self.get_typed(keys::ROLE_PERMISSIONS, role).await
    }

    async fn upsert_role_permissions(
        &self,
        role: &str,
        permissions: &[String],
    ) -> Result<RolePermissions, StoreError> {
        let permissions = normalize_permissions(permissions);
        let doc = serde_json::json!({ "role": role, "permissions": permissions });
        self.upsert_doc(keys::ROLE_PERMISSIONS, Some(role), doc)
            .await?;
        Ok(RolePermissions {
            role: role.to_string(),
            permissions,
        })
    }

    async fn delete_role_permissions(&self, role: &str) -> Result<(), StoreError> {
        self.delete_doc(keys::ROLE_PERMISSIONS, role).await.map(|_| ())
    }

    async fn policy_version(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .kv
            .get(&self.keys.policy_version())
            .await?
            .filter(|v| !v.is_empty()))
    }

    async fn set_policy_version(&self, version: Option<String>) -> Result<String, StoreError> {
        let version = match version.filter(|v| !v.is_empty()) {
            Some(v) => v,
            None => {
                let now = self.clock.now_millis();
                let previous = self
                    .policy_version()
                    .await?
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(0);
                now.max(previous + 1).to_string()
            }
        };
        self.kv
            .set(&self.keys.policy_version(), &version, None)
            .await?;
        Ok(version)
    }
}

#[async_trait]
impl AuditSink for DataStore {
    async fn record_audit_event(&self, event: AuditEvent) -> Result<(), StoreError> {
        let doc = serde_json::to_value(&event)?;
        self.upsert_doc(keys::AUDIT_LOGS, None, doc).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKv;
    use axion_core::clock::ManualClock;
    use serde_json::json;

    fn store() -> (DataStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let kv = Arc::new(MemoryKv::new(clock.clone()));
        (DataStore::new(kv, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_upsert_merges_and_keeps_created_at() {
        let (store, clock) = store();
        let first = store
            .upsert_doc("schools", Some("s1"), json!({"name": "North", "city": "Oslo"}))
            .await
            .unwrap();
        clock.advance_secs(5);
        let second = store
            .upsert_doc("schools", Some("s1"), json!({"name": "South"}))
            .await
            .unwrap();

        assert_eq!(second["_id"], "s1");
        assert_eq!(second["name"], "South");
        assert_eq!(second["city"], "Oslo");
        assert_eq!(second["createdAt"], first["createdAt"]);
        assert_ne!(second["updatedAt"], first["updatedAt"]);
    }

    #[tokio::test]
    async fn test_upsert_generates_id_and_indexes() {
        let (store, _) = store();
        let doc = store
            .upsert_doc("schools", None, json!({"name": "North"}))
            .await
            .unwrap();
        let id = doc["_id"].as_str().unwrap().to_string();
        assert!(!id.is_empty());
        assert_eq!(store.list_ids("schools").await.unwrap(), vec![id.clone()]);

        assert!(store.delete_doc("schools", &id).await.unwrap());
        assert!(store.list_docs("schools", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_rejects_non_objects() {
        let (store, _) = store();
        let err = store.upsert_doc("schools", None, json!([1, 2])).await;
        assert!(matches!(err, Err(StoreError::InvalidDocument)));
    }

    #[tokio::test]
    async fn test_revocation_ttl_floor() {
        let (store, clock) = store();
        let now = clock.now_secs();
        store.revoke_access_token("j1", Some(now - 500), None).await.unwrap();
        assert!(store.is_access_token_revoked("j1").await.unwrap());
        clock.advance_secs(59);
        assert!(store.is_access_token_revoked("j1").await.unwrap());
        clock.advance_secs(1);
        assert!(!store.is_access_token_revoked("j1").await.unwrap());
    }

    #[tokio::test]
    async fn test_login_failures_window_slides() {
        let (store, clock) = store();
        assert_eq!(store.register_login_failure("a@b.co", 10).await.unwrap(), 1);
        clock.advance_secs(8);
        assert_eq!(store.register_login_failure("a@b.co", 10).await.unwrap(), 2);
        clock.advance_secs(8);
        assert_eq!(store.register_login_failure("a@b.co", 10).await.unwrap(), 3);
        clock.advance_secs(10);
        assert_eq!(store.register_login_failure("a@b.co", 10).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_login_lock_expires() {
        let (store, clock) = store();
        let lock = store.set_login_lock("a@b.co", 30).await.unwrap();
        assert_eq!(lock.reason, LOCK_REASON_TOO_MANY_ATTEMPTS);
        assert!(store.get_login_lock("a@b.co").await.unwrap().is_some());
        clock.advance_secs(30);
        assert!(store.get_login_lock("a@b.co").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_session_round_trip() {
        let (store, _) = store();
        let expires_at = store.now() + chrono::Duration::days(30);
        store
            .create_refresh_session("t1", "u1", expires_at)
            .await
            .unwrap();
        let session = store.get_refresh_session("t1").await.unwrap().unwrap();
        assert_eq!(session.user_id, "u1");
        assert!(store.delete_refresh_session("t1").await.unwrap());
        assert!(store.get_refresh_session("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_policy_version_strictly_increases() {
        let (store, _) = store();
        let first: i64 = store.set_policy_version(None).await.unwrap().parse().unwrap();
        let second: i64 = store.set_policy_version(None).await.unwrap().parse().unwrap();
        assert!(second > first);
        assert_eq!(store.policy_version().await.unwrap(), Some(second.to_string()));
    }

    #[tokio::test]
    async fn test_role_permissions_are_deduplicated() {
        let (store, _) = store();
        let stored = store
            .upsert_role_permissions(
                "school_admin",
                &["school:read".into(), "school:read".into(), " ".into()],
            )
            .await
            .unwrap();
        assert_eq!(stored.permissions, vec!["school:read"]);
        let listed = store.list_role_permissions().await.unwrap();
        assert_eq!(listed, vec![stored]);
    }

    #[tokio::test]
    async fn test_audit_events_land_in_collection() {
        let (store, _) = store();
        store
            .record_audit_event(AuditEvent::new("authorization.set_role_permissions"))
            .await
            .unwrap();
        let docs = store.list_docs(keys::AUDIT_LOGS, None).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["action"], "authorization.set_role_permissions");
    }
}
