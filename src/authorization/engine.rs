use std::collections::BTreeMap;
use std::sync::Arc;

use axion_config::PolicyConfig;
use axion_core::Clock;
use axion_core::permissions::{
    KNOWN_ROLES, RESOURCE_CLASSROOM, RESOURCE_SCHOOL, RESOURCE_STUDENT, RESOURCE_USER,
    ACTION_READ, ROLE_SCHOOL_ADMIN, ROLE_SUPERADMIN, default_permissions, permission_key,
};
use axion_models::{Actor, AuditEvent, AuditStatus, PolicyUpdate, PolicyWrite, RolePermissions};
use axion_store::{AuditSink, PolicyStore, PubSub, StoreError, normalize_permissions};
use serde_json::json;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::metrics::{track_authorization_decision, track_policy_cache_refresh};

/// Topic carrying [`PolicyUpdate`] payloads between engine instances.
pub const POLICY_UPDATE_TOPIC: &str = "internal.authorization.policyUpdated";

const AUDIT_ACTION_SET_ROLE_PERMISSIONS: &str = "authorization.set_role_permissions";
const AUDIT_RESOURCE_POLICY: &str = "authorization_policy";

type RoleMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("role is required")]
    RoleRequired,

    #[error("permissions must be a non-empty array")]
    EmptyPermissions,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default)]
struct PolicyCache {
    roles: Option<Arc<RoleMap>>,
    version: Option<String>,
    loaded_at_ms: i64,
}

impl PolicyCache {
    fn invalidate(&mut self) {
        self.roles = None;
        self.loaded_at_ms = 0;
    }
}

/// Role → permission evaluation over a [`PolicyStore`], with a process-local
/// snapshot that expires after the configured TTL or when another instance
/// announces a new policy version.
///
/// Cloning is cheap; clones share the same cache.
#[derive(Clone)]
pub struct AuthorizationEngine {
    store: Arc<dyn PolicyStore>,
    audit: Option<Arc<dyn AuditSink>>,
    pubsub: Option<Arc<dyn PubSub>>,
    clock: Arc<dyn Clock>,
    ttl_ms: i64,
    cache: Arc<RwLock<PolicyCache>>,
}

impl std::fmt::Debug for AuthorizationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationEngine")
            .field("ttl_ms", &self.ttl_ms)
            .field("audit", &self.audit.is_some())
            .field("pubsub", &self.pubsub.is_some())
            .finish()
    }
}

impl AuthorizationEngine {
    pub fn new(store: Arc<dyn PolicyStore>, clock: Arc<dyn Clock>, config: &PolicyConfig) -> Self {
        Self {
            store,
            audit: None,
            pubsub: None,
            clock,
            ttl_ms: (config.cache_ttl_secs as i64).saturating_mul(1000),
            cache: Arc::new(RwLock::new(PolicyCache::default())),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_pubsub(mut self, pubsub: Arc<dyn PubSub>) -> Self {
        self.pubsub = Some(pubsub);
        self
    }

    /// Subscribes to [`POLICY_UPDATE_TOPIC`] and drops the local snapshot
    /// whenever a different version is announced. Returns `None` without pub/sub.
    pub async fn start_listener(&self) -> Result<Option<JoinHandle<()>>, StoreError> {
        let Some(pubsub) = &self.pubsub else {
            return Ok(None);
        };

        let mut subscription = pubsub.subscribe(POLICY_UPDATE_TOPIC).await?;
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(payload) = subscription.recv().await {
                match serde_json::from_str::<PolicyUpdate>(&payload) {
                    Ok(update) => engine.apply_remote_update(update).await,
                    Err(e) => warn!(error = %e, "Ignoring malformed policy update"),
                }
            }
            debug!("Policy update subscription closed");
        });

        info!(topic = POLICY_UPDATE_TOPIC, "Listening for policy updates");
        Ok(Some(handle))
    }

    pub async fn apply_remote_update(&self, update: PolicyUpdate) {
        let mut cache = self.cache.write().await;
        if update.version.is_some() && update.version == cache.version {
            return;
        }

        debug!(
            policy.version = ?update.version,
            policy.role = ?update.role,
            "Policy version changed remotely, invalidating cache"
        );
        cache.version = update.version;
        cache.invalidate();
    }

    pub async fn invalidate(&self) {
        self.cache.write().await.invalidate();
    }

    async fn ensure_seeded(&self) -> Result<Vec<RolePermissions>, StoreError> {
        let docs = self.store.list_role_permissions().await?;
        if !docs.is_empty() {
            return Ok(docs);
        }

        let mut seeded: Vec<&str> = Vec::new();
        let mut failure = None;
        for &role in KNOWN_ROLES {
            let Some(permissions) = default_permissions(role) else {
                continue;
            };
            match self.store.upsert_role_permissions(role, &permissions).await {
                Ok(_) => seeded.push(role),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let version = match failure {
            None => self.store.set_policy_version(None).await,
            Some(e) => Err(e),
        };

        match version {
            Ok(version) => {
                info!(policy.version = %version, roles = seeded.len(), "Seeded default role permissions");
                self.cache.write().await.version = Some(version.clone());
                self.publish(PolicyUpdate {
                    version: Some(version),
                    role: None,
                })
                .await;
                self.store.list_role_permissions().await
            }
            Err(e) => {
                warn!(error = %e, "Seeding default role permissions failed, rolling back");
                for role in seeded {
                    if let Err(rollback) = self.store.delete_role_permissions(role).await {
                        warn!(role = %role, error = %rollback, "Failed to roll back seeded role");
                    }
                }
                Err(e)
            }
        }
    }

    /// Returns the current role map, reloading from the store when the
    /// snapshot is missing, stale or `force` is set.
    #[instrument(skip(self))]
    async fn refresh(&self, force: bool) -> Result<Arc<RoleMap>, StoreError> {
        if !force {
            let cache = self.cache.read().await;
            if let Some(roles) = &cache.roles {
                if self.clock.now_millis() - cache.loaded_at_ms < self.ttl_ms {
                    track_policy_cache_refresh("hit");
                    return Ok(roles.clone());
                }
            }
        }

        // Version before docs: a write landing in between costs one extra rebuild
        // instead of pinning old docs under the new version.
        let version = self.store.policy_version().await?;
        let docs = self.ensure_seeded().await?;

        let mut guard = self.cache.write().await;
        let cache = &mut *guard;
        let now = self.clock.now_millis();

        if !force && version.is_some() && version == cache.version {
            if let Some(roles) = &cache.roles {
                cache.loaded_at_ms = now;
                track_policy_cache_refresh("touch");
                return Ok(roles.clone());
            }
        }

        let mut roles = RoleMap::new();
        for &role in KNOWN_ROLES {
            if let Some(permissions) = default_permissions(role) {
                roles.insert(role.to_string(), permissions);
            }
        }
        for doc in docs {
            if doc.role.is_empty() {
                continue;
            }
            roles.insert(doc.role, normalize_permissions(&doc.permissions));
        }

        let roles = Arc::new(roles);
        cache.roles = Some(roles.clone());
        if version.is_some() {
            cache.version = version;
        }
        cache.loaded_at_ms = now;

        debug!(policy.version = ?cache.version, roles = roles.len(), "Rebuilt role permission cache");
        track_policy_cache_refresh("rebuild");
        Ok(roles)
    }

    async fn publish(&self, update: PolicyUpdate) {
        let Some(pubsub) = &self.pubsub else {
            return;
        };

        let payload = match serde_json::to_string(&update) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode policy update");
                return;
            }
        };

        if let Err(e) = pubsub.publish(POLICY_UPDATE_TOPIC, &payload).await {
            warn!(error = %e, "Failed to publish policy update");
        }
    }

    pub async fn has_permission(
        &self,
        actor: &Actor,
        resource: &str,
        action: &str,
    ) -> Result<bool, StoreError> {
        if actor.role.is_empty() || resource.is_empty() || action.is_empty() {
            return Ok(false);
        }

        let roles = self.refresh(false).await?;
        let key = permission_key(resource, action);
        let allowed = roles
            .get(&actor.role)
            .is_some_and(|permissions| permissions.iter().any(|p| *p == key));

        track_authorization_decision(allowed);
        Ok(allowed)
    }

    /// Holds only for superadmins whose permission set contains the key.
    pub async fn has_global_permission(
        &self,
        actor: &Actor,
        resource: &str,
        action: &str,
    ) -> Result<bool, StoreError> {
        if !self.has_permission(actor, resource, action).await? {
            return Ok(false);
        }

        Ok(actor.role == ROLE_SUPERADMIN)
    }

    pub async fn can_access_school(
        &self,
        actor: &Actor,
        school_id: Option<&str>,
        action: &str,
    ) -> Result<bool, StoreError> {
        self.scoped(actor, RESOURCE_SCHOOL, school_id, action).await
    }

    pub async fn can_access_classroom(
        &self,
        actor: &Actor,
        school_id: Option<&str>,
        action: &str,
    ) -> Result<bool, StoreError> {
        self.scoped(actor, RESOURCE_CLASSROOM, school_id, action)
            .await
    }

    pub async fn can_access_student(
        &self,
        actor: &Actor,
        school_id: Option<&str>,
        action: &str,
    ) -> Result<bool, StoreError> {
        self.scoped(actor, RESOURCE_STUDENT, school_id, action).await
    }

    pub async fn can_list_users_in_school(
        &self,
        actor: &Actor,
        school_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        self.scoped(actor, RESOURCE_USER, school_id, ACTION_READ).await
    }

    async fn scoped(
        &self,
        actor: &Actor,
        resource: &str,
        school_id: Option<&str>,
        action: &str,
    ) -> Result<bool, StoreError> {
        if !self.has_permission(actor, resource, action).await? {
            return Ok(false);
        }

        Ok(in_school_scope(actor, school_id))
    }

    pub async fn get_role_permissions(&self, role: &str) -> Result<Vec<String>, StoreError> {
        if role.is_empty() {
            return Ok(Vec::new());
        }

        let roles = self.refresh(false).await?;
        Ok(roles.get(role).cloned().unwrap_or_default())
    }

    /// Fresh read of every role, built-in defaults included.
    pub async fn list_role_permissions(&self) -> Result<Vec<RolePermissions>, StoreError> {
        let roles = self.refresh(true).await?;
        Ok(roles
            .iter()
            .map(|(role, permissions)| RolePermissions {
                role: role.clone(),
                permissions: permissions.clone(),
            })
            .collect())
    }

    /// Replaces a role's permission set and bumps the policy version.
    ///
    /// When the version bump fails the previous role document is restored
    /// (or the new one removed) before the error is returned.
    #[instrument(skip(self, permissions), fields(policy.role = %role))]
    pub async fn set_role_permissions(
        &self,
        role: &str,
        permissions: &[String],
        actor_id: Option<&str>,
    ) -> Result<PolicyWrite, PolicyError> {
        let role = role.trim();
        if role.is_empty() {
            return Err(PolicyError::RoleRequired);
        }

        let permissions = normalize_permissions(permissions);
        if permissions.is_empty() {
            return Err(PolicyError::EmptyPermissions);
        }

        let previous = self.store.get_role_permissions(role).await?;
        let stored = self.store.upsert_role_permissions(role, &permissions).await?;

        let version = match self.store.set_policy_version(None).await {
            Ok(version) => version,
            Err(e) => {
                warn!(error = %e, "Policy version bump failed, restoring role permissions");
                let rollback = match &previous {
                    Some(doc) => self
                        .store
                        .upsert_role_permissions(role, &doc.permissions)
                        .await
                        .map(|_| ()),
                    None => self.store.delete_role_permissions(role).await,
                };
                if let Err(rollback) = rollback {
                    warn!(error = %rollback, "Failed to restore role permissions");
                }
                return Err(e.into());
            }
        };

        {
            let mut cache = self.cache.write().await;
            cache.version = Some(version.clone());
            cache.invalidate();
        }

        self.publish(PolicyUpdate {
            version: Some(version.clone()),
            role: Some(role.to_string()),
        })
        .await;

        if let Some(audit) = &self.audit {
            let event = AuditEvent::new(AUDIT_ACTION_SET_ROLE_PERMISSIONS)
                .actor(actor_id.map(str::to_string))
                .resource(AUDIT_RESOURCE_POLICY, None)
                .status(AuditStatus::Success)
                .metadata(json!({
                    "role": role,
                    "permissions": stored.permissions,
                    "version": version,
                }));
            if let Err(e) = audit.record_audit_event(event).await {
                warn!(error = %e, "Failed to record authorization audit event");
            }
        }

        info!(policy.version = %version, permissions = stored.permissions.len(), "Role permissions updated");

        Ok(PolicyWrite {
            role: stored.role,
            permissions: stored.permissions,
            version,
        })
    }
}

/// Superadmins see every school; school admins only their own.
fn in_school_scope(actor: &Actor, school_id: Option<&str>) -> bool {
    let Some(school_id) = school_id.filter(|id| !id.is_empty()) else {
        return false;
    };

    match actor.role.as_str() {
        ROLE_SUPERADMIN => true,
        ROLE_SCHOOL_ADMIN => actor.school_id.as_deref() == Some(school_id),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axion_core::ManualClock;
    use axion_core::permissions::{ACTION_CONFIG, ACTION_CREATE};
    use axion_store::{DataStore, MemoryKv, MemoryPubSub};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn engine() -> (AuthorizationEngine, DataStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let store = DataStore::new(Arc::new(MemoryKv::new(clock.clone())), clock.clone());
        let engine = AuthorizationEngine::new(
            Arc::new(store.clone()),
            clock.clone(),
            &PolicyConfig::default(),
        )
        .with_audit(Arc::new(store.clone()));
        (engine, store, clock)
    }

    fn admin(school: &str) -> Actor {
        Actor::new("a1", ROLE_SCHOOL_ADMIN, Some(school.to_string()))
    }

    #[tokio::test]
    async fn test_first_read_seeds_defaults() {
        let (engine, store, _) = engine();
        assert!(store.list_role_permissions().await.unwrap().is_empty());

        let superadmin = Actor::new("s1", ROLE_SUPERADMIN, None);
        assert!(engine.has_permission(&superadmin, "school", "create").await.unwrap());
        assert!(!engine.has_permission(&admin("A"), "school", "create").await.unwrap());

        assert_eq!(store.list_role_permissions().await.unwrap().len(), 2);
        assert!(store.policy_version().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_inputs_deny() {
        let (engine, _, _) = engine();
        let nobody = Actor::new("x", "", None);
        assert!(!engine.has_permission(&nobody, "school", "read").await.unwrap());
        assert!(!engine.has_permission(&admin("A"), "", "read").await.unwrap());
        assert!(!engine.has_permission(&admin("A"), "school", "").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_role_permissions_validates_input() {
        let (engine, _, _) = engine();
        let err = engine.set_role_permissions(" ", &["school:read".into()], None).await;
        assert!(matches!(err, Err(PolicyError::RoleRequired)));

        let err = engine
            .set_role_permissions(ROLE_SCHOOL_ADMIN, &["".into(), "  ".into()], None)
            .await;
        assert_eq!(
            err.unwrap_err().to_string(),
            "permissions must be a non-empty array"
        );
    }

    #[tokio::test]
    async fn test_set_role_permissions_takes_effect_immediately() {
        let (engine, store, _) = engine();
        assert!(engine.has_permission(&admin("A"), "user", "read").await.unwrap());

        let write = engine
            .set_role_permissions(
                ROLE_SCHOOL_ADMIN,
                &["school:create".into(), "school:create".into(), "student:read".into()],
                Some("s1"),
            )
            .await
            .unwrap();
        assert_eq!(write.permissions, vec!["school:create", "student:read"]);
        assert_eq!(store.policy_version().await.unwrap(), Some(write.version));

        assert!(!engine.has_permission(&admin("A"), "user", "read").await.unwrap());
        assert!(engine.has_permission(&admin("A"), "school", "create").await.unwrap());
        // global checks stay superadmin-only
        assert!(
            !engine
                .has_global_permission(&admin("A"), "school", ACTION_CREATE)
                .await
                .unwrap()
        );

        let audits = store.list_docs("audit_logs", None).await.unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0]["action"], "authorization.set_role_permissions");
        assert_eq!(audits[0]["actorId"], "s1");
    }

    #[tokio::test]
    async fn test_scope_checks() {
        let (engine, _, _) = engine();
        let superadmin = Actor::new("s1", ROLE_SUPERADMIN, None);

        assert!(engine.can_access_school(&admin("A"), Some("A"), ACTION_CONFIG).await.unwrap());
        assert!(!engine.can_access_school(&admin("A"), Some("B"), ACTION_CONFIG).await.unwrap());
        assert!(!engine.can_access_school(&admin("A"), None, ACTION_READ).await.unwrap());
        assert!(engine.can_access_school(&superadmin, Some("A"), ACTION_CONFIG).await.unwrap());
        assert!(engine.can_access_school(&superadmin, Some("B"), ACTION_CONFIG).await.unwrap());

        assert!(engine.can_access_classroom(&admin("A"), Some("A"), ACTION_CREATE).await.unwrap());
        assert!(engine.can_access_student(&admin("A"), Some("A"), ACTION_READ).await.unwrap());
        assert!(engine.can_list_users_in_school(&admin("A"), Some("A")).await.unwrap());
        assert!(!engine.can_list_users_in_school(&admin("A"), Some("B")).await.unwrap());

        let stranger = Actor::new("t1", "teacher", Some("A".into()));
        assert!(!engine.can_access_school(&stranger, Some("A"), ACTION_READ).await.unwrap());
    }

    #[tokio::test]
    async fn test_direct_store_writes_wait_for_ttl() {
        let (engine, store, clock) = engine();
        assert!(engine.has_permission(&admin("A"), "user", "read").await.unwrap());

        store
            .upsert_role_permissions(ROLE_SCHOOL_ADMIN, &["school:read".into()])
            .await
            .unwrap();
        store.set_policy_version(None).await.unwrap();

        assert!(engine.has_permission(&admin("A"), "user", "read").await.unwrap());
        clock.advance_secs(10);
        assert!(engine.has_permission(&admin("A"), "user", "read").await.unwrap());

        clock.advance_secs(21);
        assert!(!engine.has_permission(&admin("A"), "user", "read").await.unwrap());
    }

    #[tokio::test]
    async fn test_remote_update_invalidates_unless_same_version() {
        let (engine, store, _) = engine();
        assert!(engine.has_permission(&admin("A"), "user", "read").await.unwrap());

        store
            .upsert_role_permissions(ROLE_SCHOOL_ADMIN, &["school:read".into()])
            .await
            .unwrap();
        let current = engine.cache.read().await.version.clone();
        engine
            .apply_remote_update(PolicyUpdate { version: current, role: None })
            .await;
        assert!(engine.has_permission(&admin("A"), "user", "read").await.unwrap());

        let version = store.set_policy_version(None).await.unwrap();
        engine
            .apply_remote_update(PolicyUpdate { version: Some(version), role: None })
            .await;
        assert!(!engine.has_permission(&admin("A"), "user", "read").await.unwrap());
    }

    #[tokio::test]
    async fn test_listener_converges_second_instance() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let store = DataStore::new(Arc::new(MemoryKv::new(clock.clone())), clock.clone());
        let pubsub = Arc::new(MemoryPubSub::new());
        let config = PolicyConfig::default();

        let first = AuthorizationEngine::new(Arc::new(store.clone()), clock.clone(), &config)
            .with_pubsub(pubsub.clone());
        let second = AuthorizationEngine::new(Arc::new(store.clone()), clock.clone(), &config)
            .with_pubsub(pubsub.clone());
        second.start_listener().await.unwrap();

        assert!(second.has_permission(&admin("A"), "user", "read").await.unwrap());

        first
            .set_role_permissions(ROLE_SCHOOL_ADMIN, &["school:read".into()], None)
            .await
            .unwrap();

        let mut converged = false;
        for _ in 0..50 {
            if !second.has_permission(&admin("A"), "user", "read").await.unwrap() {
                converged = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(converged);
    }

    #[tokio::test]
    async fn test_list_role_permissions_includes_defaults() {
        let (engine, _, _) = engine();
        engine
            .set_role_permissions("auditor", &["student:read".into()], None)
            .await
            .unwrap();

        let listed = engine.list_role_permissions().await.unwrap();
        let roles: Vec<_> = listed.iter().map(|r| r.role.as_str()).collect();
        assert_eq!(roles, vec!["auditor", "school_admin", "superadmin"]);
        assert_eq!(
            engine.get_role_permissions("auditor").await.unwrap(),
            vec!["student:read"]
        );
        assert!(engine.get_role_permissions("ghost").await.unwrap().is_empty());
    }

    struct FlakyVersionStore {
        inner: DataStore,
        fail_version: AtomicBool,
    }

    #[async_trait]
    impl PolicyStore for FlakyVersionStore {
        async fn list_role_permissions(&self) -> Result<Vec<RolePermissions>, StoreError> {
            self.inner.list_role_permissions().await
        }

        async fn get_role_permissions(
            &self,
            role: &str,
        ) -> Result<Option<RolePermissions>, StoreError> {
            self.inner.get_role_permissions(role).await
        }

        async fn upsert_role_permissions(
            &self,
            role: &str,
            permissions: &[String],
        ) -> Result<RolePermissions, StoreError> {
            self.inner.upsert_role_permissions(role, permissions).await
        }

        async fn delete_role_permissions(&self, role: &str) -> Result<(), StoreError> {
            self.inner.delete_role_permissions(role).await
        }

        async fn policy_version(&self) -> Result<Option<String>, StoreError> {
            self.inner.policy_version().await
        }

        async fn set_policy_version(
            &self,
            version: Option<String>,
        ) -> Result<String, StoreError> {
            if self.fail_version.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("version write refused".into()));
            }
            self.inner.set_policy_version(version).await
        }
    }

    /// Lands one policy write right after the engine has read the role documents.
    struct InterleavedWriteStore {
        inner: DataStore,
        armed: AtomicBool,
    }

    #[async_trait]
    impl PolicyStore for InterleavedWriteStore {
        async fn list_role_permissions(&self) -> Result<Vec<RolePermissions>, StoreError> {
            let docs = self.inner.list_role_permissions().await?;
            if self.armed.swap(false, Ordering::SeqCst) {
                self.inner
                    .upsert_role_permissions(ROLE_SCHOOL_ADMIN, &["school:read".into()])
                    .await?;
                self.inner.set_policy_version(None).await?;
            }
            Ok(docs)
        }

        async fn get_role_permissions(
            &self,
            role: &str,
        ) -> Result<Option<RolePermissions>, StoreError> {
            self.inner.get_role_permissions(role).await
        }

        async fn upsert_role_permissions(
            &self,
            role: &str,
            permissions: &[String],
        ) -> Result<RolePermissions, StoreError> {
            self.inner.upsert_role_permissions(role, permissions).await
        }

        async fn delete_role_permissions(&self, role: &str) -> Result<(), StoreError> {
            self.inner.delete_role_permissions(role).await
        }

        async fn policy_version(&self) -> Result<Option<String>, StoreError> {
            self.inner.policy_version().await
        }

        async fn set_policy_version(
            &self,
            version: Option<String>,
        ) -> Result<String, StoreError> {
            self.inner.set_policy_version(version).await
        }
    }

    #[tokio::test]
    async fn test_write_during_refresh_is_picked_up_next_ttl() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let inner = DataStore::new(Arc::new(MemoryKv::new(clock.clone())), clock.clone());
        let store = Arc::new(InterleavedWriteStore {
            inner: inner.clone(),
            armed: AtomicBool::new(false),
        });
        let engine = AuthorizationEngine::new(store.clone(), clock.clone(), &PolicyConfig::default());
        assert!(engine.has_permission(&admin("A"), "user", "read").await.unwrap());

        store.armed.store(true, Ordering::SeqCst);
        clock.advance_secs(31);
        // The refresh read the docs before the write landed
        assert!(engine.has_permission(&admin("A"), "user", "read").await.unwrap());
        assert_eq!(
            inner.get_role_permissions(ROLE_SCHOOL_ADMIN).await.unwrap().unwrap().permissions,
            vec!["school:read"]
        );

        clock.advance_secs(31);
        assert!(!engine.has_permission(&admin("A"), "user", "read").await.unwrap());
        assert!(engine.has_permission(&admin("A"), "school", "read").await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_snapshot_kept_while_version_unchanged() {
        let (engine, store, clock) = engine();
        assert!(engine.has_permission(&admin("A"), "user", "read").await.unwrap());

        store
            .upsert_role_permissions(ROLE_SCHOOL_ADMIN, &["school:read".into()])
            .await
            .unwrap();
        clock.advance_secs(31);
        assert!(engine.has_permission(&admin("A"), "user", "read").await.unwrap());

        engine.invalidate().await;
        assert!(!engine.has_permission(&admin("A"), "user", "read").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_version_bump_restores_previous_document() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let inner = DataStore::new(Arc::new(MemoryKv::new(clock.clone())), clock.clone());
        let store = Arc::new(FlakyVersionStore {
            inner: inner.clone(),
            fail_version: AtomicBool::new(false),
        });
        let engine = AuthorizationEngine::new(store.clone(), clock, &PolicyConfig::default());
        engine.list_role_permissions().await.unwrap();

        store.fail_version.store(true, Ordering::SeqCst);
        let result = engine
            .set_role_permissions(ROLE_SCHOOL_ADMIN, &["school:read".into()], None)
            .await;
        assert!(matches!(result, Err(PolicyError::Store(_))));

        let restored = inner.get_role_permissions(ROLE_SCHOOL_ADMIN).await.unwrap().unwrap();
        assert_eq!(
            restored.permissions,
            default_permissions(ROLE_SCHOOL_ADMIN).unwrap()
        );

        let result = engine
            .set_role_permissions("auditor", &["school:read".into()], None)
            .await;
        assert!(result.is_err());
        assert!(inner.get_role_permissions("auditor").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_seed_leaves_no_documents() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let inner = DataStore::new(Arc::new(MemoryKv::new(clock.clone())), clock.clone());
        let store = Arc::new(FlakyVersionStore {
            inner: inner.clone(),
            fail_version: AtomicBool::new(true),
        });
        let engine = AuthorizationEngine::new(store, clock, &PolicyConfig::default());

        assert!(engine.list_role_permissions().await.is_err());
        assert!(inner.list_role_permissions().await.unwrap().is_empty());
    }
}
