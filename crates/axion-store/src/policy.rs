//! Persistence seams used by the authorization engine.

use async_trait::async_trait;
use axion_models::{AuditEvent, RolePermissions};

use crate::error::StoreError;

/// Role → permission documents plus the global policy version.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn list_role_permissions(&self) -> Result<Vec<RolePermissions>, StoreError>;

    async fn get_role_permissions(&self, role: &str)
    -> Result<Option<RolePermissions>, StoreError>;

    /// Writes the de-duplicated set and returns what was stored.
    async fn upsert_role_permissions(
        &self,
        role: &str,
        permissions: &[String],
    ) -> Result<RolePermissions, StoreError>;

    async fn delete_role_permissions(&self, role: &str) -> Result<(), StoreError>;

    async fn policy_version(&self) -> Result<Option<String>, StoreError>;

    /// Stores `version`, or a fresh one strictly newer than the current value when `None`.
    async fn set_policy_version(&self, version: Option<String>) -> Result<String, StoreError>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_audit_event(&self, event: AuditEvent) -> Result<(), StoreError>;
}
