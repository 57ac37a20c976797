//! Authorization policy records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One persisted role → permission set mapping (`role_permissions` collection).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RolePermissions {
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Result of a successful policy write.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyWrite {
    pub role: String,
    pub permissions: Vec<String>,
    pub version: String,
}

/// Broadcast on the policy-update topic after every version bump.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyUpdate {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    #[default]
    Success,
    Failure,
}

/// Entry in the `audit_logs` collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    #[serde(default)]
    pub actor_id: Option<String>,
    pub action: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub status: AuditStatus,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl AuditEvent {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            actor_id: None,
            action: action.into(),
            resource_type: None,
            resource_id: None,
            status: AuditStatus::Success,
            metadata: Value::Object(Default::default()),
            created_at: None,
        }
    }

    pub fn actor(mut self, actor_id: Option<String>) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub fn resource(mut self, resource_type: &str, resource_id: Option<String>) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self.resource_id = resource_id;
        self
    }

    pub fn status(mut self, status: AuditStatus) -> Self {
        self.status = status;
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_policy_update_without_version() {
        let update: PolicyUpdate = serde_json::from_value(json!({})).unwrap();
        assert_eq!(update.version, None);
    }

    #[test]
    fn test_audit_event_builder() {
        let event = AuditEvent::new("authorization.set_role_permissions")
            .resource("authorization_policy", None)
            .metadata(json!({"role": "school_admin"}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["resourceType"], "authorization_policy");
        assert_eq!(value["status"], "success");
        assert_eq!(value["metadata"]["role"], "school_admin");
    }
}
