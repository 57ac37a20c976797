//! User records as persisted in the document store, and the actor view
//! the authorization engine works with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account status. Anything other than `active` blocks authentication.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
    #[serde(other)]
    Unknown,
}

impl UserStatus {
    pub const ALLOWED: &'static [&'static str] = &["active", "inactive", "suspended"];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "suspended" => Some(Self::Suspended),
            _ => None,
        }
    }

    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

pub(crate) fn default_token_version() -> i64 {
    1
}

/// A user document from the `users` collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: String,
    #[serde(default)]
    pub school_id: Option<String>,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default = "default_token_version")]
    pub token_version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Projection safe to return to clients.
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role.clone(),
            school_id: self.school_id.clone(),
            status: self.status,
            token_version: self.token_version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id.clone(),
            role: self.role.clone(),
            school_id: self.school_id.clone(),
            email: Some(self.email.clone()),
            status: self.status,
            token_version: self.token_version,
        }
    }
}

/// [`UserRecord`] without the password hash.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub school_id: Option<String>,
    pub status: UserStatus,
    pub token_version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Identity evaluated by permission and scope checks.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    #[serde(rename = "_id")]
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub school_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default = "default_token_version")]
    pub token_version: i64,
}

impl Actor {
    /// Minimal actor for permission checks that only care about role and scope.
    pub fn new(id: impl Into<String>, role: impl Into<String>, school_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            school_id,
            email: None,
            status: UserStatus::Active,
            token_version: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_record_defaults() {
        let user: UserRecord = serde_json::from_value(json!({
            "_id": "u1",
            "email": "a@b.co",
            "role": "school_admin"
        }))
        .unwrap();
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.token_version, 1);
        assert_eq!(user.school_id, None);
    }

    #[test]
    fn test_unknown_status_is_not_active() {
        let user: UserRecord = serde_json::from_value(json!({
            "_id": "u1",
            "email": "a@b.co",
            "role": "superadmin",
            "status": "banned"
        }))
        .unwrap();
        assert_eq!(user.status, UserStatus::Unknown);
        assert!(!user.status.is_active());
    }

    #[test]
    fn test_public_projection_drops_password_hash() {
        let user = UserRecord {
            id: "u1".into(),
            email: "a@b.co".into(),
            password_hash: Some("$2b$hash".into()),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            role: "superadmin".into(),
            school_id: None,
            status: UserStatus::Active,
            token_version: 3,
            created_at: None,
            updated_at: None,
        };
        let value = serde_json::to_value(user.public()).unwrap();
        assert!(value.get("passwordHash").is_none());
        assert_eq!(value["_id"], "u1");
        assert_eq!(value["tokenVersion"], 3);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(UserStatus::parse(" Inactive "), Some(UserStatus::Inactive));
        assert_eq!(UserStatus::parse("gone"), None);
    }
}
