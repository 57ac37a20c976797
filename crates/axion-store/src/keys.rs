//! Key layout under the store keyspace.
//!
//! Every key is `<keyspace>:<parts joined by ':'>`; the default keyspace is `sms`.

pub const DEFAULT_KEYSPACE: &str = "sms";

pub const USERS: &str = "users";
pub const SCHOOLS: &str = "schools";
pub const ROLE_PERMISSIONS: &str = "role_permissions";
pub const AUDIT_LOGS: &str = "audit_logs";

#[derive(Debug, Clone)]
pub struct Keyspace {
    prefix: String,
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new(DEFAULT_KEYSPACE)
    }
}

impl Keyspace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn build_key(&self, parts: &[&str]) -> String {
        format!("{}:{}", self.prefix, parts.join(":"))
    }

    pub fn doc(&self, collection: &str, id: &str) -> String {
        self.build_key(&[collection, id])
    }

    pub fn collection_index(&self, collection: &str) -> String {
        self.build_key(&["idx", collection])
    }

    pub fn user_email_index(&self, email: &str) -> String {
        self.build_key(&["idx", USERS, "email", email])
    }

    pub fn policy_version(&self) -> String {
        self.build_key(&["meta", "authorization", "policyVersion"])
    }

    pub fn revoked_access_token(&self, jti: &str) -> String {
        self.build_key(&["security", "tokens", "revoked", jti])
    }

    pub fn login_failures(&self, email: &str) -> String {
        self.build_key(&["security", "login", "failures", email])
    }

    pub fn login_lock(&self, email: &str) -> String {
        self.build_key(&["security", "login", "lock", email])
    }

    pub fn refresh_session(&self, token_id: &str) -> String {
        self.build_key(&["security", "refresh", token_id])
    }

    /// One counter per fixed window, so old windows expire on their own.
    pub fn rate_limit(&self, ip: &str, module: &str, function: &str, bucket: i64) -> String {
        format!("ratelimit:{}:{}:{}:{}", ip, module, function, bucket)
    }
}
