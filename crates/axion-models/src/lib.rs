//! # Axion Models
//!
//! Domain records and DTOs for the Axion service.
//!
//! # Modules
//!
//! - [`users`]: User documents, public projection, and the [`Actor`] view
//! - [`policy`]: Role permission documents, policy updates, audit events
//! - [`security`]: Refresh sessions and login locks
//! - [`auth`]: Request/response DTOs with validation rules
//!
//! # Example
//!
//! ```ignore
//! use axion_models::{Actor, UserRecord};
//!
//! let actor: Actor = user_record.actor();
//! ```

pub mod auth;
pub mod policy;
pub mod security;
pub mod users;

pub use auth::{
    AuthTokens, BootstrapSuperadminRequest, CreateSchoolAdminRequest, ListUsersQuery,
    LoginRequest, LogoutRequest, RefreshTokenRequest, SetRolePermissionsRequest,
    UpdateUserRequest, UserIdRequest,
};
pub use policy::{AuditEvent, AuditStatus, PolicyUpdate, PolicyWrite, RolePermissions};
pub use security::{LOCK_REASON_TOO_MANY_ATTEMPTS, LoginLock, RefreshSession};
pub use users::{Actor, PublicUser, UserRecord, UserStatus};
