//! # Axion Core
//!
//! Core types, errors, and utilities shared by every Axion crate.
//!
//! - [`errors`]: Application error type with HTTP response conversion
//! - [`permissions`]: Role, resource, and action constants plus built-in defaults
//! - [`clock`]: Injectable time source
//! - [`password`]: bcrypt hashing and verification
//!
//! # Example
//!
//! ```ignore
//! use axion_core::errors::AppError;
//! use axion_core::password::{hash_password, verify_password};
//!
//! let error = AppError::forbidden("forbidden");
//! let hash = hash_password("secure_password")?;
//! ```

pub mod clock;
pub mod errors;
pub mod password;
pub mod permissions;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::AppError;
pub use password::{hash_password, hash_password_with_cost, verify_password};
