//! # Axion Config
//!
//! Configuration types for the Axion service, loaded from environment variables:
//!
//! - [`token`]: key ring, secrets, and lifetimes for access/refresh tokens
//! - [`policy`]: authorization policy cache TTL
//! - [`rate_limit`]: fixed-window API rate limiting
//! - [`login_guard`]: login failure lockout
//! - [`cors`]: CORS (Cross-Origin Resource Sharing) configuration
//! - [`server`]: listener host and port
//!
//! # Example
//!
//! ```ignore
//! use axion_config::{TokenConfig, RateLimitConfig};
//!
//! let token_config = TokenConfig::from_env();
//! token_config.validate()?;
//! let rate_limit_config = RateLimitConfig::from_env();
//! ```

pub mod cors;
pub mod duration;
pub mod login_guard;
pub mod policy;
pub mod rate_limit;
pub mod server;
pub mod token;

pub use cors::CorsConfig;
pub use duration::parse_duration_secs;
pub use login_guard::LoginGuardConfig;
pub use policy::PolicyConfig;
pub use rate_limit::RateLimitConfig;
pub use server::ServerConfig;
pub use token::TokenConfig;
