//! Named pipeline steps.
//!
//! Endpoints list the steps they need by name when they register with the
//! dispatcher; [`PRE_STACK`] runs in front of every one of them.
//!
//! # Steps
//!
//! - [`AUTH`]: verifies the access token ([`auth::Authenticate`])
//! - [`AUTHORIZE`]: checks the actor against the endpoint's access rule ([`authorize::Authorize`])
//! - [`DEVICE`]: client IP and user agent ([`device::DeviceContext`])
//! - [`RATE_LIMIT`]: fixed-window limiter ([`rate_limit::RateLimit`])
//! - [`QUERY`]: forwards query parameters ([`query::QueryParams`])

pub mod auth;
pub mod authorize;
pub mod device;
pub mod query;
pub mod rate_limit;

use std::sync::Arc;

use axion_auth::TokenService;
use axion_config::RateLimitConfig;
use axion_store::DataStore;

use crate::authorization::AuthorizationEngine;
use crate::modules::auth::AuthService;
use crate::pipeline::MiddlewareRegistry;

pub const AUTH: &str = "__auth";
pub const AUTHORIZE: &str = "__authorize";
pub const DEVICE: &str = "__device";
pub const RATE_LIMIT: &str = "__rateLimit";
pub const QUERY: &str = "__query";

pub const PRE_STACK: &[&str] = &[DEVICE, RATE_LIMIT];

pub fn init_registry(
    store: DataStore,
    tokens: Arc<TokenService>,
    auth: AuthService,
    engine: AuthorizationEngine,
    rate_limit: RateLimitConfig,
) -> MiddlewareRegistry {
    MiddlewareRegistry::new()
        .register(AUTH, Arc::new(auth::Authenticate::new(store.clone(), tokens)))
        .register(AUTHORIZE, Arc::new(authorize::Authorize::new(auth, engine)))
        .register(DEVICE, Arc::new(device::DeviceContext))
        .register(RATE_LIMIT, Arc::new(rate_limit::RateLimit::new(store, rate_limit)))
        .register(QUERY, Arc::new(query::QueryParams))
}
