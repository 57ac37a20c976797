//! # Axion
//!
//! Role-based access control API: a versioned authorization policy engine,
//! signed access/refresh tokens with key rotation and revocation, and a
//! short-circuiting middleware pipeline in front of every business handler.
//!
//! ## Architecture
//!
//! ```text
//! src/
//! ├── authorization/   # AuthorizationEngine: role → permission cache, scope checks
//! ├── pipeline/        # RequestContext, Middleware trait, VirtualStack chains
//! ├── middleware/      # __auth, __authorize, __device, __rateLimit, __query
//! ├── dispatcher/      # module + verb + function → chain + handler, status mapping
//! ├── modules/         # auth and authorization endpoints
//! ├── cli/             # serve / policy / school commands
//! ├── router.rs        # axum routes, CORS, security headers
//! └── state.rs         # configuration and service wiring
//! ```
//!
//! Supporting crates:
//!
//! - `axion-core`: `AppError`, permission constants, `Clock`, password hashing
//! - `axion-config`: environment-driven configuration
//! - `axion-models`: user, policy, and security records plus request DTOs
//! - `axion-store`: `KvStore`/`PubSub` seams, in-memory backends, `DataStore`
//! - `axion-cache`: Redis backend
//! - `axion-auth`: `TokenService` and the signing key ring
//!
//! ## Request flow
//!
//! 1. `ANY /api/{module}/{function}` sanitizes the body and query
//! 2. The [`dispatcher::Dispatcher`] resolves the endpoint for the HTTP verb
//! 3. Its chain runs `__device`, `__rateLimit`, then the endpoint's own steps
//! 4. The first rejecting step answers the request; otherwise the handler runs
//! 5. Handler failures are mapped to a status by [`dispatcher::Failure::status`]
//!
//! ## Quick Start
//!
//! ```bash
//! SHORT_TOKEN_SECRET=change-me cargo run
//! curl -X POST localhost:5111/api/auth/v1_bootstrapSuperadmin \
//!   -H 'content-type: application/json' \
//!   -d '{"email":"root@school.io","password":"Passw0rd","firstName":"Root","lastName":"Admin"}'
//! ```

pub mod authorization;
pub mod cli;
pub mod dispatcher;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod modules;
pub mod pipeline;
pub mod router;
pub mod sanitize;
pub mod state;
pub mod validator;

// Re-export workspace crates for convenience
pub use axion_auth;
pub use axion_config;
pub use axion_core;
pub use axion_models;
pub use axion_store;
