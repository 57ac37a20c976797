//! Business modules exposed through the dispatcher.
//!
//! Each module owns a `router` that registers its endpoints with the
//! [`DispatcherBuilder`](crate::dispatcher::DispatcherBuilder), a
//! `controller` that parses payloads, and (where needed) a `service`
//! holding the business rules.

pub mod auth;
pub mod authorization;
