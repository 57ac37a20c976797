//! # Axion Store
//!
//! Storage seams for the Axion service.
//!
//! - [`kv`]: [`KvStore`] and [`PubSub`] traits every backend implements
//! - [`memory`]: in-process backends for tests and single-node runs
//! - [`data_store`]: JSON documents and security records over a [`KvStore`]
//! - [`policy`]: [`PolicyStore`] and [`AuditSink`] used by the authorization engine
//! - [`keys`]: key layout under the keyspace prefix
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use axion_core::SystemClock;
//! use axion_store::{DataStore, MemoryKv};
//!
//! let clock = Arc::new(SystemClock);
//! let store = DataStore::new(Arc::new(MemoryKv::new(clock.clone())), clock);
//! let user = store.get_user("user-id").await?;
//! ```

pub mod data_store;
pub mod error;
pub mod keys;
pub mod kv;
pub mod memory;
pub mod policy;

pub use data_store::{DataStore, normalize_permissions};
pub use error::StoreError;
pub use keys::Keyspace;
pub use kv::{KvStore, PubSub, Subscription};
pub use memory::{MemoryKv, MemoryPubSub};
pub use policy::{AuditSink, PolicyStore};
