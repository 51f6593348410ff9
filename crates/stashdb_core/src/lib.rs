//! # stashdb Core
//!
//! A persistent key-value storage abstraction for embedding hosts: named
//! stores of string records inside one versioned database, with schema
//! evolution by version bumps and a degraded fallback path when the primary
//! engine is unavailable.
//!
//! This crate provides:
//! - [`ConnectionManager`] - database handle lifecycle and version-upgrade
//!   negotiation
//! - [`StorageClient`] - total store operations routed to the primary
//!   engine or the fallback snapshot
//! - [`FallbackStore`] - the single-blob snapshot serving degraded mode
//!
//! # Opening a Client
//!
//! ```rust
//! use stashdb_core::{Config, StorageClient};
//! use stashdb_storage::{MemoryEngine, MemorySlot};
//! use std::sync::Arc;
//!
//! let client = StorageClient::new(
//!     Arc::new(MemoryEngine::new()),
//!     Box::new(MemorySlot::new()),
//!     Config::new().database_name("game"),
//! );
//!
//! client.put(None, "player", "{}");
//! assert_eq!(client.get(None, "player"), "{}");
//! assert_eq!(client.list_stores(), vec!["default"]);
//! ```
//!
//! No operation on [`StorageClient`] can fail from the caller's point of
//! view: failures degrade to sentinel results and a `tracing` warning.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod connection;
mod error;
mod fallback;
mod options;

pub use client::StorageClient;
pub use config::Config;
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{CoreError, CoreResult};
pub use fallback::{FallbackStore, Snapshot, SnapshotMetadata};
pub use options::parse_store_options;

/// Crate version, re-exported for tooling.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
