//! # stashdb Storage
//!
//! Storage engine traits and implementations for stashdb.
//!
//! This crate defines the boundary the core consumes:
//!
//! - [`StorageEngine`] opens, upgrades, and deletes named databases; store
//!   existence changes only inside the upgrade callback's [`SchemaEditor`]
//!   window.
//! - [`DatabaseHandle`] serves record operations scoped to named stores.
//! - [`FallbackSlot`] is the single-slot surface the degraded path persists
//!   its snapshot through.
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - For testing and ephemeral storage
//! - [`FileEngine`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use stashdb_storage::{MemoryEngine, StorageEngine, VersionRequest};
//!
//! let engine = MemoryEngine::new();
//! let handle = engine
//!     .open("demo", VersionRequest::Latest, &mut |schema| {
//!         schema.create_store("default", &Default::default());
//!     })
//!     .unwrap();
//! handle.put("default", "greeting", "hello").unwrap();
//! assert_eq!(handle.keys("default").unwrap(), vec!["greeting"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod file;
mod memory;
mod schema;
mod slot;

pub use engine::{DatabaseHandle, SchemaEditor, StorageEngine, VersionRequest};
pub use error::{EngineError, EngineResult};
pub use file::FileEngine;
pub use memory::MemoryEngine;
pub use schema::{Schema, StoreOptions, SCHEMA_ENCODING_VERSION, SCHEMA_MAGIC};
pub use slot::{FallbackSlot, FileSlot, MemorySlot};
