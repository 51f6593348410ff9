//! Storage engine trait definitions.

use crate::error::EngineResult;
use crate::schema::StoreOptions;

/// How an open request treats the stored schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRequest {
    /// Open at whatever version is stored, creating an empty database at
    /// version 1 if none exists.
    Latest,
    /// Raise the stored version to exactly this value, running the upgrade
    /// callback. Requesting a version lower than the stored one is an error.
    Exact(u64),
}

/// The schema-editing window passed to an upgrade callback.
///
/// Store existence changes only here: the engine invokes the callback exactly
/// once, while raising the stored version (or creating the database), and
/// applies the edits before the open completes.
pub trait SchemaEditor {
    /// Creates a store if it does not already exist.
    fn create_store(&mut self, name: &str, options: &StoreOptions);

    /// Deletes a store if it exists. Records in the store are dropped.
    fn delete_store(&mut self, name: &str);

    /// Returns whether the named store exists.
    fn has_store(&self, name: &str) -> bool;

    /// Returns the names of all stores, in stable order.
    fn store_names(&self) -> Vec<String>;
}

/// A storage engine that can open, upgrade, and delete named databases.
///
/// Engines own all persistence details. Callers interact with a database
/// exclusively through the [`DatabaseHandle`] returned by [`open`].
///
/// # Invariants
///
/// - The stored version only ever increases.
/// - The upgrade callback runs at most once per open, and only when the
///   stored version is raised.
/// - A successful open returns a handle consistent with the requested
///   version.
///
/// [`open`]: StorageEngine::open
pub trait StorageEngine: Send + Sync {
    /// Opens or creates the named database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is blocked by another connection,
    /// the requested version is lower than the stored one, or persisted
    /// state cannot be read.
    fn open(
        &self,
        name: &str,
        version: VersionRequest,
        upgrade: &mut dyn FnMut(&mut dyn SchemaEditor),
    ) -> EngineResult<Box<dyn DatabaseHandle>>;

    /// Deletes the named database entirely.
    ///
    /// Succeeds if the database does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a live connection blocks the delete or the
    /// underlying storage cannot be removed.
    fn delete_database(&self, name: &str) -> EngineResult<()>;

    /// Best-effort request for durable storage.
    ///
    /// The return value is advisory only; callers must not base control
    /// flow on it.
    fn request_persistence(&self) -> bool {
        false
    }
}

/// A live connection to an open database.
///
/// All record operations are scoped to a named store. Operations against a
/// store that is not part of the schema return
/// [`EngineError::StoreNotFound`](crate::EngineError::StoreNotFound).
pub trait DatabaseHandle: Send + Sync {
    /// Returns the database name.
    fn name(&self) -> &str;

    /// Returns the schema version this handle was opened at.
    fn version(&self) -> u64;

    /// Reads the value stored under `key`, if any.
    fn get(&self, store: &str, key: &str) -> EngineResult<Option<String>>;

    /// Inserts or replaces the value stored under `key`.
    fn put(&self, store: &str, key: &str, value: &str) -> EngineResult<()>;

    /// Removes the value stored under `key`. Succeeds if the key is absent.
    fn delete(&self, store: &str, key: &str) -> EngineResult<()>;

    /// Returns all keys in the store, in stable order.
    fn keys(&self, store: &str) -> EngineResult<Vec<String>>;

    /// Returns the number of records in the store.
    fn count(&self, store: &str) -> EngineResult<usize>;

    /// Removes every record in the store without removing the store.
    fn clear(&self, store: &str) -> EngineResult<()>;

    /// Returns the names of all stores in the schema, in stable order.
    fn store_names(&self) -> Vec<String>;

    /// Closes the handle, releasing any locks it holds.
    ///
    /// Operations on a closed handle return
    /// [`EngineError::Closed`](crate::EngineError::Closed).
    fn close(&self);
}
