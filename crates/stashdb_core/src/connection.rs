//! Connection lifecycle and schema-version negotiation.

use stashdb_storage::{
    DatabaseHandle, SchemaEditor, StorageEngine, StoreOptions, VersionRequest,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle states of the database connection.
///
/// Transitions: `Uninitialized -> Opening -> {Ready, Degraded}`;
/// `Ready -> Upgrading -> {Ready, Degraded}` on a schema-raising reopen;
/// any state returns to `Uninitialized` when the database is deleted, which
/// immediately re-triggers an open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No open has been attempted since construction or the last reset.
    Uninitialized,
    /// An open request is in flight.
    Opening,
    /// A live handle is available; operations use the primary engine.
    Ready,
    /// A schema-raising reopen is in flight.
    Upgrading,
    /// The engine failed; operations route to the fallback store.
    Degraded,
}

/// Owns the single live handle to the database and mediates every schema
/// change.
///
/// The manager never raises on engine failure: any failed open leaves it in
/// [`ConnectionState::Degraded`], and callers consult [`is_ready`] to decide
/// where to route operations. An engine that is permanently absent means the
/// manager stays degraded for the process lifetime.
///
/// [`is_ready`]: ConnectionManager::is_ready
pub struct ConnectionManager {
    engine: Arc<dyn StorageEngine>,
    database_name: String,
    default_store: String,
    /// Last negotiated schema version; 0 until the first successful open.
    version: u64,
    handle: Option<Box<dyn DatabaseHandle>>,
    state: ConnectionState,
}

impl ConnectionManager {
    /// Creates a manager for the named database.
    ///
    /// No open is attempted until [`open`](ConnectionManager::open) or
    /// [`ensure_ready`](ConnectionManager::ensure_ready) is called.
    pub fn new(
        engine: Arc<dyn StorageEngine>,
        database_name: impl Into<String>,
        default_store: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            database_name: database_name.into(),
            default_store: default_store.into(),
            version: 0,
            handle: None,
            state: ConnectionState::Uninitialized,
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns whether a live handle is available.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// Returns the live handle, if ready.
    #[must_use]
    pub fn handle(&self) -> Option<&dyn DatabaseHandle> {
        self.handle.as_deref()
    }

    /// Returns the last negotiated schema version (0 before the first
    /// successful open).
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the database name.
    #[must_use]
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Opens the database, creating it with the configured default store if
    /// it does not exist.
    ///
    /// Idempotent while `Ready`. Failure is absorbed: the manager enters
    /// `Degraded` and logs a warning.
    pub fn open(&mut self) {
        if self.state == ConnectionState::Ready {
            return;
        }
        self.state = ConnectionState::Opening;

        let default_store = self.default_store.clone();
        let mut baseline = |schema: &mut dyn SchemaEditor| {
            if !schema.has_store(&default_store) {
                schema.create_store(&default_store, &StoreOptions::default());
            }
        };

        match self
            .engine
            .open(&self.database_name, VersionRequest::Latest, &mut baseline)
        {
            Ok(handle) => {
                self.version = handle.version();
                debug!(
                    database = %self.database_name,
                    version = self.version,
                    "database open"
                );
                self.handle = Some(handle);
                self.state = ConnectionState::Ready;
            }
            Err(e) => {
                warn!(
                    database = %self.database_name,
                    error = %e,
                    "open failed, entering degraded mode"
                );
                self.handle = None;
                self.state = ConnectionState::Degraded;
            }
        }
    }

    /// Makes exactly one open attempt if not currently `Ready`.
    ///
    /// Callers must check [`is_ready`](ConnectionManager::is_ready) after
    /// the call rather than assume success.
    pub fn ensure_ready(&mut self) {
        if !self.is_ready() {
            self.open();
        }
    }

    /// Closes the current handle, raises the version by `delta` (at least
    /// 1), and reopens with the supplied upgrade callback.
    ///
    /// This is the only way to add or remove stores after the initial open.
    /// Failure degrades the manager instead of raising.
    pub fn reopen_with_new_version(
        &mut self,
        delta: u64,
        upgrade: &mut dyn FnMut(&mut dyn SchemaEditor),
    ) {
        // Engines refuse to raise the version of an open database.
        self.close_handle();
        self.state = ConnectionState::Upgrading;
        self.version = self.version.saturating_add(delta.max(1));

        match self.engine.open(
            &self.database_name,
            VersionRequest::Exact(self.version),
            upgrade,
        ) {
            Ok(handle) => {
                self.version = handle.version();
                debug!(
                    database = %self.database_name,
                    version = self.version,
                    "schema upgrade complete"
                );
                self.handle = Some(handle);
                self.state = ConnectionState::Ready;
            }
            Err(e) => {
                warn!(
                    database = %self.database_name,
                    error = %e,
                    "schema upgrade failed, entering degraded mode"
                );
                self.state = ConnectionState::Degraded;
            }
        }
    }

    /// Closes the handle, deletes the entire database, resets internal
    /// state, and immediately reopens a fresh database at version-1
    /// semantics.
    pub fn delete_database(&mut self) {
        self.close_handle();
        if let Err(e) = self.engine.delete_database(&self.database_name) {
            warn!(
                database = %self.database_name,
                error = %e,
                "database delete failed"
            );
        }
        self.version = 0;
        self.state = ConnectionState::Uninitialized;
        self.open();
    }

    /// Closes the handle and returns to `Uninitialized`.
    pub fn close(&mut self) {
        self.close_handle();
        self.state = ConnectionState::Uninitialized;
    }

    fn close_handle(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("database_name", &self.database_name)
            .field("version", &self.version)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
