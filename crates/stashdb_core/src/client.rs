//! The store operations facade.

use crate::config::Config;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::fallback::FallbackStore;
use crate::options::parse_store_options;
use parking_lot::{Mutex, RwLock};
use stashdb_storage::{FallbackSlot, SchemaEditor, StorageEngine};
use std::sync::Arc;
use tracing::{debug, warn};

/// Uniform store operations, transparently routed to the primary engine or
/// the fallback snapshot.
///
/// A `StorageClient` is constructed once per process with an injected
/// engine, fallback slot, and [`Config`]; it owns the connection manager and
/// holds no other state beyond the currently selected default store.
///
/// Every operation is total: it always produces a value (possibly an
/// empty-string, empty-list, or zero sentinel) and never raises past its own
/// boundary. Failures are logged through `tracing` and converted to
/// sentinels at the point of detection, so a caller cannot distinguish "key
/// absent" from "read failed".
///
/// # Consistency gap
///
/// Records committed to the primary engine before a mid-session failure are
/// not migrated into the fallback snapshot. While degraded, such records
/// read as absent; they become visible again once a later open succeeds.
///
/// # Example
///
/// ```rust
/// use stashdb_core::{Config, StorageClient};
/// use stashdb_storage::{MemoryEngine, MemorySlot};
/// use std::sync::Arc;
///
/// let client = StorageClient::new(
///     Arc::new(MemoryEngine::new()),
///     Box::new(MemorySlot::new()),
///     Config::default(),
/// );
///
/// client.put(None, "player", "{\"hp\": 3}");
/// assert_eq!(client.get(None, "player"), "{\"hp\": 3}");
/// ```
pub struct StorageClient {
    database_name: String,
    manager: Mutex<ConnectionManager>,
    fallback: FallbackStore,
    default_store: RwLock<String>,
}

impl StorageClient {
    /// Creates a client and makes one eager open attempt.
    ///
    /// Durable storage is requested from the engine once, best-effort; the
    /// outcome is logged and never consulted. An open failure here is
    /// absorbed: the client starts degraded and every operation retries the
    /// open once before falling back.
    pub fn new(
        engine: Arc<dyn StorageEngine>,
        slot: Box<dyn FallbackSlot>,
        config: Config,
    ) -> Self {
        let persisted = engine.request_persistence();
        debug!(persisted, "durable storage requested");

        let mut manager = ConnectionManager::new(
            engine,
            config.database_name.clone(),
            config.default_store.clone(),
        );
        manager.open();

        Self {
            fallback: FallbackStore::new(slot, config.default_store.clone()),
            default_store: RwLock::new(config.default_store),
            database_name: config.database_name,
            manager: Mutex::new(manager),
        }
    }

    /// Returns the database name this client operates on.
    #[must_use]
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Returns the currently selected default store.
    #[must_use]
    pub fn default_store(&self) -> String {
        self.default_store.read().clone()
    }

    /// Selects the store used when operations do not name one.
    pub fn set_default_store(&self, name: &str) {
        *self.default_store.write() = name.to_string();
        self.fallback.set_default_store(name);
    }

    /// Returns whether the primary engine is currently serving.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.manager.lock().is_ready()
    }

    /// Returns the connection lifecycle state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.manager.lock().state()
    }

    /// Returns the last negotiated database version (0 while degraded
    /// before any successful open).
    #[must_use]
    pub fn database_version(&self) -> u64 {
        self.manager.lock().version()
    }

    /// Writes `value` under `key`.
    ///
    /// Write failures are swallowed and reported only as a warning.
    pub fn put(&self, store: Option<&str>, key: &str, value: &str) {
        let store = self.resolve_store(store);
        let mut manager = self.manager.lock();
        manager.ensure_ready();
        match manager.handle() {
            Some(handle) => {
                if let Err(e) = handle.put(&store, key, value) {
                    warn!(store = %store, key = %key, error = %e, "write failed, value dropped");
                }
            }
            None => self.fallback.put(&store, key, value),
        }
    }

    /// Reads the value under `key`; empty string if absent or on failure.
    pub fn get(&self, store: Option<&str>, key: &str) -> String {
        let store = self.resolve_store(store);
        let mut manager = self.manager.lock();
        manager.ensure_ready();
        match manager.handle() {
            Some(handle) => match handle.get(&store, key) {
                Ok(Some(value)) => value,
                Ok(None) => String::new(),
                Err(e) => {
                    warn!(store = %store, key = %key, error = %e, "read failed");
                    String::new()
                }
            },
            None => self.fallback.get(&store, key),
        }
    }

    /// Removes the record under `key`; no error if it was never present.
    pub fn delete(&self, store: Option<&str>, key: &str) {
        let store = self.resolve_store(store);
        let mut manager = self.manager.lock();
        manager.ensure_ready();
        match manager.handle() {
            Some(handle) => {
                if let Err(e) = handle.delete(&store, key) {
                    warn!(store = %store, key = %key, error = %e, "delete failed");
                }
            }
            None => self.fallback.delete(&store, key),
        }
    }

    /// Returns all keys in the store; empty on a missing store or failure.
    pub fn list_keys(&self, store: Option<&str>) -> Vec<String> {
        let store = self.resolve_store(store);
        let mut manager = self.manager.lock();
        manager.ensure_ready();
        match manager.handle() {
            Some(handle) => match handle.keys(&store) {
                Ok(keys) => keys,
                Err(e) => {
                    warn!(store = %store, error = %e, "key listing failed");
                    Vec::new()
                }
            },
            None => self.fallback.keys(&store),
        }
    }

    /// Returns the number of records in the store; 0 on a missing store or
    /// failure.
    pub fn count(&self, store: Option<&str>) -> usize {
        let store = self.resolve_store(store);
        let mut manager = self.manager.lock();
        manager.ensure_ready();
        match manager.handle() {
            Some(handle) => match handle.count(&store) {
                Ok(count) => count,
                Err(e) => {
                    warn!(store = %store, error = %e, "count failed");
                    0
                }
            },
            None => self.fallback.count(&store),
        }
    }

    /// Removes every record in the store without removing the store.
    pub fn clear(&self, store: Option<&str>) {
        let store = self.resolve_store(store);
        let mut manager = self.manager.lock();
        manager.ensure_ready();
        match manager.handle() {
            Some(handle) => {
                if let Err(e) = handle.clear(&store) {
                    warn!(store = %store, error = %e, "clear failed");
                }
            }
            None => self.fallback.clear(&store),
        }
    }

    /// Creates a store, raising the database version by one.
    ///
    /// `options` is a JSON fragment such as `{"keyPath": "id"}`; a
    /// malformed fragment creates the store with default options rather
    /// than failing. Creating an existing store is a no-op that still
    /// raises the version.
    pub fn create_store(&self, name: &str, options: &str) {
        let options = parse_store_options(options);
        let mut manager = self.manager.lock();
        manager.ensure_ready();
        if manager.is_ready() {
            let store = name.to_string();
            let mut upgrade = |schema: &mut dyn SchemaEditor| {
                if !schema.has_store(&store) {
                    schema.create_store(&store, &options);
                }
            };
            manager.reopen_with_new_version(1, &mut upgrade);
            if manager.is_ready() {
                return;
            }
        }
        self.fallback.create_store(name);
    }

    /// Deletes a store and its records, raising the database version by
    /// one. Deleting an absent store is a no-op.
    pub fn delete_store(&self, name: &str) {
        let mut manager = self.manager.lock();
        manager.ensure_ready();
        if manager.is_ready() {
            let store = name.to_string();
            let mut upgrade = |schema: &mut dyn SchemaEditor| {
                if schema.has_store(&store) {
                    schema.delete_store(&store);
                }
            };
            manager.reopen_with_new_version(1, &mut upgrade);
            if manager.is_ready() {
                return;
            }
        }
        self.fallback.delete_store(name);
    }

    /// Deletes the entire database and re-initializes an empty one.
    ///
    /// The fallback snapshot is reset as well, so both surfaces come back
    /// empty.
    pub fn wipe_database(&self) {
        self.manager.lock().delete_database();
        self.fallback.reset();
    }

    /// Returns the names of all stores; degraded mode enumerates the
    /// snapshot's mapping instead.
    pub fn list_stores(&self) -> Vec<String> {
        let mut manager = self.manager.lock();
        manager.ensure_ready();
        match manager.handle() {
            Some(handle) => handle.store_names(),
            None => self.fallback.store_names(),
        }
    }

    /// Closes the connection. The next operation re-opens it.
    pub fn close(&self) {
        self.manager.lock().close();
    }

    fn resolve_store(&self, store: Option<&str>) -> String {
        match store {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => self.default_store.read().clone(),
        }
    }
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("database_name", &self.database_name)
            .field("default_store", &*self.default_store.read())
            .field("state", &self.manager.lock().state())
            .finish_non_exhaustive()
    }
}

impl Drop for StorageClient {
    fn drop(&mut self) {
        self.manager.lock().close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stashdb_storage::{
        DatabaseHandle, EngineError, EngineResult, MemoryEngine, MemorySlot, VersionRequest,
    };
    use std::sync::atomic::{AtomicBool, Ordering};

    /// An engine that always refuses to open.
    struct BrokenEngine;

    impl StorageEngine for BrokenEngine {
        fn open(
            &self,
            _name: &str,
            _version: VersionRequest,
            _upgrade: &mut dyn FnMut(&mut dyn SchemaEditor),
        ) -> EngineResult<Box<dyn DatabaseHandle>> {
            Err(EngineError::unavailable("engine offline"))
        }

        fn delete_database(&self, _name: &str) -> EngineResult<()> {
            Err(EngineError::unavailable("engine offline"))
        }
    }

    /// Delegates to a memory engine until switched into a failing mode.
    struct FlakyEngine {
        inner: MemoryEngine,
        failing: AtomicBool,
    }

    impl FlakyEngine {
        fn new() -> Self {
            Self {
                inner: MemoryEngine::new(),
                failing: AtomicBool::new(false),
            }
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    impl StorageEngine for FlakyEngine {
        fn open(
            &self,
            name: &str,
            version: VersionRequest,
            upgrade: &mut dyn FnMut(&mut dyn SchemaEditor),
        ) -> EngineResult<Box<dyn DatabaseHandle>> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(EngineError::unavailable("engine offline"));
            }
            self.inner.open(name, version, upgrade)
        }

        fn delete_database(&self, name: &str) -> EngineResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(EngineError::unavailable("engine offline"));
            }
            self.inner.delete_database(name)
        }
    }

    fn memory_client() -> StorageClient {
        StorageClient::new(
            Arc::new(MemoryEngine::new()),
            Box::new(MemorySlot::new()),
            Config::default(),
        )
    }

    fn degraded_client() -> StorageClient {
        StorageClient::new(
            Arc::new(BrokenEngine),
            Box::new(MemorySlot::new()),
            Config::default(),
        )
    }

    #[test]
    fn unwritten_key_reads_empty() {
        let client = memory_client();
        assert_eq!(client.get(None, "never"), "");
        assert_eq!(client.get(Some("ghost"), "never"), "");
    }

    #[test]
    fn put_then_get_roundtrip() {
        let client = memory_client();
        client.put(None, "player", "{\"hp\": 3}");
        assert_eq!(client.get(None, "player"), "{\"hp\": 3}");
    }

    #[test]
    fn put_then_get_roundtrip_degraded() {
        let client = degraded_client();
        assert!(!client.is_available());

        client.put(None, "player", "{\"hp\": 3}");
        assert_eq!(client.get(None, "player"), "{\"hp\": 3}");
    }

    #[test]
    fn delete_then_get_reads_empty() {
        let client = memory_client();
        client.put(None, "k", "v");
        client.delete(None, "k");
        assert_eq!(client.get(None, "k"), "");

        // Deleting an absent key is a no-op.
        client.delete(None, "k");
        client.delete(Some("ghost"), "k");
    }

    #[test]
    fn list_keys_contains_written_keys() {
        let client = memory_client();
        client.put(None, "a", "1");
        client.put(None, "b", "2");

        let keys = client.list_keys(None);
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&"a".to_string()));
        assert!(keys.contains(&"b".to_string()));
    }

    #[test]
    fn count_tracks_puts_minus_deletes() {
        let client = memory_client();
        assert_eq!(client.count(None), 0);

        client.put(None, "a", "1");
        client.put(None, "b", "2");
        client.put(None, "a", "replaced");
        assert_eq!(client.count(None), 2);

        client.delete(None, "a");
        assert_eq!(client.count(None), 1);
    }

    #[test]
    fn clear_leaves_other_stores_untouched() {
        let client = memory_client();
        client.create_store("scores", "");
        client.put(None, "k", "v");
        client.put(Some("scores"), "alice", "10");

        client.clear(None);

        assert_eq!(client.count(None), 0);
        assert!(client.list_keys(None).is_empty());
        assert_eq!(client.count(Some("scores")), 1);
    }

    #[test]
    fn create_store_appears_in_listing() {
        let client = memory_client();
        client.create_store("scores", "");

        assert!(client.list_stores().contains(&"scores".to_string()));
        assert_eq!(client.database_version(), 2);
    }

    #[test]
    fn create_store_twice_is_idempotent() {
        let client = memory_client();
        client.create_store("scores", "");
        client.put(Some("scores"), "alice", "10");

        client.create_store("scores", "");

        let stores = client.list_stores();
        assert_eq!(
            stores.iter().filter(|s| s.as_str() == "scores").count(),
            1
        );
        assert_eq!(client.get(Some("scores"), "alice"), "10");
    }

    #[test]
    fn delete_store_disappears_from_listing() {
        let client = memory_client();
        client.create_store("scores", "");
        client.delete_store("scores");

        assert!(!client.list_stores().contains(&"scores".to_string()));

        // Deleting an absent store is a no-op.
        client.delete_store("scores");
    }

    #[test]
    fn malformed_options_still_create_the_store() {
        let client = memory_client();
        client.create_store("scores", "keyPath=id");

        assert!(client.list_stores().contains(&"scores".to_string()));
        client.put(Some("scores"), "k", "v");
        assert_eq!(client.get(Some("scores"), "k"), "v");
    }

    #[test]
    fn wipe_database_resets_every_store() {
        let client = memory_client();
        client.create_store("scores", "");
        client.put(None, "k", "v");
        client.put(Some("scores"), "alice", "10");

        client.wipe_database();

        assert!(client.is_available());
        assert_eq!(client.database_version(), 1);
        assert_eq!(client.count(None), 0);
        assert_eq!(client.count(Some("scores")), 0);
        assert_eq!(client.list_stores(), vec!["default"]);
    }

    #[test]
    fn writes_survive_wipe_then_put() {
        let client = memory_client();
        client.put(None, "k", "old");
        client.wipe_database();

        client.put(None, "k", "new");
        assert_eq!(client.get(None, "k"), "new");
    }

    #[test]
    fn put_to_unknown_store_is_swallowed() {
        let client = memory_client();
        client.put(Some("ghost"), "k", "v");

        assert_eq!(client.get(Some("ghost"), "k"), "");
        assert_eq!(client.count(Some("ghost")), 0);
        assert!(client.list_keys(Some("ghost")).is_empty());
    }

    #[test]
    fn quota_failure_is_swallowed() {
        let client = StorageClient::new(
            Arc::new(MemoryEngine::with_record_limit(1)),
            Box::new(MemorySlot::new()),
            Config::default(),
        );

        client.put(None, "a", "1");
        client.put(None, "b", "2");

        assert_eq!(client.get(None, "a"), "1");
        assert_eq!(client.get(None, "b"), "");
        assert_eq!(client.count(None), 1);
    }

    #[test]
    fn degraded_schema_operations_use_snapshot() {
        let client = degraded_client();

        client.create_store("scores", "");
        assert!(client.list_stores().contains(&"scores".to_string()));

        client.put(Some("scores"), "alice", "10");
        assert_eq!(client.count(Some("scores")), 1);

        client.delete_store("scores");
        assert!(!client.list_stores().contains(&"scores".to_string()));
    }

    #[test]
    fn degraded_wipe_resets_snapshot() {
        let client = degraded_client();
        client.put(None, "k", "v");
        client.put(Some("other"), "k", "v");

        client.wipe_database();

        assert_eq!(client.count(None), 0);
        assert_eq!(client.count(Some("other")), 0);
    }

    #[test]
    fn degraded_clear_and_keys() {
        let client = degraded_client();
        client.put(None, "b", "2");
        client.put(None, "a", "1");

        assert_eq!(client.list_keys(None), vec!["a", "b"]);
        client.clear(None);
        assert_eq!(client.count(None), 0);
        assert!(client.list_stores().contains(&"default".to_string()));
    }

    #[test]
    fn mid_session_failure_degrades_without_raising() {
        let engine = Arc::new(FlakyEngine::new());
        let client = StorageClient::new(
            engine.clone(),
            Box::new(MemorySlot::new()),
            Config::default(),
        );

        client.put(None, "early", "primary-value");
        assert!(client.is_available());

        client.close();
        engine.set_failing(true);

        // One retry per operation, then the fallback serves.
        assert_eq!(client.get(None, "early"), "");
        assert!(!client.is_available());

        client.put(None, "late", "fallback-value");
        assert_eq!(client.get(None, "late"), "fallback-value");
    }

    #[test]
    fn primary_data_returns_after_recovery() {
        let engine = Arc::new(FlakyEngine::new());
        let client = StorageClient::new(
            engine.clone(),
            Box::new(MemorySlot::new()),
            Config::default(),
        );
        client.put(None, "early", "primary-value");

        client.close();
        engine.set_failing(true);
        assert_eq!(client.get(None, "early"), "");

        engine.set_failing(false);
        assert_eq!(client.get(None, "early"), "primary-value");
        assert!(client.is_available());
    }

    #[test]
    fn default_store_can_be_switched() {
        let client = memory_client();
        client.create_store("saves", "");

        client.set_default_store("saves");
        assert_eq!(client.default_store(), "saves");

        client.put(None, "slot1", "data");
        assert_eq!(client.get(Some("saves"), "slot1"), "data");
        assert_eq!(client.get(Some("default"), "slot1"), "");
    }

    #[test]
    fn blank_store_name_resolves_to_default() {
        let client = memory_client();
        client.put(Some(""), "k", "v");
        client.put(Some("  "), "k2", "v2");

        assert_eq!(client.get(None, "k"), "v");
        assert_eq!(client.get(None, "k2"), "v2");
    }

    #[test]
    fn connection_state_is_observable() {
        let client = memory_client();
        assert_eq!(client.connection_state(), ConnectionState::Ready);

        let degraded = degraded_client();
        assert_eq!(degraded.connection_state(), ConnectionState::Degraded);
    }
}
