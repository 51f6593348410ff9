//! In-memory storage engine for testing and ephemeral hosts.

use crate::engine::{DatabaseHandle, SchemaEditor, StorageEngine, VersionRequest};
use crate::error::{EngineError, EngineResult};
use crate::schema::Schema;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

type Records = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug)]
struct MemoryDatabase {
    schema: Schema,
    records: Records,
    open_handles: usize,
}

/// An in-memory storage engine.
///
/// Databases live in a process-local registry shared by clones of the
/// engine. Suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral databases that don't need persistence
///
/// Version semantics match the persistent engine: raising a database's
/// version while another handle is outstanding reports
/// [`EngineError::Blocked`].
///
/// # Example
///
/// ```rust
/// use stashdb_storage::{MemoryEngine, StorageEngine, VersionRequest};
///
/// let engine = MemoryEngine::new();
/// let handle = engine
///     .open("demo", VersionRequest::Latest, &mut |schema| {
///         schema.create_store("default", &Default::default());
///     })
///     .unwrap();
/// assert_eq!(handle.version(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    registry: Arc<RwLock<HashMap<String, MemoryDatabase>>>,
    record_limit: Option<usize>,
}

impl MemoryEngine {
    /// Creates a new engine with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine that rejects writes once a database holds `limit`
    /// records, reporting [`EngineError::QuotaExceeded`].
    ///
    /// Useful for testing quota behavior.
    #[must_use]
    pub fn with_record_limit(limit: usize) -> Self {
        Self {
            registry: Arc::default(),
            record_limit: Some(limit),
        }
    }

    /// Returns the names of all databases in the registry.
    #[must_use]
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.read().keys().cloned().collect();
        names.sort();
        names
    }
}

fn reconcile(records: &mut Records, schema: &Schema) {
    records.retain(|name, _| schema.stores.contains_key(name));
    for name in schema.stores.keys() {
        records.entry(name.clone()).or_default();
    }
}

impl StorageEngine for MemoryEngine {
    fn open(
        &self,
        name: &str,
        version: VersionRequest,
        upgrade: &mut dyn FnMut(&mut dyn crate::engine::SchemaEditor),
    ) -> EngineResult<Box<dyn DatabaseHandle>> {
        let mut registry = self.registry.write();
        let stored = registry.get(name).map(|db| db.schema.version);

        match (version, stored) {
            // Fresh database: created at the requested version (or 1),
            // with the upgrade callback defining the initial stores.
            (VersionRequest::Latest, None) | (VersionRequest::Exact(_), None) => {
                let target = match version {
                    VersionRequest::Exact(v) => v,
                    VersionRequest::Latest => 1,
                };
                let mut schema = Schema::new(target);
                upgrade(&mut schema);
                let mut records = Records::new();
                reconcile(&mut records, &schema);
                registry.insert(
                    name.to_string(),
                    MemoryDatabase {
                        schema,
                        records,
                        open_handles: 0,
                    },
                );
            }
            (VersionRequest::Latest, Some(_)) => {}
            (VersionRequest::Exact(requested), Some(stored)) => {
                if requested < stored {
                    return Err(EngineError::version_conflict(requested, stored));
                }
                if requested > stored {
                    let db = registry
                        .get_mut(name)
                        .ok_or_else(|| EngineError::unavailable("database vanished"))?;
                    if db.open_handles > 0 {
                        return Err(EngineError::Blocked);
                    }
                    db.schema.version = requested;
                    upgrade(&mut db.schema);
                    reconcile(&mut db.records, &db.schema);
                }
            }
        }

        let db = registry
            .get_mut(name)
            .ok_or_else(|| EngineError::unavailable("database vanished"))?;
        db.open_handles += 1;

        Ok(Box::new(MemoryHandle {
            name: name.to_string(),
            version: db.schema.version,
            registry: Arc::clone(&self.registry),
            record_limit: self.record_limit,
            closed: RwLock::new(false),
        }))
    }

    fn delete_database(&self, name: &str) -> EngineResult<()> {
        let mut registry = self.registry.write();
        match registry.get(name) {
            None => Ok(()),
            Some(db) if db.open_handles > 0 => Err(EngineError::Blocked),
            Some(_) => {
                registry.remove(name);
                Ok(())
            }
        }
    }
}

struct MemoryHandle {
    name: String,
    version: u64,
    registry: Arc<RwLock<HashMap<String, MemoryDatabase>>>,
    record_limit: Option<usize>,
    closed: RwLock<bool>,
}

impl MemoryHandle {
    fn ensure_open(&self) -> EngineResult<()> {
        if *self.closed.read() {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    fn read_store<T>(
        &self,
        store: &str,
        f: impl FnOnce(&BTreeMap<String, String>) -> T,
    ) -> EngineResult<T> {
        self.ensure_open()?;
        let registry = self.registry.read();
        let db = registry
            .get(&self.name)
            .ok_or_else(|| EngineError::unavailable("database deleted"))?;
        let records = db
            .records
            .get(store)
            .ok_or_else(|| EngineError::store_not_found(store))?;
        Ok(f(records))
    }

    fn write_store<T>(
        &self,
        store: &str,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> T,
    ) -> EngineResult<T> {
        self.ensure_open()?;
        let mut registry = self.registry.write();
        let db = registry
            .get_mut(&self.name)
            .ok_or_else(|| EngineError::unavailable("database deleted"))?;
        let records = db
            .records
            .get_mut(store)
            .ok_or_else(|| EngineError::store_not_found(store))?;
        Ok(f(records))
    }
}

impl DatabaseHandle for MemoryHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn get(&self, store: &str, key: &str) -> EngineResult<Option<String>> {
        self.read_store(store, |records| records.get(key).cloned())
    }

    fn put(&self, store: &str, key: &str, value: &str) -> EngineResult<()> {
        if let Some(limit) = self.record_limit {
            self.ensure_open()?;
            let registry = self.registry.read();
            let db = registry
                .get(&self.name)
                .ok_or_else(|| EngineError::unavailable("database deleted"))?;
            let total: usize = db.records.values().map(BTreeMap::len).sum();
            let replacing = db
                .records
                .get(store)
                .is_some_and(|records| records.contains_key(key));
            if total >= limit && !replacing {
                return Err(EngineError::QuotaExceeded);
            }
        }
        self.write_store(store, |records| {
            records.insert(key.to_string(), value.to_string());
        })
    }

    fn delete(&self, store: &str, key: &str) -> EngineResult<()> {
        self.write_store(store, |records| {
            records.remove(key);
        })
    }

    fn keys(&self, store: &str) -> EngineResult<Vec<String>> {
        self.read_store(store, |records| records.keys().cloned().collect())
    }

    fn count(&self, store: &str) -> EngineResult<usize> {
        self.read_store(store, BTreeMap::len)
    }

    fn clear(&self, store: &str) -> EngineResult<()> {
        self.write_store(store, BTreeMap::clear)
    }

    fn store_names(&self) -> Vec<String> {
        if self.ensure_open().is_err() {
            return Vec::new();
        }
        let registry = self.registry.read();
        registry
            .get(&self.name)
            .map(|db| db.schema.store_names())
            .unwrap_or_default()
    }

    fn close(&self) {
        let mut closed = self.closed.write();
        if *closed {
            return;
        }
        *closed = true;
        if let Some(db) = self.registry.write().get_mut(&self.name) {
            db.open_handles = db.open_handles.saturating_sub(1);
        }
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.close();
    }
}
