//! File-based storage engine for persistent databases.
//!
//! Each database is a directory under the engine root:
//!
//! ```text
//! <root>/<database>/
//! ├─ LOCK          # Advisory lock, one live handle per database
//! ├─ SCHEMA        # Version and store registry
//! └─ stores.db     # CBOR snapshot of all records
//! ```
//!
//! The LOCK file ensures only one connection can serve a database at a
//! time. SCHEMA and stores.db are written with the write-temp/rename/fsync
//! pattern so a crash never leaves a half-written file behind.

use crate::engine::{DatabaseHandle, SchemaEditor, StorageEngine, VersionRequest};
use crate::error::{EngineError, EngineResult};
use crate::schema::Schema;
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File names within a database directory.
const LOCK_FILE: &str = "LOCK";
const SCHEMA_FILE: &str = "SCHEMA";
const SCHEMA_TEMP: &str = "SCHEMA.tmp";
const DATA_FILE: &str = "stores.db";
const DATA_TEMP: &str = "stores.db.tmp";

type Records = BTreeMap<String, BTreeMap<String, String>>;

/// A persistent storage engine rooted at a directory.
///
/// # Example
///
/// ```no_run
/// use stashdb_storage::{FileEngine, StorageEngine, VersionRequest};
///
/// let engine = FileEngine::new("stash_data");
/// let handle = engine
///     .open("game", VersionRequest::Latest, &mut |schema| {
///         schema.create_store("default", &Default::default());
///     })
///     .unwrap();
/// handle.put("default", "player", "{}").unwrap();
/// ```
#[derive(Debug)]
pub struct FileEngine {
    root: PathBuf,
}

impl FileEngine {
    /// Creates an engine rooted at the given directory.
    ///
    /// The directory is created lazily on first open.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the engine root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn database_dir(&self, name: &str) -> EngineResult<PathBuf> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(EngineError::unavailable(format!(
                "invalid database name: {name:?}"
            )));
        }
        Ok(self.root.join(name))
    }
}

impl StorageEngine for FileEngine {
    fn open(
        &self,
        name: &str,
        version: VersionRequest,
        upgrade: &mut dyn FnMut(&mut dyn SchemaEditor),
    ) -> EngineResult<Box<dyn DatabaseHandle>> {
        let dir = self.database_dir(name)?;
        fs::create_dir_all(&dir)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(EngineError::Blocked);
        }

        let stored = load_schema(&dir)?;
        let (schema, upgraded) = match (version, stored) {
            (VersionRequest::Latest, Some(schema)) => (schema, false),
            (VersionRequest::Latest, None) => {
                let mut schema = Schema::new(1);
                upgrade(&mut schema);
                (schema, true)
            }
            (VersionRequest::Exact(requested), None) => {
                let mut schema = Schema::new(requested);
                upgrade(&mut schema);
                (schema, true)
            }
            (VersionRequest::Exact(requested), Some(mut schema)) => {
                if requested < schema.version {
                    return Err(EngineError::version_conflict(requested, schema.version));
                }
                if requested == schema.version {
                    (schema, false)
                } else {
                    schema.version = requested;
                    upgrade(&mut schema);
                    (schema, true)
                }
            }
        };

        let mut records = load_records(&dir)?;
        records.retain(|store, _| schema.stores.contains_key(store));
        for store in schema.stores.keys() {
            records.entry(store.clone()).or_default();
        }

        if upgraded {
            save_schema(&dir, &schema)?;
            save_records(&dir, &records)?;
            debug!(database = %name, version = schema.version, "schema written");
        }

        Ok(Box::new(FileHandle {
            name: name.to_string(),
            dir,
            schema,
            records: RwLock::new(records),
            closed: RwLock::new(false),
            lock: Mutex::new(Some(lock_file)),
        }))
    }

    fn delete_database(&self, name: &str) -> EngineResult<()> {
        let dir = self.database_dir(name)?;
        if !dir.exists() {
            return Ok(());
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(EngineError::Blocked);
        }
        // The lock must be released before its file can be removed.
        drop(lock_file);

        fs::remove_dir_all(&dir)?;
        debug!(database = %name, "database removed");
        Ok(())
    }

    fn request_persistence(&self) -> bool {
        fs::create_dir_all(&self.root).is_ok() && sync_dir(&self.root).is_ok()
    }
}

struct FileHandle {
    name: String,
    dir: PathBuf,
    schema: Schema,
    records: RwLock<Records>,
    closed: RwLock<bool>,
    /// Lock file handle, released on close.
    lock: Mutex<Option<File>>,
}

impl FileHandle {
    fn ensure_store(&self, store: &str) -> EngineResult<()> {
        if *self.closed.read() {
            return Err(EngineError::Closed);
        }
        if !self.schema.stores.contains_key(store) {
            return Err(EngineError::store_not_found(store));
        }
        Ok(())
    }
}

impl DatabaseHandle for FileHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u64 {
        self.schema.version
    }

    fn get(&self, store: &str, key: &str) -> EngineResult<Option<String>> {
        self.ensure_store(store)?;
        let records = self.records.read();
        Ok(records.get(store).and_then(|s| s.get(key).cloned()))
    }

    fn put(&self, store: &str, key: &str, value: &str) -> EngineResult<()> {
        self.ensure_store(store)?;
        let mut records = self.records.write();
        records
            .entry(store.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        save_records(&self.dir, &records)
    }

    fn delete(&self, store: &str, key: &str) -> EngineResult<()> {
        self.ensure_store(store)?;
        let mut records = self.records.write();
        let removed = records
            .get_mut(store)
            .is_some_and(|s| s.remove(key).is_some());
        if removed {
            save_records(&self.dir, &records)?;
        }
        Ok(())
    }

    fn keys(&self, store: &str) -> EngineResult<Vec<String>> {
        self.ensure_store(store)?;
        let records = self.records.read();
        Ok(records
            .get(store)
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn count(&self, store: &str) -> EngineResult<usize> {
        self.ensure_store(store)?;
        let records = self.records.read();
        Ok(records.get(store).map(BTreeMap::len).unwrap_or(0))
    }

    fn clear(&self, store: &str) -> EngineResult<()> {
        self.ensure_store(store)?;
        let mut records = self.records.write();
        if let Some(s) = records.get_mut(store) {
            if !s.is_empty() {
                s.clear();
                save_records(&self.dir, &records)?;
            }
        }
        Ok(())
    }

    fn store_names(&self) -> Vec<String> {
        if *self.closed.read() {
            return Vec::new();
        }
        self.schema.store_names()
    }

    fn close(&self) {
        let mut closed = self.closed.write();
        if *closed {
            return;
        }
        *closed = true;
        // Dropping the lock file releases the advisory lock.
        self.lock.lock().take();
    }
}

fn load_schema(dir: &Path) -> EngineResult<Option<Schema>> {
    let path = dir.join(SCHEMA_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read(&path)?;
    if data.is_empty() {
        return Ok(None);
    }
    Ok(Some(Schema::decode(&data)?))
}

fn save_schema(dir: &Path, schema: &Schema) -> EngineResult<()> {
    let temp = dir.join(SCHEMA_TEMP);
    let mut file = File::create(&temp)?;
    file.write_all(&schema.encode())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp, dir.join(SCHEMA_FILE))?;
    sync_dir(dir)
}

fn load_records(dir: &Path) -> EngineResult<Records> {
    let path = dir.join(DATA_FILE);
    if !path.exists() {
        return Ok(Records::new());
    }
    let file = File::open(&path)?;
    if file.metadata()?.len() == 0 {
        return Ok(Records::new());
    }
    ciborium::de::from_reader(BufReader::new(file)).map_err(|e| match e {
        ciborium::de::Error::Io(io) => EngineError::Io(io),
        other => EngineError::corrupted(format!("record data unreadable: {other}")),
    })
}

fn save_records(dir: &Path, records: &Records) -> EngineResult<()> {
    let temp = dir.join(DATA_TEMP);
    let file = File::create(&temp)?;
    let mut writer = BufWriter::new(file);
    ciborium::ser::into_writer(records, &mut writer).map_err(|e| match e {
        ciborium::ser::Error::Io(io) => EngineError::Io(io),
        other => EngineError::corrupted(format!("record data encode failed: {other}")),
    })?;
    let file = writer
        .into_inner()
        .map_err(|e| EngineError::Io(e.into_error()))?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp, dir.join(DATA_FILE))?;
    sync_dir(dir)
}

/// Syncs a directory so renames within it are durable.
#[cfg(unix)]
fn sync_dir(path: &Path) -> EngineResult<()> {
    let dir = File::open(path)?;
    dir.sync_all()?;
    Ok(())
}

/// Windows NTFS journaling covers metadata durability; no directory fsync.
#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> EngineResult<()> {
    Ok(())
}
