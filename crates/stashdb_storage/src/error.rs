//! Error types for storage engines.

use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur at the storage engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine is missing, refused to start, or cannot serve requests.
    #[error("storage engine unavailable: {message}")]
    Unavailable {
        /// Description of why the engine is unavailable.
        message: String,
    },

    /// Another live connection prevents the requested open or delete.
    #[error("database blocked: another connection is open")]
    Blocked,

    /// The requested schema version is lower than the stored one.
    #[error("version conflict: requested {requested}, stored {stored}")]
    VersionConflict {
        /// The version the caller asked for.
        requested: u64,
        /// The version currently on record.
        stored: u64,
    },

    /// The named store is not part of the database schema.
    #[error("store not found: {name}")]
    StoreNotFound {
        /// Name of the missing store.
        name: String,
    },

    /// The engine refused the write for capacity reasons.
    #[error("storage quota exceeded")]
    QuotaExceeded,

    /// Persisted state could not be decoded.
    #[error("storage corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// The handle was closed and can no longer serve operations.
    #[error("database handle is closed")]
    Closed,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl EngineError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a corrupted error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates a store-not-found error.
    pub fn store_not_found(name: impl Into<String>) -> Self {
        Self::StoreNotFound { name: name.into() }
    }

    /// Creates a version conflict error.
    pub fn version_conflict(requested: u64, stored: u64) -> Self {
        Self::VersionConflict { requested, stored }
    }
}
