//! Error types for the core.
//!
//! These errors never cross the [`StorageClient`](crate::StorageClient)
//! boundary: the facade converts every failure into a sentinel result at the
//! point of detection. They exist for the internal plumbing between the
//! fallback store, its slot, and the engine.

use stashdb_storage::EngineError;
use thiserror::Error;

/// Result type for internal core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur inside the core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage engine or fallback slot error.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// The fallback snapshot could not be encoded or decoded.
    #[error("snapshot codec error: {0}")]
    Snapshot(#[from] serde_json::Error),
}
