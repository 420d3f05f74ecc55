//! Error types for the document store.
//!
//! Relational failures have their own type,
//! [`ExecutionError`](crate::executor::ExecutionError), because callers
//! degrade them to a flag while document failures are surfaced.

use std::path::PathBuf;

/// Errors that can occur while loading or saving documents.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading, writing, or renaming a document file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A document could not be encoded or decoded as JSON.
    #[error("serialization error on {}: {source}", path.display())]
    Serialization {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Two records in one collection share an identifier.
    #[error("duplicate identifier {id} in {collection}")]
    DuplicateId {
        /// Collection name.
        collection: &'static str,
        /// The repeated identifier.
        id: String,
    },

    /// The identifier space of a collection is used up.
    #[error("no identifiers left in {collection}")]
    IdExhausted {
        /// Collection name.
        collection: &'static str,
    },
}
