//! Lineage store errors
//!
//! Every store error is fatal to the backup run: without a trustworthy
//! ledger the tool can neither record new backups nor decide what to
//! rotate out.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for lineage store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by a lineage store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be opened
    #[error("Unable to open lineage store {path}: {source}")]
    Open {
        /// Database path
        path: PathBuf,
        /// Underlying error
        source: rusqlite::Error,
    },

    /// The file exists but is not an SQLite database
    #[error("Lineage store is not a database file")]
    NotADatabase,

    /// An existing backups table does not match the expected columns
    #[error("Backups table has incorrect schema: expected [{expected}], found [{found}]")]
    SchemaMismatch {
        /// Expected column list
        expected: String,
        /// Column list found on disk
        found: String,
    },

    /// A stored row could not be decoded
    #[error("Invalid lineage row {id}: {reason}")]
    InvalidRow {
        /// Row id
        id: i64,
        /// What was wrong with it
        reason: String,
    },

    /// Any other database failure
    #[error("Lineage store error: {0}")]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::NotADatabase) => StoreError::NotADatabase,
            _ => StoreError::Sqlite(e),
        }
    }
}
