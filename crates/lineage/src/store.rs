//! Lineage store abstraction

use crate::error::StoreResult;
use frostline_core::{LineageEntry, NewLineageEntry};
use std::path::Path;

/// Append-only ledger of backups with soft deletion
///
/// Each call is applied atomically; implementations serialize writers so
/// entries from different directories never interleave partially.
pub trait LineageStore: Send + Sync {
    /// Record a completed upload
    ///
    /// Returns the stored entry with its row id and timestamp.
    fn append(&self, entry: NewLineageEntry) -> StoreResult<LineageEntry>;

    /// Non-deleted entries for `directory`, oldest first
    ///
    /// Age is insertion order, not the recorded timestamp.
    fn list_active(&self, directory: &Path) -> StoreResult<Vec<LineageEntry>>;

    /// Every entry for `directory`, deleted or not, oldest first
    fn history(&self, directory: &Path) -> StoreResult<Vec<LineageEntry>>;

    /// Mark the entry for `remote_archive_id` deleted
    ///
    /// Idempotent: returns `false` when nothing changed (unknown id or
    /// already deleted).
    fn soft_delete(&self, remote_archive_id: &str) -> StoreResult<bool>;
}
