//! Retention-driven rotation of old backups
//!
//! After each successful upload the newest `retention_count + 1` active
//! entries for the directory are kept (the one just written plus
//! `retention_count` older ones). Everything older is deleted from the
//! remote store and then soft-deleted in the ledger.
//!
//! Remote deletes are best effort: a failure is reported, the entry stays
//! active, and the pass moves on to the next entry. A failed entry is
//! picked up again by the next rotation of the same directory. Ledger
//! failures abort the pass.

use crate::error::StoreResult;
use crate::store::LineageStore;
use frostline_core::LineageEntry;
use frostline_transfer::{
    ClientError, TracingObserver, TransferClient, TransferEvent, TransferObserver,
};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// How many backups of each directory to keep
#[derive(Clone)]
pub struct RotationPolicy {
    retention_count: usize,
    observer: Arc<dyn TransferObserver>,
}

impl std::fmt::Debug for RotationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationPolicy")
            .field("retention_count", &self.retention_count)
            .finish()
    }
}

/// Outcome of one rotation pass
#[derive(Debug, Default)]
pub struct RotationReport {
    /// Active entries before the pass
    pub active_before: usize,
    /// Archive ids deleted remotely and soft-deleted in the ledger
    pub deleted: Vec<String>,
    /// Archive ids whose remote delete failed; still active
    pub failed: Vec<(String, ClientError)>,
}

impl RotationReport {
    /// True when every expired entry was removed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl RotationPolicy {
    /// Keep `retention_count` older backups besides the newest one
    pub fn new(retention_count: usize) -> Self {
        RotationPolicy {
            retention_count,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Report rotation progress to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Configured number of older backups to keep
    pub fn retention_count(&self) -> usize {
        self.retention_count
    }

    /// Total active entries that survive a pass
    pub fn keep(&self) -> usize {
        self.retention_count.saturating_add(1)
    }

    /// Entries to remove from an oldest-first active list
    pub fn expired<'a>(&self, active: &'a [LineageEntry]) -> &'a [LineageEntry] {
        let excess = active.len().saturating_sub(self.keep());
        &active[..excess]
    }

    /// Run one rotation pass for `directory`
    pub fn rotate(
        &self,
        directory: &Path,
        client: &dyn TransferClient,
        store: &dyn LineageStore,
    ) -> StoreResult<RotationReport> {
        let active = store.list_active(directory)?;
        let expired = self.expired(&active);

        let mut report = RotationReport {
            active_before: active.len(),
            ..RotationReport::default()
        };

        self.observer.on_event(&TransferEvent::RotationPlanned {
            directory: directory.to_path_buf(),
            active: active.len(),
            expired: expired.len(),
        });

        for entry in expired {
            match client.delete_remote(&entry.vault, &entry.remote_archive_id) {
                Ok(()) => {
                    if !store.soft_delete(&entry.remote_archive_id)? {
                        debug!(
                            archive_id = %entry.remote_archive_id,
                            "Entry was already marked deleted"
                        );
                    }
                    self.observer.on_event(&TransferEvent::RemoteDeleted {
                        directory: directory.to_path_buf(),
                        archive_id: entry.remote_archive_id.clone(),
                    });
                    report.deleted.push(entry.remote_archive_id.clone());
                }
                Err(error) => {
                    self.observer.on_event(&TransferEvent::RemoteDeleteFailed {
                        directory: directory.to_path_buf(),
                        archive_id: entry.remote_archive_id.clone(),
                        error: error.clone(),
                    });
                    report.failed.push((entry.remote_archive_id.clone(), error));
                }
            }
        }

        Ok(report)
    }
}
