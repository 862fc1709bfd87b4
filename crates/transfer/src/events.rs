//! Structured transfer events
//!
//! Protocol code reports progress and failures as [`TransferEvent`]s handed
//! to an injected [`TransferObserver`]. [`TracingObserver`] narrates them
//! through `tracing`; tests use `testing::RecordingObserver`.

use crate::client::{ClientError, Operation};
use crate::engine::UploadState;
use frostline_core::{TransferPlan, TransferReceipt};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Something that happened during an upload or a rotation pass
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// Plan computed for an archive
    Planned {
        /// Archive name
        archive: String,
        /// Computed plan
        plan: TransferPlan,
    },
    /// Upload state machine moved to a new state
    StateChanged {
        /// Archive name
        archive: String,
        /// New state
        state: UploadState,
    },
    /// A client call failed
    AttemptFailed {
        /// Archive name
        archive: String,
        /// Failed call
        operation: Operation,
        /// 1-based attempt number
        attempt: u32,
        /// Configured attempt bound
        max_attempts: u32,
        /// Classified failure
        error: ClientError,
    },
    /// Waiting before the next attempt
    Retrying {
        /// Archive name
        archive: String,
        /// Call being retried
        operation: Operation,
        /// Attempt number about to start
        next_attempt: u32,
        /// Delay before it starts
        delay: Duration,
    },
    /// One part of a multi-part upload succeeded
    PartUploaded {
        /// Archive name
        archive: String,
        /// 0-based part index
        index: u64,
        /// Total parts
        part_count: u64,
    },
    /// Upload finished
    UploadCompleted {
        /// Archive name
        archive: String,
        /// Resulting receipt
        receipt: TransferReceipt,
    },
    /// Rotation pass selected entries for removal
    RotationPlanned {
        /// Source directory
        directory: PathBuf,
        /// Active entries before the pass
        active: usize,
        /// Entries selected for removal
        expired: usize,
    },
    /// An expired archive was deleted remotely and soft-deleted locally
    RemoteDeleted {
        /// Source directory
        directory: PathBuf,
        /// Remote archive id
        archive_id: String,
    },
    /// Deleting an expired archive failed; the entry stays active
    RemoteDeleteFailed {
        /// Source directory
        directory: PathBuf,
        /// Remote archive id
        archive_id: String,
        /// Classified failure
        error: ClientError,
    },
}

/// Sink for transfer events
pub trait TransferObserver: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: &TransferEvent);
}

/// Observer that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {
    fn on_event(&self, _event: &TransferEvent) {}
}

/// Observer that logs events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TransferObserver for TracingObserver {
    fn on_event(&self, event: &TransferEvent) {
        match event {
            TransferEvent::Planned { archive, plan } => {
                debug!(
                    archive = %archive,
                    size = plan.total_size,
                    parts = plan.part_count,
                    multi_part = plan.is_multi_part,
                    "Planned upload"
                );
            }
            TransferEvent::StateChanged { archive, state } => {
                debug!(archive = %archive, state = ?state, "Upload state changed");
            }
            TransferEvent::AttemptFailed {
                archive,
                operation,
                attempt,
                max_attempts,
                error,
            } => {
                warn!(
                    archive = %archive,
                    operation = %operation,
                    attempt,
                    max_attempts,
                    kind = %error.kind,
                    "Attempt failed: {}",
                    error.message
                );
            }
            TransferEvent::Retrying {
                archive,
                operation,
                next_attempt,
                delay,
            } => {
                debug!(
                    archive = %archive,
                    operation = %operation,
                    attempt = next_attempt,
                    delay_secs = delay.as_secs(),
                    "Retrying"
                );
            }
            TransferEvent::PartUploaded {
                archive,
                index,
                part_count,
            } => {
                debug!(archive = %archive, "Uploaded part {}/{}", index + 1, part_count);
            }
            TransferEvent::UploadCompleted { archive, receipt } => {
                info!(
                    archive = %archive,
                    archive_id = %receipt.remote_id,
                    size = receipt.size_bytes,
                    "Upload complete"
                );
            }
            TransferEvent::RotationPlanned {
                directory,
                active,
                expired,
            } => {
                debug!(
                    directory = %directory.display(),
                    active,
                    expired,
                    "Rotation pass"
                );
            }
            TransferEvent::RemoteDeleted {
                directory,
                archive_id,
            } => {
                info!(
                    directory = %directory.display(),
                    archive_id = %archive_id,
                    "Deleted old backup"
                );
            }
            TransferEvent::RemoteDeleteFailed {
                directory,
                archive_id,
                error,
            } => {
                warn!(
                    directory = %directory.display(),
                    archive_id = %archive_id,
                    "Could not delete old backup, will retry next run: {}",
                    error
                );
            }
        }
    }
}
