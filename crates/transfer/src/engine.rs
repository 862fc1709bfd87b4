//! Upload engine
//!
//! Drives one archive through the single-part or multi-part protocol:
//!
//! ```text
//! Planning ──► SinglePart ─────────────────────────────────────────────► Done
//!    │
//!    └──────► MultiPartInitiating ► MultiPartUploading ► MultiPartCompleting ► Done
//!
//! any state except Done ──(fatal failure or retries exhausted)──► Failed
//! ```
//!
//! Parts are uploaded strictly in ascending order, one at a time. Every
//! client call (initiation, each part, completion) has its own retry budget.
//! A failed multi-part session is abandoned, never resumed.

use crate::checksum::{tree_hash, tree_hash_blob};
use crate::client::{ClientError, Operation, RemoteArchive, TransferClient, UploadSession};
use crate::events::{TracingObserver, TransferEvent, TransferObserver};
use crate::retry::{RetryFailure, RetryPolicy};
use frostline_core::{ArchiveBlob, ChunkPlanner, PlanError, TransferPlan, TransferReceipt};
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for uploads
pub type UploadResult<T> = std::result::Result<T, UploadError>;

/// Upload state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// Computing the transfer plan
    Planning,
    /// Single-shot upload in progress
    SinglePart,
    /// Opening a multi-part session
    MultiPartInitiating,
    /// Uploading parts
    MultiPartUploading,
    /// Completing the multi-part session
    MultiPartCompleting,
    /// Upload finished
    Done,
    /// Upload abandoned
    Failed,
}

/// Why an upload did not produce a receipt
///
/// Every variant is scoped to the archive being uploaded; callers skip that
/// archive and carry on with the next one.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The archive could not be sized into parts
    #[error("Cannot plan upload of {archive}: {source}")]
    Planning {
        /// Archive name
        archive: String,
        /// Planner error
        source: PlanError,
    },

    /// A call kept failing transiently until the attempt bound was reached
    #[error("Cannot upload {archive}: {operation} failed after {attempts} attempts: {source}")]
    Exhausted {
        /// Archive name
        archive: String,
        /// Call that gave up
        operation: Operation,
        /// Attempts made
        attempts: u32,
        /// Last failure
        source: ClientError,
    },

    /// A call failed in a way that is not retried
    #[error("Cannot upload {archive}: {source}")]
    Fatal {
        /// Archive name
        archive: String,
        /// Call that failed
        operation: Operation,
        /// The failure
        source: ClientError,
    },

    /// Reading the archive contents failed
    #[error("Cannot read {archive}: {source}")]
    BlobRead {
        /// Archive name
        archive: String,
        /// Underlying I/O error
        source: io::Error,
    },
}

impl UploadError {
    /// Name of the archive the error belongs to
    pub fn archive(&self) -> &str {
        match self {
            UploadError::Planning { archive, .. }
            | UploadError::Exhausted { archive, .. }
            | UploadError::Fatal { archive, .. }
            | UploadError::BlobRead { archive, .. } => archive,
        }
    }
}

/// Sequential single/multi-part uploader with bounded retries
pub struct UploadEngine {
    client: Arc<dyn TransferClient>,
    part_size: u64,
    retry: RetryPolicy,
    observer: Arc<dyn TransferObserver>,
}

impl UploadEngine {
    /// Create an engine with the default retry policy and a tracing observer
    pub fn new(client: Arc<dyn TransferClient>, part_size: u64) -> Self {
        UploadEngine {
            client,
            part_size,
            retry: RetryPolicy::default(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Set the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the event observer
    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Configured part size
    pub fn part_size(&self) -> u64 {
        self.part_size
    }

    /// Upload `blob` to `vault`
    ///
    /// `description` is passed to the store unmodified.
    pub fn upload(
        &self,
        blob: &dyn ArchiveBlob,
        vault: &str,
        description: &str,
    ) -> UploadResult<TransferReceipt> {
        let archive = blob.name();
        self.transition(archive, UploadState::Planning);

        match self.drive(blob, vault, description) {
            Ok(receipt) => {
                self.transition(archive, UploadState::Done);
                self.observer.on_event(&TransferEvent::UploadCompleted {
                    archive: archive.to_string(),
                    receipt: receipt.clone(),
                });
                Ok(receipt)
            }
            Err(e) => {
                self.transition(archive, UploadState::Failed);
                Err(e)
            }
        }
    }

    fn drive(
        &self,
        blob: &dyn ArchiveBlob,
        vault: &str,
        description: &str,
    ) -> UploadResult<TransferReceipt> {
        let archive = blob.name();
        let plan = ChunkPlanner::plan(blob.size(), self.part_size).map_err(|source| {
            UploadError::Planning {
                archive: archive.to_string(),
                source,
            }
        })?;
        self.observer.on_event(&TransferEvent::Planned {
            archive: archive.to_string(),
            plan,
        });

        let remote = if plan.is_multi_part {
            self.upload_multi_part(blob, &plan, vault, description)?
        } else {
            self.upload_single_part(blob, &plan, vault, description)?
        };

        Ok(TransferReceipt {
            remote_id: remote.archive_id,
            remote_location: remote.location,
            is_multi_part: plan.is_multi_part,
            size_bytes: plan.total_size,
        })
    }

    fn upload_single_part(
        &self,
        blob: &dyn ArchiveBlob,
        plan: &TransferPlan,
        vault: &str,
        description: &str,
    ) -> UploadResult<RemoteArchive> {
        let archive = blob.name();
        self.transition(archive, UploadState::SinglePart);

        let body = read(blob, 0, plan.total_size)?;
        self.retry
            .run(archive, Operation::UploadSingle, self.observer.as_ref(), |_| {
                self.client.upload_single(vault, description, &body)
            })
            .map_err(|f| failed(archive, Operation::UploadSingle, f))
    }

    fn upload_multi_part(
        &self,
        blob: &dyn ArchiveBlob,
        plan: &TransferPlan,
        vault: &str,
        description: &str,
    ) -> UploadResult<RemoteArchive> {
        let archive = blob.name();

        self.transition(archive, UploadState::MultiPartInitiating);
        let session: UploadSession = self
            .retry
            .run(
                archive,
                Operation::InitiateMultipart,
                self.observer.as_ref(),
                |_| {
                    self.client
                        .initiate_multipart(vault, plan.part_size, description)
                },
            )
            .map_err(|f| failed(archive, Operation::InitiateMultipart, f))?;

        self.transition(archive, UploadState::MultiPartUploading);
        for range in plan.ranges() {
            let body = read(blob, range.start, range.length)?;
            let checksum = tree_hash(&body);
            self.retry
                .run(archive, Operation::UploadPart, self.observer.as_ref(), |_| {
                    self.client.upload_part(&session, &range, &body, &checksum)
                })
                .map_err(|f| failed(archive, Operation::UploadPart, f))?;

            self.observer.on_event(&TransferEvent::PartUploaded {
                archive: archive.to_string(),
                index: range.index,
                part_count: plan.part_count,
            });
        }

        self.transition(archive, UploadState::MultiPartCompleting);
        let checksum = tree_hash_blob(blob).map_err(|source| UploadError::BlobRead {
            archive: archive.to_string(),
            source,
        })?;
        self.retry
            .run(
                archive,
                Operation::CompleteMultipart,
                self.observer.as_ref(),
                |_| {
                    self.client
                        .complete_multipart(&session, plan.total_size, &checksum)
                },
            )
            .map_err(|f| failed(archive, Operation::CompleteMultipart, f))
    }

    fn transition(&self, archive: &str, state: UploadState) {
        self.observer.on_event(&TransferEvent::StateChanged {
            archive: archive.to_string(),
            state,
        });
    }
}

fn read(blob: &dyn ArchiveBlob, offset: u64, length: u64) -> UploadResult<Vec<u8>> {
    blob.read_range(offset, length)
        .map_err(|source| UploadError::BlobRead {
            archive: blob.name().to_string(),
            source,
        })
}

fn failed(archive: &str, operation: Operation, failure: RetryFailure) -> UploadError {
    match failure {
        RetryFailure::Fatal { error, .. } => UploadError::Fatal {
            archive: archive.to_string(),
            operation,
            source: error,
        },
        RetryFailure::Exhausted { error, attempts } => UploadError::Exhausted {
            archive: archive.to_string(),
            operation,
            attempts,
            source: error,
        },
    }
}
