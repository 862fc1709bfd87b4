//! Chunked archive transfer for frostline
//!
//! This crate moves pre-built archive blobs to a remote archival store:
//!
//! - TransferClient: capability boundary to the store, with failures
//!   classified as transient or fatal
//! - RetryPolicy: bounded attempts with a fixed blocking delay
//! - UploadEngine: single-part / multi-part state machine
//! - TransferEvent / TransferObserver: structured progress and failure events
//! - Tree hash: whole-archive and per-part integrity checksums
//! - FsVault: store adapter over a local directory tree
//! - Testing: scripted client and recording observer

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checksum;
pub mod client;
pub mod engine;
pub mod events;
pub mod fs_vault;
pub mod retry;
pub mod testing;

pub use checksum::{tree_hash, tree_hash_blob, TreeHasher, TREE_HASH_CHUNK_SIZE};
pub use client::{
    ClientError, ClientResult, FailureKind, Operation, RemoteArchive, TransferClient,
    UploadSession,
};
pub use engine::{UploadEngine, UploadError, UploadResult, UploadState};
pub use events::{NoopObserver, TracingObserver, TransferEvent, TransferObserver};
pub use fs_vault::FsVault;
pub use retry::{RetryFailure, RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
