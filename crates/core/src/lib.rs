//! Core types for frostline
//!
//! This crate defines the pieces shared by every layer of the backup tool:
//! - ChunkPlanner: part count and byte range arithmetic for an archive
//! - ArchiveBlob: read-only, range-readable archive contents
//! - TransferReceipt: what a successful upload produced
//! - LineageEntry: one recorded backup of a source directory

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blob;
pub mod error;
pub mod plan;
pub mod types;

pub use blob::{ArchiveBlob, FileBlob, MemoryBlob};
pub use error::{PlanError, PlanResult};
pub use plan::{ChunkPlanner, PartRange, PartRanges, TransferPlan};
pub use types::{LineageEntry, NewLineageEntry, TransferReceipt, TIMESTAMP_FORMAT};
