//! Backup lineage for frostline
//!
//! Records every uploaded archive per source directory and rotates old
//! ones out according to a retention count:
//!
//! - LineageStore: append / list / soft-delete contract
//! - SqliteLineageStore: single-file SQLite ledger
//! - RotationPolicy: keep the newest N+1, delete the rest best effort

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod rotation;
pub mod sqlite;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use rotation::{RotationPolicy, RotationReport};
pub use sqlite::SqliteLineageStore;
pub use store::LineageStore;
