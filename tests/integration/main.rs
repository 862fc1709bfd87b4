//! Integration Tests
//!
//! End-to-end backups through the local vault store and the SQLite ledger:
//! - Backup flow: discovery, archive, upload, lineage, cleanup
//! - Multi-part: archives larger than one part
//! - Rotation: retention across repeated runs and failed deletes

#[path = "../common/mod.rs"]
mod common;

mod backup_flow;
mod multipart;
mod rotation;
