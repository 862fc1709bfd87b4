//! frostline - directory backups to cold archival storage
//!
//! Directories are packed into archives, uploaded to a vault (single-part
//! or multi-part with bounded retries), recorded in a lineage ledger, and
//! rotated so only the newest backups of each directory remain.
//!
//! # Quick Start
//!
//! ```ignore
//! use frostline::{BackupConfig, BackupRunner, FsVault, RunOptions, SqliteLineageStore};
//! use std::sync::Arc;
//!
//! let config = BackupConfig::from_file("config.toml".as_ref())?;
//! let vault = Arc::new(FsVault::new(&config.vault_root)?);
//! let store = Arc::new(SqliteLineageStore::open(&config.db_file)?);
//! let runner = BackupRunner::from_config(&config, vault, store)?;
//! let summary = runner.run(&RunOptions::new("/data/photos", "photos"))?;
//! ```
//!
//! # Architecture
//!
//! - `frostline-core`: chunk planning, archive blobs, lineage records
//! - `frostline-transfer`: store client boundary, retry, upload engine
//! - `frostline-lineage`: SQLite ledger and rotation
//! - `frostline-backup`: configuration, discovery, archives, runner

pub use frostline_backup::{
    archive_name, discover, expand_home, ArchiveError, ArchiveProducer, BackupConfig,
    BackupDirectory, BackupError, BackupResult, BackupRunner, CompletedBackup, Compression,
    ConfigError, DirectoryError, RunOptions, RunSummary, SkippedDirectory, TarZstdProducer,
    TempArchive,
};
pub use frostline_core::{
    ArchiveBlob, ChunkPlanner, FileBlob, LineageEntry, MemoryBlob, NewLineageEntry, PartRange,
    PlanError, TransferPlan, TransferReceipt,
};
pub use frostline_lineage::{
    LineageStore, RotationPolicy, RotationReport, SqliteLineageStore, StoreError, StoreResult,
};
pub use frostline_transfer::{
    testing, tree_hash, tree_hash_blob, ClientError, ClientResult, FailureKind, FsVault,
    NoopObserver, Operation, RemoteArchive, RetryFailure, RetryPolicy, TracingObserver,
    TransferClient, TransferEvent, TransferObserver, UploadEngine, UploadError, UploadResult,
    UploadSession, UploadState,
};
