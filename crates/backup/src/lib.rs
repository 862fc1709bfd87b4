//! Backup runs for frostline
//!
//! Ties the transfer engine and the lineage ledger into a backup tool:
//!
//! - BackupConfig: `config.toml` settings
//! - Discovery: which directories to back up, and their archive names
//! - ArchiveProducer: tar + zstd archives with optional gpg encryption
//! - BackupRunner: per-directory orchestration with rotation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive;
pub mod config;
pub mod discovery;
pub mod error;
pub mod runner;

pub use archive::{ArchiveProducer, TarZstdProducer, TempArchive};
pub use config::{expand_home, BackupConfig, Compression, CONFIG_FILE_NAME, DEFAULT_PART_SIZE};
pub use discovery::{archive_name, discover, BackupDirectory, RunOptions, IGNORE_FILE_NAME};
pub use error::{
    ArchiveError, ArchiveResult, BackupError, BackupResult, ConfigError, ConfigResult,
    DirectoryError,
};
pub use runner::{BackupRunner, CompletedBackup, RunSummary, SkippedDirectory};
