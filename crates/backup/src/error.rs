//! Error types for backup runs
//!
//! Two failure boundaries exist. [`DirectoryError`] covers one directory:
//! the runner logs it, records it in the summary and moves on.
//! [`BackupError`] ends the whole run.

use frostline_lineage::StoreError;
use frostline_transfer::{ClientError, UploadError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for configuration loading
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for archive production
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

/// Result type alias for a whole backup run
pub type BackupResult<T> = std::result::Result<T, BackupError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read or written
    #[error("Failed to access config file '{path}': {source}")]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Parser error
        source: toml::de::Error,
    },

    /// A setting has an unusable value
    #[error("Invalid value for '{key}': {reason}")]
    Invalid {
        /// Setting name
        key: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Temp directory is missing or not writable
    #[error("Temp directory '{path}' is not usable: {reason}")]
    TempDirectory {
        /// Configured directory
        path: PathBuf,
        /// What is wrong with it
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Archive production errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Reading the source directory or writing the archive failed
    #[error("Archive I/O error at '{path}': {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// The encryption step failed
    #[error("Encryption for recipient '{recipient}' failed: {reason}")]
    Encryption {
        /// Recipient key id
        recipient: String,
        /// Exit status or spawn error
        reason: String,
    },

    /// No usable public key for the recipient
    #[error("No usable gpg key for recipient '{recipient}': {reason}")]
    UnknownRecipient {
        /// Recipient key id
        recipient: String,
        /// Exit status or spawn error
        reason: String,
    },

    /// The expected output file was not produced
    #[error("Archive file '{0}' was not created")]
    Missing(PathBuf),
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ArchiveError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure while backing up a single directory
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Archive could not be produced; the directory is skipped
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Upload failed; the directory is skipped
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// Ledger failure; escalated to a run-level failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Run-level failures
#[derive(Debug, Error)]
pub enum BackupError {
    /// Configuration is unusable
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Vault preflight check failed
    #[error("Vault '{vault}' is not usable: {source}")]
    Preflight {
        /// Vault name
        vault: String,
        /// Client failure
        source: ClientError,
    },

    /// Encryption recipient check failed
    #[error("Encryption preflight failed: {0}")]
    Recipient(#[source] ArchiveError),

    /// Backup target could not be read
    #[error("Unable to read backup target '{path}': {source}")]
    Discovery {
        /// Target directory
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Lineage store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}
