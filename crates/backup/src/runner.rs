//! Backup run orchestration
//!
//! A run checks the vault, selects directories, then for each one in turn:
//! produce archive, upload, record lineage, rotate old backups, remove the
//! local archive. Archive and upload failures skip the directory; ledger
//! failures and a failed vault check end the run.

use crate::archive::{ArchiveProducer, TarZstdProducer};
use crate::config::BackupConfig;
use crate::discovery::{discover, BackupDirectory, RunOptions};
use crate::error::{BackupError, BackupResult, ConfigResult, DirectoryError};
use chrono::{Local, NaiveDate};
use frostline_core::{LineageEntry, NewLineageEntry};
use frostline_lineage::{LineageStore, RotationPolicy, RotationReport};
use frostline_transfer::{TransferClient, TransferObserver, UploadEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// A directory that was uploaded and recorded
#[derive(Debug)]
pub struct CompletedBackup {
    /// Source directory
    pub directory: PathBuf,
    /// Ledger entry written for the upload
    pub entry: LineageEntry,
    /// Rotation pass run afterwards
    pub rotation: RotationReport,
}

/// A directory that failed and was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDirectory {
    /// Source directory
    pub directory: PathBuf,
    /// Failure description
    pub reason: String,
}

/// Outcome of a backup run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Directories backed up
    pub completed: Vec<CompletedBackup>,
    /// Directories skipped after an archive or upload failure
    pub skipped: Vec<SkippedDirectory>,
    /// Directories a dry run would have backed up
    pub planned: Vec<BackupDirectory>,
    /// Old archives removed by rotation
    pub rotated: usize,
    /// Old archives whose removal failed
    pub rotation_failures: usize,
}

impl RunSummary {
    /// True when nothing was skipped and rotation fully succeeded
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.rotation_failures == 0
    }
}

/// Runs backups against one remote store and one lineage store
pub struct BackupRunner {
    client: Arc<dyn TransferClient>,
    store: Arc<dyn LineageStore>,
    producer: Box<dyn ArchiveProducer>,
    engine: UploadEngine,
    rotation: RotationPolicy,
}

impl BackupRunner {
    /// Assemble a runner from its parts
    pub fn new(
        client: Arc<dyn TransferClient>,
        store: Arc<dyn LineageStore>,
        producer: Box<dyn ArchiveProducer>,
        engine: UploadEngine,
        rotation: RotationPolicy,
    ) -> Self {
        BackupRunner {
            client,
            store,
            producer,
            engine,
            rotation,
        }
    }

    /// Runner with the producer, engine and rotation described by `config`
    pub fn from_config(
        config: &BackupConfig,
        client: Arc<dyn TransferClient>,
        store: Arc<dyn LineageStore>,
    ) -> ConfigResult<Self> {
        let producer = TarZstdProducer::new(
            &config.temp_directory,
            config.compression_mode()?,
            config.compression_level,
        )
        .with_gpg_program(&config.gpg_program);
        let engine = UploadEngine::new(Arc::clone(&client), config.part_size)
            .with_retry_policy(config.retry_policy());
        Ok(Self::new(
            client,
            store,
            Box::new(producer),
            engine,
            config.rotation_policy(),
        ))
    }

    /// Send upload and rotation events to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.engine = self.engine.with_observer(Arc::clone(&observer));
        self.rotation = self.rotation.with_observer(observer);
        self
    }

    /// Run a backup dated today
    pub fn run(&self, options: &RunOptions) -> BackupResult<RunSummary> {
        self.run_on(options, Local::now().date_naive())
    }

    /// Run a backup whose archive names carry `date`
    pub fn run_on(&self, options: &RunOptions, date: NaiveDate) -> BackupResult<RunSummary> {
        self.client
            .check_vault(&options.vault)
            .map_err(|source| BackupError::Preflight {
                vault: options.vault.clone(),
                source,
            })?;
        if let Some(recipient) = options.encrypt_recipient.as_deref() {
            self.producer
                .check_recipient(recipient)
                .map_err(BackupError::Recipient)?;
        }

        let directories = discover(options, date).map_err(|source| BackupError::Discovery {
            path: options.target.clone(),
            source,
        })?;
        info!(
            vault = %options.vault,
            directories = directories.len(),
            dry_run = options.dry_run,
            "Starting backup run"
        );

        let mut summary = RunSummary::default();
        for directory in directories {
            if options.dry_run {
                info!(
                    directory = %directory.path.display(),
                    archive = %directory.archive_name,
                    "Dry run, not backing up"
                );
                summary.planned.push(directory);
                continue;
            }

            match self.backup_directory(&directory, options) {
                Ok(completed) => {
                    summary.rotated += completed.rotation.deleted.len();
                    summary.rotation_failures += completed.rotation.failed.len();
                    summary.completed.push(completed);
                }
                Err(DirectoryError::Store(e)) => {
                    error!(
                        directory = %directory.path.display(),
                        error = %e,
                        "Lineage store failure, aborting run"
                    );
                    return Err(e.into());
                }
                Err(e) => {
                    error!(
                        directory = %directory.path.display(),
                        error = %e,
                        "Skipping directory"
                    );
                    summary.skipped.push(SkippedDirectory {
                        directory: directory.path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            completed = summary.completed.len(),
            skipped = summary.skipped.len(),
            rotated = summary.rotated,
            "Backup run finished"
        );
        Ok(summary)
    }

    /// Back up one directory
    ///
    /// The local archive is removed on every path out of this function.
    pub fn backup_directory(
        &self,
        directory: &BackupDirectory,
        options: &RunOptions,
    ) -> Result<CompletedBackup, DirectoryError> {
        let recipient = options.encrypt_recipient.as_deref();
        let archive = self.producer.produce(directory, recipient)?;

        let receipt = self
            .engine
            .upload(&archive, &options.vault, &directory.description())?;
        drop(archive);

        let entry = self.store.append(NewLineageEntry::from_receipt(
            &directory.path,
            &options.vault,
            options.encrypt_recipient.clone(),
            &receipt,
        ))?;
        info!(
            directory = %directory.path.display(),
            archive_id = %entry.remote_archive_id,
            size = entry.size_bytes,
            "Backup recorded"
        );

        let rotation =
            self.rotation
                .rotate(&directory.path, self.client.as_ref(), self.store.as_ref())?;

        Ok(CompletedBackup {
            directory: directory.path.clone(),
            entry,
            rotation,
        })
    }
}
