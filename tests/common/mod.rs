//! Shared test utilities for the integration suite.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use frostline::testing::RecordingObserver;
use frostline::{
    BackupConfig, BackupRunner, FsVault, LineageEntry, LineageStore, RetryPolicy, RunOptions,
    SqliteLineageStore,
};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tempfile::TempDir;

/// Vault every test backs up into.
pub const VAULT: &str = "cold";

/// A vault store, a lineage database and a source tree, all under one temp dir.
pub struct TestEnv {
    pub dir: TempDir,
    pub config: BackupConfig,
    pub vault: Arc<FsVault>,
    pub store: Arc<SqliteLineageStore>,
    pub observer: Arc<RecordingObserver>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with(|_| {})
    }

    /// Build with config tweaks applied before the stores are opened.
    pub fn with(tweak: impl FnOnce(&mut BackupConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        for sub in ["vaults", "tmp", "source"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }

        let mut config = BackupConfig {
            vault_root: dir.path().join("vaults"),
            temp_directory: dir.path().join("tmp"),
            db_file: dir.path().join("lineage.db"),
            retry_delay_seconds: 0,
            max_retry_attempts: 3,
            ..BackupConfig::default()
        };
        tweak(&mut config);
        config.validate().unwrap();

        let vault = Arc::new(FsVault::new(&config.vault_root).unwrap());
        vault.create_vault(VAULT).unwrap();
        let store = Arc::new(SqliteLineageStore::open(&config.db_file).unwrap());

        TestEnv {
            dir,
            config,
            vault,
            store,
            observer: Arc::new(RecordingObserver::new()),
        }
    }

    pub fn source(&self) -> PathBuf {
        self.dir.path().join("source")
    }

    /// Create `source/<name>` holding one file of `size` bytes.
    pub fn add_directory(&self, name: &str, size: usize) -> PathBuf {
        let path = self.source().join(name);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("data.bin"), pseudo_random(size)).unwrap();
        fs::canonicalize(path).unwrap()
    }

    pub fn runner(&self) -> BackupRunner {
        BackupRunner::from_config(&self.config, self.vault.clone(), self.store.clone())
            .unwrap()
            .with_observer(self.observer.clone())
    }

    pub fn options(&self, target: &Path) -> RunOptions {
        RunOptions::new(target, VAULT)
    }

    pub fn active(&self, directory: &Path) -> Vec<LineageEntry> {
        self.store.list_active(directory).unwrap()
    }

    pub fn temp_is_empty(&self) -> bool {
        fs::read_dir(&self.config.temp_directory).unwrap().count() == 0
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy::immediate(self.config.max_retry_attempts)
    }
}

/// Incompressible deterministic bytes.
pub fn pseudo_random(len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(0x9E37_79B9);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}
