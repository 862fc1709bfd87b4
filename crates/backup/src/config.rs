//! Configuration via `~/.frostline/config.toml`
//!
//! Every key is optional; missing keys take their defaults. Paths may start
//! with `~/`, which is expanded from `$HOME` when the file is loaded.

use crate::error::{ConfigError, ConfigResult};
use frostline_core::ChunkPlanner;
use frostline_lineage::RotationPolicy;
use frostline_transfer::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config directory under `$HOME`
pub const CONFIG_DIR_NAME: &str = ".frostline";

/// Config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default upload part size (8 MiB)
pub const DEFAULT_PART_SIZE: u64 = 8 * 1024 * 1024;

/// Archive compression mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// tar stream compressed with zstd
    Zstd,
    /// plain tar
    None,
}

/// Backup configuration loaded from `config.toml`.
///
/// # Example
///
/// ```toml
/// vault_root = "~/.frostline/vaults"
/// temp_directory = "/tmp"
/// db_file = "~/.frostline/lineage.db"
/// part_size = 8388608
/// old_backups = 2
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupConfig {
    /// Root directory of the local vault store
    #[serde(default = "default_vault_root")]
    pub vault_root: PathBuf,
    /// Where archives are staged before upload
    #[serde(default = "default_temp_directory")]
    pub temp_directory: PathBuf,
    /// Lineage database file
    #[serde(default = "default_db_file")]
    pub db_file: PathBuf,
    /// Append log output here instead of stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Multi-part upload part size in bytes; a power of two
    #[serde(default = "default_part_size")]
    pub part_size: u64,
    /// Older backups kept per directory besides the newest one
    #[serde(default)]
    pub old_backups: usize,
    /// `"zstd"` or `"none"`
    #[serde(default = "default_compression")]
    pub compression: String,
    /// zstd level, 1..=22
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
    /// Attempts per remote call before giving up
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Pause between attempts
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
    /// gpg executable used for encryption
    #[serde(default = "default_gpg_program")]
    pub gpg_program: PathBuf,
}

fn default_vault_root() -> PathBuf {
    PathBuf::from("~/.frostline/vaults")
}

fn default_temp_directory() -> PathBuf {
    std::env::temp_dir()
}

fn default_db_file() -> PathBuf {
    PathBuf::from("~/.frostline/lineage.db")
}

fn default_part_size() -> u64 {
    DEFAULT_PART_SIZE
}

fn default_compression() -> String {
    "zstd".to_string()
}

fn default_compression_level() -> i32 {
    3
}

fn default_max_retry_attempts() -> u32 {
    frostline_transfer::DEFAULT_MAX_ATTEMPTS
}

fn default_retry_delay_seconds() -> u64 {
    frostline_transfer::DEFAULT_RETRY_DELAY.as_secs()
}

fn default_gpg_program() -> PathBuf {
    PathBuf::from("gpg")
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            vault_root: default_vault_root(),
            temp_directory: default_temp_directory(),
            db_file: default_db_file(),
            log_file: None,
            part_size: default_part_size(),
            old_backups: 0,
            compression: default_compression(),
            compression_level: default_compression_level(),
            max_retry_attempts: default_max_retry_attempts(),
            retry_delay_seconds: default_retry_delay_seconds(),
            gpg_program: default_gpg_program(),
        }
    }
}

impl BackupConfig {
    /// `~/.frostline/config.toml`, if `$HOME` is set
    pub fn default_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# frostline configuration

# Root directory of the local vault store. Each vault is a subdirectory.
vault_root = "~/.frostline/vaults"

# Archives are staged here before upload and removed afterwards.
temp_directory = "/tmp"

# Lineage database recording every uploaded archive.
db_file = "~/.frostline/lineage.db"

# Append log output to this file instead of stderr.
# log_file = "~/.frostline/frostline.log"

# Upload part size in bytes (power of two, default 8 MiB).
# Archives larger than this use the multi-part protocol.
part_size = 8388608

# Older backups kept per directory besides the newest one (default 0).
old_backups = 0

# Archive compression: "zstd" (default) or "none"
compression = "zstd"
compression_level = 3

# Attempts per remote call and the pause between them.
max_retry_attempts = 10
retry_delay_seconds = 60

# gpg executable used when backing up with --encrypt.
gpg_program = "gpg"
"#
    }

    /// Read, expand and validate config from a file path.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: BackupConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let config = config.expanded();
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Creates the parent directory as needed.
    pub fn write_default_if_missing(path: &Path) -> ConfigResult<()> {
        if path.exists() {
            return Ok(());
        }
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        fs::write(path, Self::default_toml()).map_err(io_err)
    }

    /// Copy of this config with `~/` expanded in every path
    pub fn expanded(mut self) -> Self {
        self.vault_root = expand_home(&self.vault_root);
        self.temp_directory = expand_home(&self.temp_directory);
        self.db_file = expand_home(&self.db_file);
        self.log_file = self.log_file.as_deref().map(expand_home);
        self.gpg_program = expand_home(&self.gpg_program);
        self
    }

    /// Parse the compression string.
    pub fn compression_mode(&self) -> ConfigResult<Compression> {
        match self.compression.as_str() {
            "zstd" => Ok(Compression::Zstd),
            "none" => Ok(Compression::None),
            other => Err(ConfigError::invalid(
                "compression",
                format!("'{}', expected \"zstd\" or \"none\"", other),
            )),
        }
    }

    /// Check every setting, including that the temp directory is writable.
    pub fn validate(&self) -> ConfigResult<()> {
        ChunkPlanner::validate_part_size(self.part_size)
            .map_err(|e| ConfigError::invalid("part_size", e.to_string()))?;
        if self.max_retry_attempts == 0 {
            return Err(ConfigError::invalid(
                "max_retry_attempts",
                "must be at least 1",
            ));
        }
        self.compression_mode()?;
        if !(1..=22).contains(&self.compression_level) {
            return Err(ConfigError::invalid(
                "compression_level",
                format!("{} is outside 1..=22", self.compression_level),
            ));
        }
        check_writable_dir(&self.temp_directory)
    }

    /// Retry policy for remote calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_retry_attempts)
            .with_delay(Duration::from_secs(self.retry_delay_seconds))
    }

    /// Rotation policy for old backups
    pub fn rotation_policy(&self) -> RotationPolicy {
        RotationPolicy::new(self.old_backups)
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// Expand a leading `~` from `$HOME`; other paths are returned unchanged
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

fn check_writable_dir(path: &Path) -> ConfigResult<()> {
    let fail = |reason: String| ConfigError::TempDirectory {
        path: path.to_path_buf(),
        reason,
    };
    if !path.is_dir() {
        return Err(fail("not a directory".to_string()));
    }
    let probe = path.join(format!(".frostline-probe-{}", std::process::id()));
    fs::write(&probe, b"").map_err(|e| fail(e.to_string()))?;
    let _ = fs::remove_file(&probe);
    Ok(())
}
