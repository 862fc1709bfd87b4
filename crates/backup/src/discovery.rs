//! Selecting the directories to back up

use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Ignore file read from the target directory in recursive mode
pub const IGNORE_FILE_NAME: &str = ".frostline_ignore";

/// Options for a single backup run, taken from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Directory to back up (or whose children to back up)
    pub target: PathBuf,
    /// Destination vault
    pub vault: String,
    /// Back up each immediate child directory instead of the target
    pub recursive: bool,
    /// Include children whose name starts with `.`
    pub include_hidden: bool,
    /// Discover and report only; no archive, upload or rotation
    pub dry_run: bool,
    /// Encrypt archives for this key id
    pub encrypt_recipient: Option<String>,
}

impl RunOptions {
    /// Back up `target` itself into `vault`
    pub fn new(target: impl Into<PathBuf>, vault: impl Into<String>) -> Self {
        RunOptions {
            target: target.into(),
            vault: vault.into(),
            recursive: false,
            include_hidden: false,
            dry_run: false,
            encrypt_recipient: None,
        }
    }

    /// Back up each child directory
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Include hidden children
    pub fn include_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// Discovery only
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Encrypt for `recipient`
    pub fn encrypt_for(mut self, recipient: Option<String>) -> Self {
        self.encrypt_recipient = recipient;
        self
    }
}

/// A directory selected for backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupDirectory {
    /// Absolute path
    pub path: PathBuf,
    /// Final path component
    pub name: String,
    /// Containing directory
    pub parent: PathBuf,
    /// Archive base name, e.g. `holiday-photos_2024-05-01`
    pub archive_name: String,
}

impl BackupDirectory {
    /// Describe `path` for a backup taken on `date`
    pub fn new(path: &Path, date: NaiveDate) -> io::Result<Self> {
        let path = fs::canonicalize(path)?;
        if !path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} has no directory name", path.display()),
                )
            })?;
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(BackupDirectory {
            archive_name: archive_name(&name, date),
            path,
            name,
            parent,
        })
    }

    /// Upload description recorded with the archive
    pub fn description(&self) -> String {
        format!("Directory: {}. Archive: {}", self.path.display(), self.archive_name)
    }
}

/// Lowercased name with spaces replaced by `-`, suffixed with the date
pub fn archive_name(name: &str, date: NaiveDate) -> String {
    format!(
        "{}_{}",
        name.replace(' ', "-").to_lowercase(),
        date.format("%Y-%m-%d")
    )
}

/// Directories to back up for `options`, in processing order
pub fn discover(options: &RunOptions, date: NaiveDate) -> io::Result<Vec<BackupDirectory>> {
    if !options.recursive {
        return Ok(vec![BackupDirectory::new(&options.target, date)?]);
    }

    let target = fs::canonicalize(&options.target)?;
    let ignored = read_ignore_file(&target)?;

    let mut children = Vec::new();
    for entry in fs::read_dir(&target)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') && !options.include_hidden {
            debug!(directory = %name, "Skipping hidden directory");
            continue;
        }
        if ignored.contains(&name) {
            debug!(directory = %name, "Skipping ignored directory");
            continue;
        }
        children.push(entry.path());
    }
    children.sort();

    children
        .iter()
        .map(|path| BackupDirectory::new(path, date))
        .collect()
}

/// Child names listed in the target's ignore file; empty if there is none
pub fn read_ignore_file(target: &Path) -> io::Result<HashSet<String>> {
    let content = match fs::read_to_string(target.join(IGNORE_FILE_NAME)) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e),
    };
    Ok(parse_ignore_list(&content))
}

fn parse_ignore_list(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(|line| line.trim().trim_end_matches('/'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
