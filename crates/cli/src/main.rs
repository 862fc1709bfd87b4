//! frostline CLI: directory backups to cold archival storage.
//!
//! `frostline [-c FILE] [-v] COMMAND`:
//! - `backup`: archive directories, upload, record and rotate
//! - `list`: active backups of a directory
//! - `config`: print (or `--init` write) the default configuration
//! - `create-vault`: create a vault in the local vault store

mod commands;
mod format;
mod parse;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex};

use frostline_backup::{BackupConfig, BackupRunner, RunOptions};
use frostline_lineage::{LineageStore, SqliteLineageStore};
use frostline_transfer::FsVault;
use tracing::Level;
use tracing_subscriber::fmt::time::ChronoLocal;

use commands::build_cli;
use format::{format_entries, format_error, format_summary, OutputMode};
use parse::{global_options, matches_to_action, CliAction, GlobalOptions};

const LOG_TIME_FORMAT: &str = "[%Y-%m-%d %H:%M:%S]";

fn main() {
    let matches = build_cli().get_matches();
    let globals = global_options(&matches);

    let action = match matches_to_action(&matches) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let config_path = match config_path(&globals) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if let CliAction::Config { init } = action {
        process::exit(run_config(&config_path, init));
    }

    let config = match BackupConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format_error(&e, OutputMode::Human));
            eprintln!("Run `frostline config --init` to create a default configuration.");
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config, globals.verbose) {
        eprintln!("{}", e);
        process::exit(1);
    }

    let exit_code = match action {
        CliAction::Backup(options) => run_backup(&config, &options),
        CliAction::List { directory, mode } => run_list(&config, &directory, mode),
        CliAction::CreateVault { vault } => run_create_vault(&config, &vault),
        CliAction::Config { .. } => 0,
    };
    process::exit(exit_code);
}

fn config_path(globals: &GlobalOptions) -> Result<PathBuf, String> {
    match &globals.config {
        Some(path) => Ok(frostline_backup::expand_home(path)),
        None => BackupConfig::default_path()
            .ok_or_else(|| "HOME is not set; pass --config".to_string()),
    }
}

fn init_logging(config: &BackupConfig, verbose: bool) -> Result<(), String> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_timer(ChronoLocal::new(LOG_TIME_FORMAT.to_string()));

    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("Failed to open log file '{}': {}", path.display(), e))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| format!("Failed to initialize logging: {}", e))
        }
        None => builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| format!("Failed to initialize logging: {}", e)),
    }
}

fn run_config(path: &Path, init: bool) -> i32 {
    if !init {
        print!("{}", BackupConfig::default_toml());
        return 0;
    }
    match BackupConfig::write_default_if_missing(path) {
        Ok(()) => {
            println!("{}", path.display());
            0
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, OutputMode::Human));
            1
        }
    }
}

fn open_store(config: &BackupConfig) -> Result<SqliteLineageStore, String> {
    if let Some(parent) = config.db_file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                format!("Failed to create '{}': {}", parent.display(), e)
            })?;
        }
    }
    SqliteLineageStore::open(&config.db_file).map_err(|e| e.to_string())
}

fn run_backup(config: &BackupConfig, options: &RunOptions) -> i32 {
    let vault = match FsVault::new(&config.vault_root) {
        Ok(vault) => vault,
        Err(e) => {
            tracing::error!(root = %config.vault_root.display(), error = %e, "Cannot open vault store");
            return 1;
        }
    };
    let store = match open_store(config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "Cannot open lineage store");
            return 1;
        }
    };

    let runner = match BackupRunner::from_config(config, Arc::new(vault), Arc::new(store)) {
        Ok(runner) => runner,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return 1;
        }
    };

    match runner.run(options) {
        Ok(summary) => {
            println!("{}", format_summary(&summary));
            0
        }
        Err(e) => {
            tracing::error!(error = %e, "Backup run failed");
            eprintln!("{}", format_error(&e, OutputMode::Human));
            1
        }
    }
}

fn run_list(config: &BackupConfig, directory: &Path, mode: OutputMode) -> i32 {
    let store = match open_store(config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            return 1;
        }
    };
    let directory = fs::canonicalize(directory).unwrap_or_else(|_| directory.to_path_buf());
    match store.list_active(&directory) {
        Ok(entries) => {
            println!("{}", format_entries(&entries, mode));
            0
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            1
        }
    }
}

fn run_create_vault(config: &BackupConfig, vault: &str) -> i32 {
    let result = FsVault::new(&config.vault_root).and_then(|store| store.create_vault(vault));
    match result {
        Ok(()) => {
            println!("{}", config.vault_root.join(vault).display());
            0
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, OutputMode::Human));
            1
        }
    }
}
