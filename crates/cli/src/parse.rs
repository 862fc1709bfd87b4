//! ArgMatches → CliAction conversion.

use std::path::PathBuf;

use clap::ArgMatches;
use frostline_backup::RunOptions;

use crate::format::OutputMode;

/// The result of parsing the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    /// Run a backup.
    Backup(RunOptions),
    /// Show active lineage for a directory.
    List {
        directory: PathBuf,
        mode: OutputMode,
    },
    /// Print the default config, optionally writing it to the config path.
    Config { init: bool },
    /// Create a vault in the local vault store.
    CreateVault { vault: String },
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

/// Extract the global flags.
pub fn global_options(matches: &ArgMatches) -> GlobalOptions {
    GlobalOptions {
        config: matches.get_one::<String>("config").map(PathBuf::from),
        verbose: matches.get_flag("verbose"),
    }
}

/// Translate parsed arguments into an action.
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, String> {
    match matches.subcommand() {
        Some(("backup", sub)) => {
            let directory = required(sub, "directory")?;
            let vault = required(sub, "vault")?;
            Ok(CliAction::Backup(
                RunOptions::new(directory, vault)
                    .recursive(sub.get_flag("recursive"))
                    .include_hidden(sub.get_flag("hidden"))
                    .dry_run(sub.get_flag("test"))
                    .encrypt_for(sub.get_one::<String>("encrypt").cloned()),
            ))
        }
        Some(("list", sub)) => Ok(CliAction::List {
            directory: PathBuf::from(required(sub, "directory")?),
            mode: if sub.get_flag("json") {
                OutputMode::Json
            } else {
                OutputMode::Human
            },
        }),
        Some(("config", sub)) => Ok(CliAction::Config {
            init: sub.get_flag("init"),
        }),
        Some(("create-vault", sub)) => Ok(CliAction::CreateVault {
            vault: required(sub, "vault")?,
        }),
        Some((other, _)) => Err(format!("Unknown command: {}", other)),
        None => Err("No command given".to_string()),
    }
}

fn required(matches: &ArgMatches, name: &str) -> Result<String, String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .ok_or_else(|| format!("Missing argument: {}", name))
}
