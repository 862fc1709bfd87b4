//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("frostline")
        .about("Directory backups to cold archival storage")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Config file (default: ~/.frostline/config.toml)")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log debug output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(build_backup())
        .subcommand(build_list())
        .subcommand(build_config())
        .subcommand(build_create_vault())
}

fn build_backup() -> Command {
    Command::new("backup")
        .about("Archive a directory and upload it to a vault")
        .arg(
            Arg::new("recursive")
                .short('r')
                .long("recursive")
                .help("Back up each child directory separately")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("hidden")
                .long("hidden")
                .help("Include hidden child directories")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("test")
                .short('t')
                .long("test")
                .help("Only list the directories that would be backed up")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("encrypt")
                .short('e')
                .long("encrypt")
                .value_name("ID")
                .help("Encrypt archives for this gpg key id"),
        )
        .arg(Arg::new("directory").required(true).help("Directory to back up"))
        .arg(Arg::new("vault").required(true).help("Destination vault"))
}

fn build_list() -> Command {
    Command::new("list")
        .about("Show active backups of a directory")
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output")
                .action(ArgAction::SetTrue),
        )
        .arg(Arg::new("directory").required(true).help("Backed up directory"))
}

fn build_config() -> Command {
    Command::new("config")
        .about("Print the default configuration")
        .arg(
            Arg::new("init")
                .long("init")
                .help("Write the default configuration if the file does not exist")
                .action(ArgAction::SetTrue),
        )
}

fn build_create_vault() -> Command {
    Command::new("create-vault")
        .about("Create a vault in the local vault store")
        .arg(Arg::new("vault").required(true).help("Vault name"))
}
