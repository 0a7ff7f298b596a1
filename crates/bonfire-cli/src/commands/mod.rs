//! CLI command definitions and dispatch.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

pub mod completions;
pub mod config;
pub mod info;
pub mod init;
pub mod pull;
pub mod restore;
pub mod status;
pub mod sync;
pub mod utils;
pub mod watch;

/// Bonfire Backup - keep your Dark Souls III saves in git.
#[derive(Debug, Parser)]
#[command(name = "bonfire", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Suppress informational output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use this configuration file instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the backup repository and connect it to the remote.
    Init {
        /// Remote repository URL to store in the configuration.
        #[arg(long, value_name = "URL")]
        repo_url: Option<String>,
    },

    /// Back up the save files, commit, and sync with the remote.
    Sync {
        /// Record the backup as automatic instead of manual.
        #[arg(long)]
        auto: bool,
    },

    /// Show the state of the backup repository.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Copy the backed-up saves back into the save directory.
    Restore {
        /// Restore into this directory instead of the configured save path.
        #[arg(long, value_name = "DIR")]
        to: Option<PathBuf>,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Fetch and merge the latest backup from the remote.
    Pull,

    /// Show details of the last backup.
    Info {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Read or change the configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Watch the save directory and back up automatically.
    Watch,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the current configuration.
    Show,

    /// Print the configuration file location.
    Path,

    /// Set a configuration value.
    Set {
        /// One of save_path, backup_path, repo_url, auto_sync, sync_interval, backend.
        key: String,

        /// New value; an empty string clears save_path and repo_url.
        value: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["bonfire", "status", "--json", "-q", "--config", "c.toml"])
            .unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
        assert!(matches!(cli.command, Commands::Status { json: true }));
    }

    #[test]
    fn test_parses_config_set() {
        let cli = Cli::try_parse_from(["bonfire", "config", "set", "sync_interval", "10"]).unwrap();
        let Commands::Config {
            action: ConfigAction::Set { key, value },
        } = cli.command
        else {
            panic!("expected config set");
        };
        assert_eq!(key, "sync_interval");
        assert_eq!(value, "10");
    }
}
