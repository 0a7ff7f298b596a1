//! `bonfire status` command - Display the state of the backup repository.

use std::path::Path;

use anyhow::Result;
use bonfire_git::{RepoStatus, redact_credentials};
use colored::Colorize;
use serde::Serialize;

use crate::commands::utils;
use crate::output;

/// JSON output for status command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusOutput {
    has_changes: bool,
    ahead: usize,
    behind: usize,
    files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_commit: Option<String>,
}

impl From<RepoStatus> for StatusOutput {
    fn from(status: RepoStatus) -> Self {
        Self {
            has_changes: status.has_changes,
            ahead: status.ahead,
            behind: status.behind,
            files: status.files,
            last_commit: status.last_commit,
        }
    }
}

/// Run the status command.
///
/// An uninitialized repository reports the empty status instead of failing.
pub fn run(config_path: Option<&Path>, json: bool) -> Result<()> {
    let (config, _) = utils::load_config(config_path)?;
    let repo = utils::open_repo(&config);
    let initialized = repo.is_initialized();
    let status = repo.status();

    if json {
        output::essential(&serde_json::to_string_pretty(&StatusOutput::from(status))?);
        return Ok(());
    }

    println!();
    println!("  {}", "Bonfire Backup".bold());
    output::hr();
    println!("  Repository:  {}", config.backup_path.display());
    if !initialized {
        println!("  State:       {}", "not initialized".yellow());
        output::hr();
        output::info("Run `bonfire init` to create the backup repository");
        return Ok(());
    }

    let remote = config
        .repo_url
        .as_deref()
        .map_or_else(|| "none".dimmed().to_string(), redact_credentials);
    println!("  Remote:      {remote}");
    if config.repo_url.is_some() {
        println!(
            "  Sync:        {}",
            output::divergence(status.ahead, status.behind)
        );
    }
    println!(
        "  Last backup: {}",
        status.last_commit.as_deref().unwrap_or("none")
    );

    if status.has_changes {
        println!("  Uncommitted: {}", status.files.len().to_string().yellow());
        for file in &status.files {
            println!("    {} {file}", "•".dimmed());
        }
    }
    output::hr();

    Ok(())
}
