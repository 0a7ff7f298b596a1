//! `bonfire sync` command - Back up the saves and sync with the remote.

use std::path::Path;

use anyhow::{Context, Result};
use bonfire_core::{BackupReport, RemoteOutcome, SyncMode, run_backup};
use bonfire_git::CommitOutcome;

use crate::commands::utils;
use crate::output::{self, Spinner};

/// Run the sync command.
pub fn run(config_path: Option<&Path>, auto: bool) -> Result<()> {
    let (config, _) = utils::load_config(config_path)?;
    let save_path = config.require_save_path()?;
    let repo = utils::open_initialized(&config)?;
    let mode = if auto { SyncMode::Auto } else { SyncMode::Manual };

    let report = {
        let _spinner = Spinner::start("Backing up saves...");
        run_backup(repo.as_ref(), save_path, mode).context("Backup failed")?
    };

    print_report(&report);
    Ok(())
}

/// Print the outcome of a backup. Shared with `bonfire watch`.
pub fn print_report(report: &BackupReport) {
    let files = report.mirror.manifest.files_count;
    match report.commit {
        CommitOutcome::Created => {
            output::success(&format!("Backed up {files} save file(s)"));
        }
        CommitOutcome::NothingToCommit => {
            output::info(&format!("No changes since last backup ({files} save file(s))"));
        }
    }

    match &report.remote {
        RemoteOutcome::LocalOnly => {
            output::info("No remote configured - backup kept on this machine");
        }
        RemoteOutcome::Synced(sync) => {
            if sync.pulled {
                output::info("Merged newer backups from the remote");
            }
            if sync.pushed {
                output::success("Pushed to remote");
            }
        }
        RemoteOutcome::Failed(_) => {}
    }

    if let Some(err) = report.remote_error() {
        output::warn(&format!(
            "Backup saved locally, but the remote is not up to date: {err}"
        ));
    }
}
