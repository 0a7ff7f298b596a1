//! `bonfire init` command - Create the backup repository and connect it to
//! the remote.

use std::path::Path;

use anyhow::{Context, Result};
use bonfire_core::{RemoteAction, RepoLock, reconcile};
use bonfire_git::redact_credentials;

use crate::commands::utils;
use crate::output::{self, Spinner};

/// Run the init command.
pub fn run(config_path: Option<&Path>, repo_url: Option<&str>) -> Result<()> {
    let (mut config, path) = utils::load_config(config_path)?;
    let url_changed = repo_url.is_some_and(|url| config.repo_url.as_deref() != Some(url));
    if let Some(url) = repo_url {
        config.set("repo_url", url)?;
    }

    let repo = utils::open_repo(&config);
    let _lock = RepoLock::acquire(&config.backup_path)?;
    let remote = utils::remote_url(&config);

    let report = {
        let _spinner = remote
            .is_some()
            .then(|| Spinner::start("Connecting to remote..."));
        reconcile(repo.as_ref(), remote.as_ref()).context("Failed to set up backup repository")?
    };

    if url_changed {
        config.save(&path)?;
    }

    if report.fresh {
        output::success(&format!(
            "Initialized backup repository at {}",
            config.backup_path.display()
        ));
    } else {
        output::info(&format!(
            "Backup repository already exists at {}",
            config.backup_path.display()
        ));
    }
    if report.migrated_legacy_branch {
        output::info("Renamed branch master to main");
    }

    let shown_url = config
        .repo_url
        .as_deref()
        .map(redact_credentials)
        .unwrap_or_default();
    match report.remote {
        None => output::info("No remote configured - backups stay on this machine"),
        Some(RemoteAction::Published) => {
            output::success(&format!("Published backup repository to {shown_url}"));
        }
        Some(RemoteAction::JoinedRemote) => {
            output::success(&format!("Joined existing backups from {shown_url}"));
        }
        Some(RemoteAction::Synced(sync)) => {
            if let Some(err) = &sync.push_error {
                output::warn(&format!("Connected to {shown_url}, but push failed: {err}"));
            } else {
                output::success(&format!("In sync with {shown_url}"));
            }
        }
    }

    if config.save_path.is_none() {
        output::info("Next: bonfire config set save_path <your save directory>");
    }

    Ok(())
}
