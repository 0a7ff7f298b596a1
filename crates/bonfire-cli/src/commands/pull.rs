//! `bonfire pull` command - Merge the latest backups from the remote.

use std::path::Path;

use anyhow::{Context, Result};
use bonfire_core::pull_latest;

use crate::commands::utils;
use crate::output::{self, Spinner};

/// Run the pull command.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let (config, _) = utils::load_config(config_path)?;
    let repo = utils::open_initialized(&config)?;

    let pulled = {
        let _spinner = Spinner::start("Pulling from remote...");
        pull_latest(repo.as_ref()).context("Pull failed")?
    };

    if pulled {
        output::success("Pulled latest backups from remote");
        output::info("Run `bonfire restore` to copy them into your save directory");
    } else {
        output::success("Already up to date");
    }
    Ok(())
}
