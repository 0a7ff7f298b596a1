//! `bonfire restore` command - Copy backed-up saves into the save directory.

use std::path::Path;

use anyhow::{Context, Result, bail};
use bonfire_core::run_restore;
use inquire::Confirm;

use crate::commands::utils;
use crate::output;

/// Run the restore command.
pub fn run(config_path: Option<&Path>, to: Option<&Path>, yes: bool) -> Result<()> {
    let (config, _) = utils::load_config(config_path)?;
    let destination = match to {
        Some(dir) => dir,
        None => config.require_save_path()?,
    };

    if !yes && !confirm_restore(destination)? {
        output::info("Restore cancelled");
        return Ok(());
    }

    let report = run_restore(&config.backup_path, destination).context("Restore failed")?;

    if report.restored().is_empty() {
        output::warn("No save files in the backup repository - nothing restored");
        return Ok(());
    }
    output::success(&format!(
        "Restored {} save file(s) to {}",
        report.restored().len(),
        destination.display()
    ));
    for name in report.displaced() {
        output::detail(&format!("  previous save kept as {name}"));
    }
    Ok(())
}

/// Confirm restore with user.
fn confirm_restore(destination: &Path) -> Result<bool> {
    if !console::user_attended() {
        bail!("Refusing to overwrite saves without confirmation - pass --yes");
    }
    output::warn(&format!(
        "This replaces the save files in {} (existing files are kept as .backup copies)",
        destination.display()
    ));
    Confirm::new("Restore backed-up saves?")
        .with_default(false)
        .prompt()
        .context("Confirmation cancelled")
}
