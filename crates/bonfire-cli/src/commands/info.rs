//! `bonfire info` command - Show the last backup's manifest.

use std::path::Path;

use anyhow::Result;
use bonfire_core::{RestoreManifest, SyncManifest};
use chrono::Local;
use colored::Colorize;
use serde::Serialize;

use crate::commands::utils;
use crate::output;

/// JSON output for info command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoOutput {
    last_backup: Option<SyncManifest>,
    last_restore: Option<RestoreManifest>,
}

/// Run the info command.
pub fn run(config_path: Option<&Path>, json: bool) -> Result<()> {
    let (config, _) = utils::load_config(config_path)?;
    let dir = &config.backup_path;
    let info = InfoOutput {
        last_backup: SyncManifest::load(dir)?,
        last_restore: RestoreManifest::load(dir)?,
    };

    if json {
        output::essential(&serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let Some(backup) = &info.last_backup else {
        output::info("No backups yet - run `bonfire sync`");
        return Ok(());
    };

    println!();
    println!(
        "  {} {}",
        "Last backup".bold(),
        backup.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    output::hr();
    println!("  Mode:  {}", backup.mode);
    println!("  Files: {}", backup.files_count);
    for file in &backup.files {
        println!("    {} {file}", "•".dimmed());
    }

    if let Some(restore) = &info.last_restore {
        output::hr();
        println!(
            "  Last restore {} into {}",
            restore.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            restore.destination.display()
        );
    }
    output::hr();
    Ok(())
}
