//! `bonfire watch` command - Back up automatically until interrupted.
//!
//! Restarts the scheduler whenever the configuration file changes, so
//! `bonfire config set` in another terminal takes effect immediately.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bonfire_core::{Config, Error as CoreError, SyncMode, run_backup};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc;

use crate::commands::{sync, utils};
use crate::output;
use crate::services::{AutoSync, DEBOUNCE_WINDOW, Schedule, SyncRunner, Trigger};

/// Editors often write a file in several steps; wait for them to finish.
const CONFIG_SETTLE: Duration = Duration::from_millis(250);

/// Run the watch command.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let path = utils::config_path(config_path)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(watch(path))
}

async fn watch(path: PathBuf) -> Result<()> {
    let mut config = Config::load(&path)?;
    let (changed_tx, mut changed_rx) = mpsc::unbounded_channel::<()>();
    let _config_watcher = watch_config_file(&path, changed_tx)?;

    let mut running = start(&config);
    output::info("Press Ctrl-C to stop");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::info!("received ctrl-c, shutting down");
                break;
            }
            Some(()) = changed_rx.recv() => {
                tokio::time::sleep(CONFIG_SETTLE).await;
                while changed_rx.try_recv().is_ok() {}

                let updated = match Config::load(&path) {
                    Ok(updated) => updated,
                    Err(e) => {
                        output::warn(&format!("Ignoring unreadable configuration: {e}"));
                        continue;
                    }
                };
                if updated == config {
                    continue;
                }

                output::info("Configuration changed - restarting auto-sync");
                if let Some(auto) = running.take() {
                    auto.stop().await;
                }
                config = updated;
                running = start(&config);
            }
        }
    }

    if let Some(auto) = running {
        auto.stop().await;
    }
    output::info("Stopped watching");
    Ok(())
}

/// Start the scheduler if the configuration allows it.
fn start(config: &Config) -> Option<AutoSync> {
    if !config.auto_sync {
        output::info("Auto-sync is disabled - enable with `bonfire config set auto_sync true`");
        return None;
    }
    let Some(save_path) = config.save_path.clone() else {
        output::warn("Save path not configured - run `bonfire config set save_path <dir>`");
        return None;
    };
    if !utils::open_repo(config).is_initialized() {
        output::warn("Backup repository not initialized - run `bonfire init` first");
        return None;
    }

    let schedule = Schedule {
        save_path,
        interval: Duration::from_secs(config.sync_interval.saturating_mul(60)),
        debounce: DEBOUNCE_WINDOW,
    };
    let runner = Arc::new(BackupRunner {
        config: config.clone(),
    });

    match AutoSync::start(schedule.clone(), runner) {
        Ok(auto) => {
            output::success(&format!(
                "Watching {} (backup every {} min)",
                schedule.save_path.display(),
                config.sync_interval
            ));
            Some(auto)
        }
        Err(e) => {
            output::error(&format!("{e:#}"));
            None
        }
    }
}

/// Notify `changed` whenever the configuration file is written.
fn watch_config_file(
    path: &Path,
    changed: mpsc::UnboundedSender<()>,
) -> Result<RecommendedWatcher> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    std::fs::create_dir_all(&dir)?;
    let file_name = path.file_name().map(ToOwned::to_owned);

    let mut watcher = recommended_watcher(move |res: notify::Result<Event>| {
        let Ok(event) = res else { return };
        if event.kind.is_access() {
            return;
        }
        if event
            .paths
            .iter()
            .any(|p| p.file_name() == file_name.as_deref())
        {
            let _ = changed.send(());
        }
    })
    .context("Failed to create configuration watcher")?;
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;
    Ok(watcher)
}

/// Runs one automatic backup with a fixed configuration.
struct BackupRunner {
    config: Config,
}

impl SyncRunner for BackupRunner {
    fn run(&self, trigger: Trigger) {
        let Some(save_path) = self.config.save_path.as_deref() else {
            return;
        };
        let repo = utils::open_repo(&self.config);

        match run_backup(repo.as_ref(), save_path, SyncMode::Auto) {
            Ok(report) => {
                tracing::info!(
                    ?trigger,
                    files = report.mirror.manifest.files_count,
                    partial = report.is_partial(),
                    "automatic backup finished"
                );
                sync::print_report(&report);
            }
            Err(CoreError::Busy(_)) => {
                output::info("Another backup is running - skipping this one");
            }
            Err(e) => {
                tracing::error!(?trigger, error = %e, "automatic backup failed");
                output::error(&format!("Automatic backup failed: {e}"));
            }
        }
    }
}
