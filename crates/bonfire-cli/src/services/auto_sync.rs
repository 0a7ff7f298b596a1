//! Auto-sync scheduler behind `bonfire watch`.
//!
//! The pipeline is: file-system events → trailing-edge debounce → bounded
//! job queue → single sync worker. An interval timer feeds the same queue.
//! The queue holds at most one pending job, so bursts of triggers while a
//! sync is running collapse into one follow-up sync.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bonfire_core::{is_displaced_copy, is_save_file};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Quiet period after the last save-file event before a sync starts.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(2);

/// Why a sync was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    FileChange,
    Interval,
}

/// Performs one sync. Runs on a blocking thread.
pub trait SyncRunner: Send + Sync + 'static {
    fn run(&self, trigger: Trigger);
}

/// What to watch and how often to sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub save_path: PathBuf,
    pub interval: Duration,
    pub debounce: Duration,
}

/// A running scheduler. Dropping it without [`AutoSync::stop`] leaves the
/// tasks to end with the runtime.
pub struct AutoSync {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    _watcher: RecommendedWatcher,
}

impl AutoSync {
    /// Start watching `schedule.save_path`. Must be called inside a tokio
    /// runtime.
    pub fn start(schedule: Schedule, runner: Arc<dyn SyncRunner>) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<()>();
        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_save_change(&event) => {
                let _ = event_tx.send(());
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "watcher event error"),
        })
        .context("Failed to create file watcher")?;
        watcher
            .watch(&schedule.save_path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", schedule.save_path.display()))?;

        let (job_tx, job_rx) = mpsc::channel::<Trigger>(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tracing::info!(
            path = %schedule.save_path.display(),
            interval_secs = schedule.interval.as_secs(),
            "auto-sync started"
        );
        let scheduler = tokio::spawn(schedule_task(
            schedule,
            event_rx,
            job_tx,
            shutdown_rx.clone(),
        ));
        let worker = tokio::spawn(worker_task(runner, job_rx, shutdown_rx));

        Ok(Self {
            shutdown: shutdown_tx,
            tasks: vec![scheduler, worker],
            _watcher: watcher,
        })
    }

    /// Stop the scheduler, waiting for an in-flight sync to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "auto-sync task failed");
            }
        }
        tracing::info!("auto-sync stopped");
    }
}

fn is_save_change(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|path| is_save_path(path))
}

fn is_save_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| {
            !name.starts_with('.') && is_save_file(name) && !is_displaced_copy(name)
        })
}

/// Queue a sync unless one is already pending.
fn enqueue(jobs: &mpsc::Sender<Trigger>, trigger: Trigger) -> bool {
    match jobs.try_send(trigger) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::debug!(?trigger, "sync already pending, dropping trigger");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

async fn schedule_task(
    schedule: Schedule,
    mut events: mpsc::UnboundedReceiver<()>,
    jobs: mpsc::Sender<Trigger>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval =
        tokio::time::interval_at(Instant::now() + schedule.interval, schedule.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut deadline: Option<Instant> = None;

    loop {
        let pending = deadline;
        let debounce = async move {
            match pending {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = shutdown.changed() => break,
            event = events.recv() => {
                if event.is_none() {
                    break;
                }
                deadline = Some(Instant::now() + schedule.debounce);
            }
            () = debounce => {
                deadline = None;
                enqueue(&jobs, Trigger::FileChange);
            }
            _ = interval.tick() => {
                enqueue(&jobs, Trigger::Interval);
            }
        }
    }
}

async fn worker_task(
    runner: Arc<dyn SyncRunner>,
    mut jobs: mpsc::Receiver<Trigger>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            job = jobs.recv() => {
                let Some(trigger) = job else { break };
                tracing::debug!(?trigger, "starting sync");
                let runner = Arc::clone(&runner);
                if let Err(err) = tokio::task::spawn_blocking(move || runner.run(trigger)).await {
                    tracing::error!(error = %err, "sync task panicked");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::sleep;

    fn schedule(interval: Duration) -> Schedule {
        Schedule {
            save_path: PathBuf::from("/saves"),
            interval,
            debounce: DEBOUNCE_WINDOW,
        }
    }

    struct Recorder(Mutex<Vec<Trigger>>);

    impl SyncRunner for Recorder {
        fn run(&self, trigger: Trigger) {
            self.0.lock().unwrap().push(trigger);
        }
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn debounce_coalesces_rapid_events() {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (job_tx, mut job_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(schedule_task(
            schedule(Duration::from_secs(3600)),
            event_rx,
            job_tx,
            shutdown_rx,
        ));

        for _ in 0..5 {
            event_tx.send(()).unwrap();
            sleep(Duration::from_millis(300)).await;
        }

        // Trailing edge: nothing until the window after the last event.
        sleep(Duration::from_millis(1600)).await;
        assert!(job_rx.try_recv().is_err());

        sleep(Duration::from_millis(200)).await;
        assert_eq!(job_rx.try_recv().unwrap(), Trigger::FileChange);

        sleep(Duration::from_secs(10)).await;
        assert!(
            job_rx.try_recv().is_err(),
            "rapid saves should collapse to one sync trigger"
        );
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn interval_triggers_sync() {
        let (_event_tx, event_rx) = mpsc::unbounded_channel();
        let (job_tx, mut job_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(schedule_task(
            schedule(Duration::from_secs(300)),
            event_rx,
            job_tx,
            shutdown_rx,
        ));

        sleep(Duration::from_secs(299)).await;
        assert!(job_rx.try_recv().is_err());

        sleep(Duration::from_secs(2)).await;
        assert_eq!(job_rx.try_recv().unwrap(), Trigger::Interval);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn shutdown_stops_scheduler() {
        let (_event_tx, event_rx) = mpsc::unbounded_channel();
        let (job_tx, _job_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(schedule_task(
            schedule(Duration::from_secs(60)),
            event_rx,
            job_tx,
            shutdown_rx,
        ));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[test]
    fn enqueue_keeps_one_pending_job() {
        let (job_tx, mut job_rx) = mpsc::channel(1);

        assert!(enqueue(&job_tx, Trigger::FileChange));
        assert!(!enqueue(&job_tx, Trigger::Interval));
        assert_eq!(job_rx.try_recv().unwrap(), Trigger::FileChange);
        assert!(enqueue(&job_tx, Trigger::Interval));
    }

    #[tokio::test]
    async fn worker_runs_queued_jobs_in_order() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let (job_tx, job_rx) = mpsc::channel(4);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner: Arc<dyn SyncRunner> = recorder.clone();
        let worker = tokio::spawn(worker_task(runner, job_rx, shutdown_rx));

        job_tx.send(Trigger::FileChange).await.unwrap();
        job_tx.send(Trigger::Interval).await.unwrap();
        drop(job_tx);
        worker.await.unwrap();

        assert_eq!(
            *recorder.0.lock().unwrap(),
            [Trigger::FileChange, Trigger::Interval]
        );
    }

    #[test]
    fn only_save_files_trigger() {
        let modify = |path: &str| {
            Event::new(EventKind::Modify(notify::event::ModifyKind::Any))
                .add_path(PathBuf::from(path))
        };

        assert!(is_save_change(&modify("/saves/DS30000.sl2")));
        assert!(!is_save_change(&modify("/saves/GraphicsConfig.xml")));
        assert!(!is_save_change(&modify("/saves/.DS30000.sl2.swp")));
        assert!(!is_save_change(&modify(
            "/saves/DS30000.sl2.backup.20240101T000000000Z"
        )));
        assert!(!is_save_change(
            &Event::new(EventKind::Remove(notify::event::RemoveKind::File))
                .add_path(PathBuf::from("/saves/DS30000.sl2"))
        ));
    }
}
