//! One backup or restore pass over the Working Repository.
//!
//! Both hold the repository lock for their whole duration, so a `watch`
//! process and a one-shot `bonfire sync` never interleave.

use std::path::Path;

use bonfire_git::{CommitOutcome, DEFAULT_REMOTE, GitOps};
use chrono::SecondsFormat;

use crate::LOCAL_ONLY;
use crate::error::{Error, Result};
use crate::lock::RepoLock;
use crate::manifest::SyncMode;
use crate::mirror::{self, MirrorReport, RestoreReport};
use crate::sync::{self, SyncReport};

/// What happened with the remote after the local commit.
#[derive(Debug)]
pub enum RemoteOutcome {
    /// No remote configured.
    LocalOnly,
    /// Sync ran; see [`SyncReport::push_error`] for a failed push.
    Synced(SyncReport),
    /// Fetch or pull failed after the local commit succeeded.
    Failed(Error),
}

/// Result of [`run_backup`].
#[derive(Debug)]
pub struct BackupReport {
    pub mirror: MirrorReport,
    pub commit: CommitOutcome,
    pub remote: RemoteOutcome,
}

impl BackupReport {
    /// The local backup succeeded but the remote is not up to date.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        match &self.remote {
            RemoteOutcome::LocalOnly => false,
            RemoteOutcome::Synced(report) => report.is_partial(),
            RemoteOutcome::Failed(_) => true,
        }
    }

    /// The remote failure, if any.
    #[must_use]
    pub fn remote_error(&self) -> Option<String> {
        match &self.remote {
            RemoteOutcome::LocalOnly => None,
            RemoteOutcome::Synced(report) => report.push_error.as_ref().map(ToString::to_string),
            RemoteOutcome::Failed(e) => Some(e.to_string()),
        }
    }
}

/// Mirror `save_path`, commit, and sync with `origin` when configured.
///
/// When the save files are identical to the last backup and nothing else is
/// pending, the mirror and commit are skipped; the remote is still synced so
/// an earlier failed push gets retried. Local failures abort. Once the commit exists, remote failures are
/// reported in [`BackupReport::remote`] instead of returned.
///
/// # Errors
/// Returns `Busy` if the repository is locked, `NotInitialized` without a
/// repository, or any mirror/commit failure.
pub fn run_backup<G: GitOps + ?Sized>(
    git: &G,
    save_path: &Path,
    mode: SyncMode,
) -> Result<BackupReport> {
    let workdir = git.workdir();
    if !git.is_initialized() {
        return Err(Error::NotInitialized(workdir.to_path_buf()));
    }
    let _lock = RepoLock::acquire(workdir)?;
    git.exclude(LOCAL_ONLY)?;

    let (mirror, commit) = match mirror::unchanged_since_last(save_path, workdir)? {
        Some(manifest) if git.changed_files()?.is_empty() => {
            tracing::debug!("save files unchanged since last backup");
            (MirrorReport { manifest }, CommitOutcome::NothingToCommit)
        }
        _ => {
            let mirror = mirror::mirror(save_path, workdir, mode)?;
            let message = format!(
                "{} save backup - {}",
                mode.label(),
                mirror
                    .manifest
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Millis, true)
            );
            let commit = git.commit(&message)?;
            (mirror, commit)
        }
    };
    tracing::info!(
        files = mirror.manifest.files_count,
        committed = commit == CommitOutcome::Created,
        %mode,
        "backup recorded"
    );

    let remote = if git.has_remote(DEFAULT_REMOTE) {
        match sync::migrate_legacy_branch(git).and_then(|_| sync::sync_with_remote(git)) {
            Ok(report) => RemoteOutcome::Synced(report),
            Err(e) => {
                tracing::warn!(error = %e, "remote sync failed, backup kept locally");
                RemoteOutcome::Failed(e)
            }
        }
    } else {
        RemoteOutcome::LocalOnly
    };

    Ok(BackupReport {
        mirror,
        commit,
        remote,
    })
}

/// Copy the backed-up saves from `working_repo` into `destination`.
///
/// # Errors
/// Returns `Busy` if the repository is locked, `NotInitialized` if there is
/// no Working Repository, or any I/O failure.
pub fn run_restore(working_repo: &Path, destination: &Path) -> Result<RestoreReport> {
    if !working_repo.is_dir() {
        return Err(Error::NotInitialized(working_repo.to_path_buf()));
    }
    let _lock = RepoLock::acquire(working_repo)?;
    let report = mirror::restore(working_repo, destination)?;
    tracing::info!(
        restored = report.restored().len(),
        displaced = report.displaced().len(),
        destination = %destination.display(),
        "restore complete"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_mocks::MockGitOps;
    use std::fs;
    use tempfile::TempDir;

    fn saves() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("DS30000.sl2"), b"slot").unwrap();
        dir
    }

    #[test]
    fn test_backup_requires_repository() {
        let repo = TempDir::new().unwrap();
        let git = MockGitOps::new().with_workdir(repo.path());

        let err = run_backup(&git, saves().path(), SyncMode::Manual).unwrap_err();
        assert!(matches!(err, Error::NotInitialized(_)));
    }

    #[test]
    fn test_backup_local_only() {
        let repo = TempDir::new().unwrap();
        let git = MockGitOps::existing("main").with_workdir(repo.path());
        git.has_staged_changes.set(true);

        let report = run_backup(&git, saves().path(), SyncMode::Manual).unwrap();

        assert_eq!(report.commit, CommitOutcome::Created);
        assert!(matches!(report.remote, RemoteOutcome::LocalOnly));
        assert!(!report.is_partial());
        assert!(repo.path().join("DS30000.sl2").exists());
        let calls = git.calls();
        assert!(calls[1].starts_with("commit Manual save backup - "), "{calls:?}");
    }

    #[test]
    fn test_backup_without_changes_skips_commit() {
        let repo = TempDir::new().unwrap();
        let git = MockGitOps::existing("main").with_workdir(repo.path());

        let report = run_backup(&git, saves().path(), SyncMode::Auto).unwrap();
        assert_eq!(report.commit, CommitOutcome::NothingToCommit);
        assert!(!git.calls().iter().any(|c| c.starts_with("commit")));
    }

    #[test]
    fn test_unchanged_saves_are_not_recommitted() {
        let repo = TempDir::new().unwrap();
        let saves = saves();
        let git = MockGitOps::existing("main").with_workdir(repo.path());

        git.has_staged_changes.set(true);
        let first = run_backup(&git, saves.path(), SyncMode::Manual).unwrap();
        assert_eq!(first.commit, CommitOutcome::Created);

        // Would commit again if asked to.
        git.has_staged_changes.set(true);
        let second = run_backup(&git, saves.path(), SyncMode::Auto).unwrap();
        assert_eq!(second.commit, CommitOutcome::NothingToCommit);
        assert_eq!(second.mirror.manifest, first.mirror.manifest);
        assert_eq!(
            git.calls().iter().filter(|c| c.starts_with("commit")).count(),
            1
        );
    }

    #[test]
    fn test_unchanged_saves_still_retry_push() {
        let repo = TempDir::new().unwrap();
        let saves = saves();
        let git = MockGitOps::existing("main")
            .with_workdir(repo.path())
            .with_remote()
            .with_remote_branch("main");
        git.has_staged_changes.set(true);
        git.fail_push.set(true);
        assert!(run_backup(&git, saves.path(), SyncMode::Auto).unwrap().is_partial());

        git.fail_push.set(false);
        let report = run_backup(&git, saves.path(), SyncMode::Auto).unwrap();
        assert_eq!(report.commit, CommitOutcome::NothingToCommit);
        let RemoteOutcome::Synced(sync) = report.remote else {
            panic!("expected Synced");
        };
        assert!(sync.pushed);
    }

    #[test]
    fn test_backup_excludes_local_only_files() {
        let repo = TempDir::new().unwrap();
        let git = MockGitOps::existing("main").with_workdir(repo.path());

        run_backup(&git, saves().path(), SyncMode::Manual).unwrap();
        assert_eq!(*git.excluded.borrow(), LOCAL_ONLY);
    }

    #[test]
    fn test_backup_push_failure_is_partial() {
        let repo = TempDir::new().unwrap();
        let git = MockGitOps::existing("main")
            .with_workdir(repo.path())
            .with_remote()
            .with_remote_branch("main");
        git.has_staged_changes.set(true);
        git.fail_push.set(true);

        let report = run_backup(&git, saves().path(), SyncMode::Auto).unwrap();
        assert_eq!(report.commit, CommitOutcome::Created);
        assert!(report.is_partial());
        assert!(report.remote_error().is_some());
    }

    #[test]
    fn test_backup_fetch_failure_is_partial() {
        let repo = TempDir::new().unwrap();
        let git = MockGitOps::existing("main")
            .with_workdir(repo.path())
            .with_remote();
        git.has_staged_changes.set(true);
        git.fail_fetch.set(true);

        let report = run_backup(&git, saves().path(), SyncMode::Manual).unwrap();
        assert!(matches!(report.remote, RemoteOutcome::Failed(_)));
        assert!(report.is_partial());
    }

    #[test]
    fn test_backup_refuses_when_locked() {
        let repo = TempDir::new().unwrap();
        let git = MockGitOps::existing("main").with_workdir(repo.path());
        let _held = RepoLock::acquire(repo.path()).unwrap();

        let err = run_backup(&git, saves().path(), SyncMode::Manual).unwrap_err();
        assert!(matches!(err, Error::Busy(_)));
    }

    #[test]
    fn test_restore_requires_working_repo() {
        let dir = TempDir::new().unwrap();
        let err = run_restore(&dir.path().join("missing"), dir.path()).unwrap_err();
        assert!(matches!(err, Error::NotInitialized(_)));
    }
}
