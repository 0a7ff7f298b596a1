//! Remote-sync orchestration.
//!
//! Brings a Working Repository into the expected shape (a `main` branch
//! tracking `origin/main`) and moves commits in both directions.
//!
//! Only a *successful* fetch that shows no `origin/main` counts as an empty
//! remote. A failed fetch is surfaced as-is and never treated as empty.
//!
//! A repository whose whole history is the bootstrap commit holds nothing
//! worth keeping. When its remote already has backups, the local branch is
//! reset onto `origin/main` instead of merged with it, so differing
//! `.gitignore` files can't conflict and an interrupted join can be retried.

use bonfire_git::{DEFAULT_BRANCH, DEFAULT_REMOTE, GitOps, INITIAL_COMMIT_MESSAGE, LEGACY_BRANCH};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{Error, Result};
use crate::{GITIGNORE, LOCAL_ONLY};

/// What happened to the remote during [`sync_with_remote`].
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Remote commits were merged into `main`.
    pub pulled: bool,
    /// Local commits reached the remote.
    pub pushed: bool,
    /// Push failed; local commits are safe but not yet on the remote.
    pub push_error: Option<bonfire_git::Error>,
}

impl SyncReport {
    /// Whether the remote is behind because the push failed.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.push_error.is_some()
    }
}

/// How [`reconcile`] connected the repository to its remote.
#[derive(Debug)]
pub enum RemoteAction {
    /// Fresh local repository moved onto the remote's existing history.
    JoinedRemote,
    /// Fresh local repository pushed to an empty remote.
    Published,
    /// Existing repository synced both ways.
    Synced(SyncReport),
}

/// Result of [`reconcile`].
#[derive(Debug)]
pub struct ReconcileReport {
    /// The repository was created by this call.
    pub fresh: bool,
    /// A legacy `master` branch was renamed to `main`.
    pub migrated_legacy_branch: bool,
    /// `None` in local-only mode.
    pub remote: Option<RemoteAction>,
}

/// Initialize or repair the Working Repository and connect it to the remote.
///
/// `remote_url` may carry an embedded credential; it is handed to git
/// verbatim and never logged.
///
/// # Errors
/// Returns error if initialization, branch migration, fetch, or the first
/// publish/join with the remote fails.
pub fn reconcile<G: GitOps + ?Sized>(
    git: &G,
    remote_url: Option<&SecretString>,
) -> Result<ReconcileReport> {
    let fresh = git.initialize(GITIGNORE)?;
    git.exclude(LOCAL_ONLY)?;
    let migrated_legacy_branch = if fresh {
        false
    } else {
        migrate_legacy_branch(git)?
    };

    let remote = match remote_url {
        Some(url) => Some(connect_remote(git, url, fresh)?),
        None => None,
    };

    Ok(ReconcileReport {
        fresh,
        migrated_legacy_branch,
        remote,
    })
}

fn connect_remote<G: GitOps + ?Sized>(
    git: &G,
    url: &SecretString,
    fresh: bool,
) -> Result<RemoteAction> {
    git.set_remote(DEFAULT_REMOTE, url.expose_secret())?;
    git.fetch(DEFAULT_REMOTE)?;

    let upstream = format!("{DEFAULT_REMOTE}/{DEFAULT_BRANCH}");
    let remote_has_main = git.remote_branch_exists(DEFAULT_REMOTE, DEFAULT_BRANCH);
    let bootstrap = fresh || is_bootstrap_only(git)?;
    tracing::debug!(fresh, bootstrap, remote_has_main, "connecting to remote");

    match (bootstrap, remote_has_main) {
        (true, true) => {
            git.reset_to_remote(DEFAULT_REMOTE, DEFAULT_BRANCH)?;
            git.set_upstream(DEFAULT_BRANCH, &upstream)?;
            tracing::info!("joined existing remote history");
            Ok(RemoteAction::JoinedRemote)
        }
        (true, false) => {
            git.push(DEFAULT_REMOTE, DEFAULT_BRANCH, true)?;
            tracing::info!("published new repository to empty remote");
            Ok(RemoteAction::Published)
        }
        (false, has_main) => {
            if has_main {
                if let Err(e) = git.set_upstream(DEFAULT_BRANCH, &upstream) {
                    tracing::warn!(error = %e, "could not set upstream, continuing");
                }
            }
            Ok(RemoteAction::Synced(sync_with_remote(git)?))
        }
    }
}

/// Whether the only commit is the one [`GitOps::initialize`] creates.
fn is_bootstrap_only<G: GitOps + ?Sized>(git: &G) -> Result<bool> {
    Ok(git.commit_count()? == 1
        && git.last_commit_message()?.as_deref() == Some(INITIAL_COMMIT_MESSAGE))
}

/// Rename a legacy `master` branch to `main`.
///
/// Returns `true` if a migration happened. A detached HEAD is left alone.
///
/// # Errors
/// Returns `MigrationFailed` if `main` can't be created or checked out.
pub fn migrate_legacy_branch<G: GitOps + ?Sized>(git: &G) -> Result<bool> {
    let current = match git.current_branch() {
        Ok(branch) => branch,
        Err(e) => {
            tracing::warn!(error = %e, "cannot determine current branch, skipping migration");
            return Ok(false);
        }
    };
    if current != LEGACY_BRANCH {
        return Ok(false);
    }

    tracing::info!("migrating {LEGACY_BRANCH} to {DEFAULT_BRANCH}");
    if !git.branch_exists(DEFAULT_BRANCH) {
        git.create_branch(DEFAULT_BRANCH)
            .map_err(|e| Error::MigrationFailed(e.to_string()))?;
    }
    git.checkout(DEFAULT_BRANCH)
        .map_err(|e| Error::MigrationFailed(e.to_string()))?;
    if let Err(e) = git.delete_branch(LEGACY_BRANCH) {
        // Already on main; a leftover master is harmless.
        tracing::warn!(error = %e, "could not delete {LEGACY_BRANCH}");
    }
    Ok(true)
}

/// Fetch, then pull and/or push `main` so both sides hold the same history.
///
/// Push failures are reported in [`SyncReport::push_error`] rather than
/// returned, since the local commit already succeeded.
///
/// # Errors
/// Returns error if fetch, divergence computation, or pull fails.
pub fn sync_with_remote<G: GitOps + ?Sized>(git: &G) -> Result<SyncReport> {
    git.fetch(DEFAULT_REMOTE)?;
    let mut report = SyncReport::default();

    if !git.remote_branch_exists(DEFAULT_REMOTE, DEFAULT_BRANCH) {
        tracing::info!("remote has no {DEFAULT_BRANCH}, pushing with upstream");
        push_into(git, true, &mut report);
        return Ok(report);
    }

    let divergence = git.remote_divergence(DEFAULT_REMOTE, DEFAULT_BRANCH)?;
    tracing::debug!(?divergence, "remote divergence");

    let mut ahead = divergence.ahead();
    if divergence.behind() > 0 {
        git.pull(DEFAULT_REMOTE, DEFAULT_BRANCH)?;
        report.pulled = true;
        // A merge may have added a commit of its own.
        ahead = git.remote_divergence(DEFAULT_REMOTE, DEFAULT_BRANCH)?.ahead();
    }
    if ahead > 0 {
        push_into(git, false, &mut report);
    }
    Ok(report)
}

fn push_into<G: GitOps + ?Sized>(git: &G, set_upstream: bool, report: &mut SyncReport) {
    match git.push(DEFAULT_REMOTE, DEFAULT_BRANCH, set_upstream) {
        Ok(()) => report.pushed = true,
        Err(e) => {
            tracing::warn!(error = %e, kind = ?e.kind(), "push failed, changes kept locally");
            report.push_error = Some(e);
        }
    }
}

/// Fetch and merge `origin/main` without pushing.
///
/// Returns `true` if anything was merged.
///
/// # Errors
/// Returns `NotInitialized` without a repository, `RemoteNotConfigured`
/// without `origin`, or the fetch/pull failure.
pub fn pull_latest<G: GitOps + ?Sized>(git: &G) -> Result<bool> {
    if !git.is_initialized() {
        return Err(Error::NotInitialized(git.workdir().to_path_buf()));
    }
    if !git.has_remote(DEFAULT_REMOTE) {
        return Err(bonfire_git::Error::RemoteNotConfigured(DEFAULT_REMOTE.into()).into());
    }
    migrate_legacy_branch(git)?;
    git.fetch(DEFAULT_REMOTE)?;

    let divergence = git.remote_divergence(DEFAULT_REMOTE, DEFAULT_BRANCH)?;
    if divergence.behind() == 0 {
        return Ok(false);
    }
    git.pull(DEFAULT_REMOTE, DEFAULT_BRANCH)?;
    Ok(true)
}
