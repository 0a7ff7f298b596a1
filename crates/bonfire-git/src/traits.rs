//! Trait abstractions for git operations.
//!
//! This module defines the `GitOps` trait which abstracts git operations,
//! enabling dependency injection and testability.

use std::path::Path;

use crate::{DEFAULT_REMOTE, Result};

/// Divergence between a local branch and its remote counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteDivergence {
    /// Local and remote point at the same commit.
    InSync,
    /// Local has commits the remote lacks.
    Ahead { commits: usize },
    /// Remote has commits the local branch lacks.
    Behind { commits: usize },
    /// Both sides have commits the other lacks.
    Diverged { ahead: usize, behind: usize },
    /// The remote-tracking branch does not exist.
    NoRemote,
}

impl RemoteDivergence {
    /// Build from raw ahead/behind counts.
    #[must_use]
    pub const fn from_counts(ahead: usize, behind: usize) -> Self {
        match (ahead, behind) {
            (0, 0) => Self::InSync,
            (ahead, 0) => Self::Ahead { commits: ahead },
            (0, behind) => Self::Behind { commits: behind },
            (ahead, behind) => Self::Diverged { ahead, behind },
        }
    }

    /// Local commits not on the remote.
    #[must_use]
    pub const fn ahead(&self) -> usize {
        match self {
            Self::Ahead { commits } => *commits,
            Self::Diverged { ahead, .. } => *ahead,
            Self::InSync | Self::Behind { .. } | Self::NoRemote => 0,
        }
    }

    /// Remote commits not present locally.
    #[must_use]
    pub const fn behind(&self) -> usize {
        match self {
            Self::Behind { commits } => *commits,
            Self::Diverged { behind, .. } => *behind,
            Self::InSync | Self::Ahead { .. } | Self::NoRemote => 0,
        }
    }
}

/// Result of [`GitOps::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A new commit was created.
    Created,
    /// Staged tree matched HEAD; no commit was made.
    NothingToCommit,
}

/// Snapshot of the working repository for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoStatus {
    pub has_changes: bool,
    pub ahead: usize,
    pub behind: usize,
    pub files: Vec<String>,
    pub last_commit: Option<String>,
}

/// Trait for git repository operations.
///
/// Implementations are bound to one working directory. The trait allows for:
/// - Swapping the libgit2 backend for the `git` subprocess backend
/// - Mock implementations for testing the orchestrator
///
/// git operations are synchronous; callers in async contexts run them on a
/// blocking thread.
#[allow(clippy::missing_errors_doc)]
pub trait GitOps {
    // === Repository Info ===

    /// Get the working directory path.
    fn workdir(&self) -> &Path;

    /// Whether git metadata exists in the working directory.
    fn is_initialized(&self) -> bool;

    /// Create the working directory and repository if missing.
    ///
    /// A new repository gets `main` as its default branch, a `.gitignore`
    /// with the given content, and one initial commit. Returns `true` when
    /// the repository was created by this call, `false` when it already
    /// existed (in which case nothing is touched).
    fn initialize(&self, gitignore: &str) -> Result<bool>;

    /// Get the current branch name.
    ///
    /// Returns an error if HEAD is detached.
    fn current_branch(&self) -> Result<String>;

    // === Branch Operations ===

    /// Check if a local branch exists.
    fn branch_exists(&self, name: &str) -> bool;

    /// Create a new branch at the current HEAD.
    fn create_branch(&self, name: &str) -> Result<()>;

    /// Checkout a branch.
    fn checkout(&self, branch: &str) -> Result<()>;

    /// Delete a local branch.
    fn delete_branch(&self, name: &str) -> Result<()>;

    // === Working Directory ===

    /// Stage all changes, including deletions and untracked files.
    fn stage_all(&self) -> Result<()>;

    /// Check if the index differs from HEAD.
    fn has_staged_changes(&self) -> Result<bool>;

    /// Create a commit with the staged changes.
    fn create_commit(&self, message: &str) -> Result<()>;

    /// Paths with uncommitted changes (staged, unstaged or untracked).
    fn changed_files(&self) -> Result<Vec<String>>;

    /// Summary line of the HEAD commit, `None` on an unborn branch.
    fn last_commit_message(&self) -> Result<Option<String>>;

    /// Number of commits reachable from HEAD, `0` on an unborn branch.
    fn commit_count(&self) -> Result<usize>;

    /// Add `patterns` to `.git/info/exclude`, skipping ones already listed.
    ///
    /// Unlike `.gitignore`, the exclude file is never committed, so it works
    /// the same in repositories this crate did not create.
    fn exclude(&self, patterns: &[&str]) -> Result<()>;

    // === Remote Operations ===

    /// Check if a remote is configured.
    fn has_remote(&self, name: &str) -> bool;

    /// Point `name` at `url`, replacing any existing remote of that name.
    fn set_remote(&self, name: &str, url: &str) -> Result<()>;

    /// Check if `<remote>/<branch>` exists as a remote-tracking branch.
    fn remote_branch_exists(&self, remote: &str, branch: &str) -> bool;

    /// Fetch from a remote.
    fn fetch(&self, remote: &str) -> Result<()>;

    /// Push a branch, optionally recording the upstream (`push -u`).
    fn push(&self, remote: &str, branch: &str, set_upstream: bool) -> Result<()>;

    /// Fetch and merge `<remote>/<branch>` into the current branch.
    ///
    /// Histories without a common ancestor are refused with
    /// [`Error::UnrelatedHistories`](crate::Error::UnrelatedHistories).
    fn pull(&self, remote: &str, branch: &str) -> Result<()>;

    /// Point the current branch at `<remote>/<branch>`, discarding local
    /// commits and resetting the index and working tree (`reset --hard`).
    fn reset_to_remote(&self, remote: &str, branch: &str) -> Result<()>;

    /// Make `local` track `upstream` (e.g. `origin/main`).
    ///
    /// Succeeds if the tracking relationship already exists.
    fn set_upstream(&self, local: &str, upstream: &str) -> Result<()>;

    /// Divergence between `branch` and `<remote>/<branch>`.
    fn remote_divergence(&self, remote: &str, branch: &str) -> Result<RemoteDivergence>;

    // === Provided ===

    /// Stage everything and commit if the staged diff is non-empty.
    fn commit(&self, message: &str) -> Result<CommitOutcome> {
        self.stage_all()?;
        if !self.has_staged_changes()? {
            tracing::debug!("nothing to commit");
            return Ok(CommitOutcome::NothingToCommit);
        }
        self.create_commit(message)?;
        Ok(CommitOutcome::Created)
    }

    /// Status for display. Never fails: any error yields the empty status.
    fn status(&self) -> RepoStatus {
        if !self.is_initialized() {
            return RepoStatus::default();
        }
        match collect_status(self) {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(error = %err, "status query failed, reporting empty status");
                RepoStatus::default()
            }
        }
    }
}

fn collect_status<G: GitOps + ?Sized>(git: &G) -> Result<RepoStatus> {
    let files = git.changed_files()?;
    let divergence = match git.current_branch() {
        Ok(branch) if git.remote_branch_exists(DEFAULT_REMOTE, &branch) => {
            git.remote_divergence(DEFAULT_REMOTE, &branch)?
        }
        _ => RemoteDivergence::NoRemote,
    };

    Ok(RepoStatus {
        has_changes: !files.is_empty(),
        ahead: divergence.ahead(),
        behind: divergence.behind(),
        files,
        last_commit: git.last_commit_message()?,
    })
}
