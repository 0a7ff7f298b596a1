//! # bonfire-git
//!
//! Version-control adapter for Bonfire Backup.
//!
//! Every git operation the sync orchestrator needs goes through the
//! [`GitOps`] trait. Two backends implement it:
//!
//! - [`Repository`]: in-process, built on git2-rs (libgit2).
//! - [`GitCli`]: spawns the `git` executable in the working directory.
//!
//! Failures from either backend are mapped onto the same [`Error`] variants.
//! Mapping git's error text onto those variants is best-effort, see
//! [`classify`].

pub mod classify;
mod cli;
mod error;
mod exclude;
mod repository;
mod traits;

pub use classify::redact_credentials;
pub use cli::GitCli;
pub use error::{Error, ErrorKind, Result};
pub use repository::Repository;
pub use traits::{CommitOutcome, GitOps, RemoteDivergence, RepoStatus};

/// Branch every Working Repository is expected to be on.
pub const DEFAULT_BRANCH: &str = "main";

/// Legacy default branch name that gets migrated to [`DEFAULT_BRANCH`].
pub const LEGACY_BRANCH: &str = "master";

/// Remote name used for the configured endpoint.
pub const DEFAULT_REMOTE: &str = "origin";

/// Message of the commit created when a repository is initialized.
pub const INITIAL_COMMIT_MESSAGE: &str = "Initial commit - Bonfire Backup setup";

/// Identity used for commits when git has no `user.name`/`user.email`.
pub const FALLBACK_NAME: &str = "Bonfire Backup";

/// See [`FALLBACK_NAME`].
pub const FALLBACK_EMAIL: &str = "bonfire-backup@localhost";
