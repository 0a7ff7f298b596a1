//! # bonfire-core
//!
//! Core library for Bonfire Backup: mirroring save files into the Working
//! Repository, writing manifests, restoring, and keeping the repository in
//! sync with its remote.
//!
//! All git access goes through [`bonfire_git::GitOps`], so every operation
//! here works with either backend (or a mock in tests).

pub mod auth;
pub mod backup;
pub mod config;
pub mod error;
pub mod lock;
pub mod manifest;
pub mod mirror;
pub mod remote;
pub mod sync;

#[cfg(test)]
mod test_mocks;

use std::path::Path;

use bonfire_git::{GitCli, GitOps, Repository};

pub use auth::Auth;
pub use backup::{BackupReport, RemoteOutcome, run_backup, run_restore};
pub use config::{Backend, Config};
pub use error::{Error, Result};
pub use lock::RepoLock;
pub use manifest::{RestoreManifest, SyncManifest, SyncMode};
pub use mirror::{MirrorReport, RestoreReport, is_displaced_copy, is_save_file, validate_save_path};
pub use sync::{
    ReconcileReport, RemoteAction, SyncReport, migrate_legacy_branch, pull_latest, reconcile,
    sync_with_remote,
};

/// Content of the `.gitignore` committed into a new Working Repository.
pub const GITIGNORE: &str = "\
# Bonfire Backup
*.tmp
*.log
.DS_Store
Thumbs.db
.bonfire.lock
restore-info.json
";

/// Files in the Working Repository that describe this machine only. They
/// go into `.git/info/exclude`, which also covers repositories whose
/// `.gitignore` predates them.
pub const LOCAL_ONLY: &[&str] = &[lock::LOCK_FILE, manifest::RESTORE_MANIFEST];

/// Open the configured git backend for a Working Repository.
#[must_use]
pub fn open_backend(backend: Backend, workdir: &Path) -> Box<dyn GitOps + Send> {
    match backend {
        Backend::Cli => Box::new(GitCli::new(workdir)),
        Backend::Libgit2 => Box::new(Repository::new(workdir)),
    }
}
