//! Error types for bonfire-git.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during git operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The working directory has no git metadata yet.
    #[error("not a git repository")]
    NotARepository,

    /// Branch not found.
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// HEAD is detached (not on a branch).
    #[error("HEAD is detached - checkout a branch first")]
    DetachedHead,

    /// Remote is not configured locally.
    #[error("remote not configured: {0}")]
    RemoteNotConfigured(String),

    /// Remote host could not be reached.
    #[error("network unavailable: {0}")]
    Network(String),

    /// Remote rejected the credentials (or none were available).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Remote repository (or the requested ref on it) does not exist.
    #[error("remote not found: {0}")]
    RemoteNotFound(String),

    /// Push was rejected, e.g. non-fast-forward or the local branch does not
    /// match the one being pushed.
    #[error("push rejected: {0}")]
    PushRejected(String),

    /// Pull refused because the two histories share no ancestor.
    #[error("refusing to merge unrelated histories from {0}")]
    UnrelatedHistories(String),

    /// Merge stopped on conflicting files.
    #[error("merge conflict in: {0:?}")]
    MergeConflict(Vec<String>),

    /// A `git` invocation failed for a reason that could not be classified.
    #[error("git {command} failed: {message}")]
    Command {
        /// Subcommand and arguments, credentials redacted.
        command: String,
        /// Raw error output, credentials redacted.
        message: String,
    },

    /// IO error (working directory or spawning `git`).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying git2 error.
    #[error("git error: {0}")]
    Git2(#[from] git2::Error),
}

/// Coarse classification of an [`Error`], used for reporting and hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The repository does not exist yet.
    NotInitialized,
    /// Host unreachable.
    Network,
    /// Credential rejected.
    Auth,
    /// Missing remote content.
    RemoteNotFound,
    /// Push rejected or branch mismatch.
    PushRejected,
    /// Merge could not complete.
    Conflict,
    /// Anything else; the raw message is preserved on the error.
    Unknown,
}

impl Error {
    /// Classify this error into an [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotARepository => ErrorKind::NotInitialized,
            Self::Network(_) => ErrorKind::Network,
            Self::AuthFailed(_) => ErrorKind::Auth,
            Self::RemoteNotFound(_) | Self::RemoteNotConfigured(_) => ErrorKind::RemoteNotFound,
            Self::PushRejected(_) => ErrorKind::PushRejected,
            Self::UnrelatedHistories(_) | Self::MergeConflict(_) => ErrorKind::Conflict,
            Self::BranchNotFound(_)
            | Self::DetachedHead
            | Self::Command { .. }
            | Self::Io(_)
            | Self::Git2(_) => ErrorKind::Unknown,
        }
    }
}
