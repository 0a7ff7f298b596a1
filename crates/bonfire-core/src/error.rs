//! Error types for bonfire-core.

use std::path::PathBuf;

use bonfire_git::ErrorKind;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bonfire-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The Working Repository does not exist yet.
    #[error("backup repository not initialized at {0} - run `bonfire init` first")]
    NotInitialized(PathBuf),

    /// No save directory configured.
    #[error("save path not configured - run `bonfire config set save_path <dir>`")]
    SavePathNotConfigured,

    /// Directory does not contain any recognized save file.
    #[error("no Dark Souls III save files found in {0}")]
    InvalidSavePath(PathBuf),

    /// Renaming the legacy `master` branch to `main` failed.
    #[error("branch migration failed: {0}")]
    MigrationFailed(String),

    /// Another sync or restore holds the repository lock.
    #[error("another sync or restore is running on {0}")]
    Busy(PathBuf),

    /// Unknown configuration key.
    #[error("unknown config key '{0}'")]
    UnknownConfigKey(String),

    /// Configuration value could not be parsed.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidConfigValue {
        /// The key being set.
        key: String,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No access token could be found.
    #[error("no GitHub token found - set BONFIRE_GITHUB_TOKEN or run `gh auth login`")]
    NoToken,

    /// Configuration file location could not be determined.
    #[error("cannot determine configuration directory - set BONFIRE_CONFIG")]
    NoConfigDir,

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Git operation error.
    #[error(transparent)]
    Git(#[from] bonfire_git::Error),
}

impl Error {
    /// Git failure class, if this error came from a git operation.
    #[must_use]
    pub const fn git_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Git(err) => Some(err.kind()),
            Self::NotInitialized(_) => Some(ErrorKind::NotInitialized),
            _ => None,
        }
    }
}
