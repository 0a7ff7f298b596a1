//! Configuration management for Bonfire Backup.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mirror;

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV: &str = "BONFIRE_CONFIG";

/// Bonfire configuration loaded from `<config dir>/bonfire-backup/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory the game writes its save files to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_path: Option<PathBuf>,

    /// Working Repository directory.
    #[serde(default = "default_backup_path")]
    pub backup_path: PathBuf,

    /// Remote Endpoint; local-only when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,

    /// Whether `bonfire watch` syncs on save-file changes.
    #[serde(default)]
    pub auto_sync: bool,

    /// Minutes between scheduled syncs while watching.
    #[serde(default = "default_sync_interval")]
    pub sync_interval: u64,

    /// Which git backend to use.
    #[serde(default)]
    pub backend: Backend,
}

impl Config {
    /// Resolve the configuration file path.
    ///
    /// # Errors
    /// Returns error if neither `BONFIRE_CONFIG` nor a platform config
    /// directory is available.
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        dirs::config_dir()
            .map(|dir| dir.join("bonfire-backup").join("config.toml"))
            .ok_or(Error::NoConfigDir)
    }

    /// Load config from a TOML file, defaulting when the file is missing.
    ///
    /// # Errors
    /// Returns error if file can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to a TOML file, creating its directory if needed.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| std::io::Error::other(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Configured save directory.
    ///
    /// # Errors
    /// Returns `SavePathNotConfigured` if unset.
    pub fn require_save_path(&self) -> Result<&Path> {
        self.save_path
            .as_deref()
            .ok_or(Error::SavePathNotConfigured)
    }

    /// Set a single key from its string form.
    ///
    /// Keys accept both `snake_case` and the `camelCase` names used by earlier
    /// releases. An empty value clears `repo_url` and `save_path`.
    ///
    /// # Errors
    /// Returns error for unknown keys, unparsable values, or a save path
    /// without any recognized save file.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidConfigValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match normalize_key(key).as_str() {
            "save_path" => {
                if value.is_empty() {
                    self.save_path = None;
                    return Ok(());
                }
                let path = PathBuf::from(value);
                if !mirror::validate_save_path(&path) {
                    return Err(Error::InvalidSavePath(path));
                }
                self.save_path = Some(path);
            }
            "backup_path" => {
                if value.is_empty() {
                    return Err(invalid("path cannot be empty"));
                }
                self.backup_path = PathBuf::from(value);
            }
            "repo_url" => {
                self.repo_url = (!value.is_empty()).then(|| value.to_string());
            }
            "auto_sync" => {
                self.auto_sync = value
                    .parse()
                    .map_err(|_| invalid("expected true or false"))?;
            }
            "sync_interval" => {
                let minutes: u64 = value
                    .parse()
                    .map_err(|_| invalid("expected a number of minutes"))?;
                if minutes == 0 {
                    return Err(invalid("interval must be at least one minute"));
                }
                self.sync_interval = minutes;
            }
            "backend" => {
                self.backend = value.parse().map_err(|e: String| invalid(&e))?;
            }
            _ => return Err(Error::UnknownConfigKey(key.to_string())),
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_path: None,
            backup_path: default_backup_path(),
            repo_url: None,
            auto_sync: false,
            sync_interval: default_sync_interval(),
            backend: Backend::default(),
        }
    }
}

fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 2);
    for c in key.chars() {
        match c {
            '-' => out.push('_'),
            c if c.is_ascii_uppercase() => {
                out.push('_');
                out.push(c.to_ascii_lowercase());
            }
            c => out.push(c),
        }
    }
    out
}

fn default_backup_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".bonfire-backup")
}

const fn default_sync_interval() -> u64 {
    5
}

/// Git backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Spawn the `git` executable.
    #[default]
    Cli,
    /// Use libgit2 in-process.
    Libgit2,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cli" | "git" => Ok(Self::Cli),
            "libgit2" | "git2" => Ok(Self::Libgit2),
            other => Err(format!("unknown backend '{other}' (expected cli or libgit2)")),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => f.write_str("cli"),
            Self::Libgit2 => f.write_str("libgit2"),
        }
    }
}
