//! Manifests written into the Working Repository.
//!
//! `sync-info.json` is committed with every backup; `restore-info.json` is
//! git-ignored and only records the most recent restore on this machine.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// File name of the sync manifest.
pub const SYNC_MANIFEST: &str = "sync-info.json";

/// File name of the restore manifest.
pub const RESTORE_MANIFEST: &str = "restore-info.json";

/// What triggered a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Started by the user.
    Manual,
    /// Started by the watcher or the interval timer.
    Auto,
}

impl SyncMode {
    /// Label used in commit messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Manual => "Manual",
            Self::Auto => "Automatic",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => f.write_str("manual"),
            Self::Auto => f.write_str("auto"),
        }
    }
}

/// Record of the last mirror pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncManifest {
    pub timestamp: DateTime<Utc>,
    pub mode: SyncMode,
    pub files_count: usize,
    pub files: Vec<String>,
}

impl SyncManifest {
    #[must_use]
    pub fn new(mode: SyncMode, files: Vec<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            mode,
            files_count: files.len(),
            files,
        }
    }

    /// Overwrite `sync-info.json` in `dir`.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn write(&self, dir: &Path) -> Result<()> {
        write_json(&dir.join(SYNC_MANIFEST), self)
    }

    /// Read `sync-info.json` from `dir`, `None` if there is none.
    ///
    /// # Errors
    /// Returns error if the file exists but can't be read or parsed.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        read_json(&dir.join(SYNC_MANIFEST))
    }
}

/// Record of the last restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreManifest {
    pub timestamp: DateTime<Utc>,
    pub destination: PathBuf,
    pub files_count: usize,
    pub files: Vec<String>,
    /// Names the displaced destination files were renamed to.
    pub displaced: Vec<String>,
}

impl RestoreManifest {
    /// Overwrite `restore-info.json` in `dir`.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn write(&self, dir: &Path) -> Result<()> {
        write_json(&dir.join(RESTORE_MANIFEST), self)
    }

    /// # Errors
    /// Returns error if the file exists but can't be read or parsed.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        read_json(&dir.join(RESTORE_MANIFEST))
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    fs::write(path, content)?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sync_manifest_wire_format() {
        let manifest = SyncManifest::new(SyncMode::Auto, vec!["DS30000.sl2".into()]);
        let json: serde_json::Value = serde_json::to_value(&manifest).unwrap();

        assert_eq!(json["mode"], "auto");
        assert_eq!(json["filesCount"], 1);
        assert_eq!(json["files"][0], "DS30000.sl2");
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_reads_manifest_from_earlier_release() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(SYNC_MANIFEST),
            r#"{
  "timestamp": "2024-03-01T18:22:05.123Z",
  "mode": "manual",
  "filesCount": 2,
  "files": ["DS30000.sl2", "DS30000.sl2.bak"]
}"#,
        )
        .unwrap();

        let manifest = SyncManifest::load(temp.path()).unwrap().unwrap();
        assert_eq!(manifest.mode, SyncMode::Manual);
        assert_eq!(manifest.files_count, 2);
    }

    #[test]
    fn test_load_missing() {
        let temp = TempDir::new().unwrap();
        assert!(SyncManifest::load(temp.path()).unwrap().is_none());
        assert!(RestoreManifest::load(temp.path()).unwrap().is_none());
    }

    #[test]
    fn test_write_overwrites() {
        let temp = TempDir::new().unwrap();
        SyncManifest::new(SyncMode::Manual, vec!["a.sl2".into(), "b.sl2".into()])
            .write(temp.path())
            .unwrap();
        SyncManifest::new(SyncMode::Auto, vec![])
            .write(temp.path())
            .unwrap();

        let manifest = SyncManifest::load(temp.path()).unwrap().unwrap();
        assert_eq!(manifest.mode, SyncMode::Auto);
        assert_eq!(manifest.files_count, 0);
    }

    #[test]
    fn test_mode_labels() {
        assert_eq!(SyncMode::Manual.label(), "Manual");
        assert_eq!(SyncMode::Auto.label(), "Automatic");
        assert_eq!(SyncMode::Auto.to_string(), "auto");
    }
}
