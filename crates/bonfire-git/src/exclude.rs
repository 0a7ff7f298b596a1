//! Per-repository ignore rules in `.git/info/exclude`.

use std::fs;
use std::path::Path;

use crate::error::Result;

/// Append the patterns missing from `<git_dir>/info/exclude`.
pub(crate) fn append_patterns(git_dir: &Path, patterns: &[&str]) -> Result<()> {
    let path = git_dir.join("info").join("exclude");
    let existing = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let missing: Vec<&str> = patterns
        .iter()
        .copied()
        .filter(|p| !existing.lines().any(|line| line.trim() == *p))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    for pattern in missing {
        content.push_str(pattern);
        content.push('\n');
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(&path, content)?;
    tracing::debug!(path = %path.display(), "updated exclude file");
    Ok(())
}
