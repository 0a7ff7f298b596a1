//! `bonfire config` commands - Read and change the configuration.

use std::path::Path;

use anyhow::{Context, Result};
use bonfire_git::redact_credentials;

use crate::commands::utils;
use crate::output;

/// Print the configuration as TOML, with any credential in `repo_url`
/// masked.
pub fn show(config_path: Option<&Path>) -> Result<()> {
    let (mut config, path) = utils::load_config(config_path)?;
    config.repo_url = config.repo_url.as_deref().map(redact_credentials);
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;

    if !path.exists() {
        output::info(&format!(
            "{} does not exist yet - showing defaults",
            path.display()
        ));
    }
    output::essential(rendered.trim_end());
    Ok(())
}

/// Print the configuration file location.
pub fn path(config_path: Option<&Path>) -> Result<()> {
    output::essential(&utils::config_path(config_path)?.display().to_string());
    Ok(())
}

/// Set one key and save.
pub fn set(config_path: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let (mut config, path) = utils::load_config(config_path)?;
    config.set(key, value)?;
    config
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if value.is_empty() {
        output::success(&format!("Cleared {key}"));
    } else {
        output::success(&format!("Set {key} = {}", redact_credentials(value)));
    }
    Ok(())
}
