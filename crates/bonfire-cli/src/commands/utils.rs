use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use bonfire_core::remote::resolve_remote_url;
use bonfire_core::{Auth, Config, open_backend};
use bonfire_git::GitOps;
use secrecy::SecretString;

/// Resolve the configuration file, honoring `--config`.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::default_path().context("Cannot locate configuration file"),
    }
}

/// Helper to load the configuration and remember where it came from.
pub fn load_config(explicit: Option<&Path>) -> Result<(Config, PathBuf)> {
    let path = config_path(explicit)?;
    let config = Config::load(&path)
        .with_context(|| format!("Failed to read configuration from {}", path.display()))?;
    Ok((config, path))
}

/// Open the configured backend on the Working Repository.
pub fn open_repo(config: &Config) -> Box<dyn GitOps + Send> {
    open_backend(config.backend, &config.backup_path)
}

/// Helper to open the Working Repository, failing if it doesn't exist yet.
pub fn open_initialized(config: &Config) -> Result<Box<dyn GitOps + Send>> {
    let repo = open_repo(config);
    if !repo.is_initialized() {
        bail!(
            "Backup repository not initialized at {} - run `bonfire init` first",
            config.backup_path.display()
        );
    }
    Ok(repo)
}

/// Remote URL with a token embedded when one is available.
pub fn remote_url(config: &Config) -> Option<SecretString> {
    config
        .repo_url
        .as_deref()
        .map(|url| resolve_remote_url(url, &Auth::auto()))
}
