//! Access token resolution for the Remote Endpoint.

use std::process::Command;

use secrecy::{ExposeSecret, SecretString};

use crate::error::{Error, Result};

/// Environment variables consulted by [`Auth::auto`], in order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["BONFIRE_GITHUB_TOKEN", "GITHUB_TOKEN"];

/// Where the access token comes from.
#[derive(Debug, Clone)]
pub enum Auth {
    /// Use token from gh CLI.
    GhCli,

    /// Use token from environment variable.
    EnvVar(String),

    /// Use a specific token.
    Token(SecretString),

    /// Never embed a token; rely on git's own credential handling.
    None,
}

impl Auth {
    /// Create auth from the first available method.
    ///
    /// Tries in order: `BONFIRE_GITHUB_TOKEN`, `GITHUB_TOKEN`, gh CLI.
    #[must_use]
    pub fn auto() -> Self {
        Self::auto_from(|var| std::env::var(var).ok())
    }

    /// Like [`Auth::auto`], reading variables through `lookup`.
    #[must_use]
    pub fn auto_from(lookup: impl Fn(&str) -> Option<String>) -> Self {
        TOKEN_ENV_VARS
            .iter()
            .find(|var| lookup(var).is_some_and(|v| !v.is_empty()))
            .map_or(Self::GhCli, |var| Self::EnvVar((*var).to_string()))
    }

    /// Resolve the authentication to a token.
    ///
    /// # Errors
    /// Returns `NoToken` if no token can be obtained.
    pub fn resolve(&self) -> Result<SecretString> {
        match self {
            Self::GhCli => get_gh_token(),
            Self::EnvVar(var) => std::env::var(var)
                .ok()
                .filter(|v| !v.is_empty())
                .map(SecretString::from)
                .ok_or(Error::NoToken),
            Self::Token(t) => Ok(SecretString::from(t.expose_secret())),
            Self::None => Err(Error::NoToken),
        }
    }
}

impl Default for Auth {
    fn default() -> Self {
        Self::auto()
    }
}

/// Get GitHub token from gh CLI.
fn get_gh_token() -> Result<SecretString> {
    let output = Command::new("gh").args(["auth", "token"]).output()?;

    if !output.status.success() {
        return Err(Error::NoToken);
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();

    if token.is_empty() {
        return Err(Error::NoToken);
    }

    Ok(SecretString::from(token))
}
