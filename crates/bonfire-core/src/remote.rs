//! Credential-bearing remote URLs.
//!
//! A token is only ever embedded into `https://` URLs on `github.com` (or
//! one of its subdomains). The resulting URL is kept in a [`SecretString`]
//! and must not be logged; use [`bonfire_git::redact_credentials`] for
//! anything that ends up in a log line.

use secrecy::{ExposeSecret, SecretString};

use crate::auth::Auth;

const HOSTED_DOMAIN: &str = "github.com";

/// Split an `https://` URL into `(userinfo, host, rest)`.
fn split_https(url: &str) -> Option<(Option<&str>, &str, &str)> {
    let after_scheme = url.strip_prefix("https://")?;
    let authority_end = after_scheme.find('/').unwrap_or(after_scheme.len());
    let (authority, rest) = after_scheme.split_at(authority_end);

    let (userinfo, host_port) = match authority.rsplit_once('@') {
        Some((user, host)) => (Some(user), host),
        None => (None, authority),
    };
    let host = host_port.split(':').next().unwrap_or(host_port);
    Some((userinfo, host, rest))
}

/// Whether the URL points at the hosting service tokens are issued for.
#[must_use]
pub fn is_hosted(url: &str) -> bool {
    split_https(url).is_some_and(|(_, host, _)| {
        let host = host.to_ascii_lowercase();
        host == HOSTED_DOMAIN || host.ends_with(&format!(".{HOSTED_DOMAIN}"))
    })
}

/// Embed `token` as the userinfo of a hosted `https://` URL.
///
/// Returns `None` when the URL is not hosted or already carries
/// credentials; callers then use the URL unchanged.
#[must_use]
pub fn embed_token(url: &str, token: &SecretString) -> Option<SecretString> {
    if !is_hosted(url) {
        return None;
    }
    let (userinfo, _, _) = split_https(url)?;
    if userinfo.is_some() {
        return None;
    }
    let after_scheme = url.strip_prefix("https://")?;
    Some(SecretString::from(format!(
        "https://{}@{after_scheme}",
        token.expose_secret()
    )))
}

/// URL to hand to `set_remote`, with a token embedded when one resolves.
#[must_use]
pub fn resolve_remote_url(url: &str, auth: &Auth) -> SecretString {
    if !is_hosted(url) {
        return SecretString::from(url);
    }
    match auth.resolve() {
        Ok(token) => embed_token(url, &token).unwrap_or_else(|| SecretString::from(url)),
        Err(e) => {
            tracing::debug!(error = %e, "no token for remote, using url as-is");
            SecretString::from(url)
        }
    }
}
