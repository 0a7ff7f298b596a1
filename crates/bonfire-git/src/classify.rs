//! Mapping of git failure output onto [`Error`] variants.
//!
//! git reports most remote failures only as human-readable text, so the
//! subprocess backend classifies by substring. The libgit2 backend looks at
//! the structured error class/code first and only falls back to the text.
//! Treat the result as a hint for the user, not as a contract: unrecognized
//! messages become [`Error::Command`] with the raw text preserved.

use crate::error::Error;

const NETWORK_PATTERNS: &[&str] = &[
    "could not resolve host",
    "could not resolve hostname",
    "failed to resolve address",
    "temporary failure in name resolution",
    "failed to connect",
    "connection refused",
    "connection timed out",
    "connection reset",
    "network is unreachable",
    "no route to host",
];

const AUTH_PATTERNS: &[&str] = &[
    "authentication failed",
    "authentication required",
    "invalid username or password",
    "could not read username",
    "could not read password",
    "terminal prompts disabled",
    "permission denied",
    "bad credentials",
    "credentials rejected",
    "401",
    "403",
];

const REJECTED_PATTERNS: &[&str] = &[
    "[rejected]",
    "updates were rejected",
    "failed to push some refs",
    "non-fast-forward",
    "src refspec",
    "does not match any",
];

const NOT_FOUND_PATTERNS: &[&str] = &[
    "repository not found",
    "does not appear to be a git repository",
    "could not find repository",
    "couldn't find remote ref",
    "failed to resolve path",
    "not found",
    "404",
];

/// Classify the error output of `git <command>`.
#[must_use]
pub fn classify(command: &str, message: &str) -> Error {
    let message = redact_credentials(message.trim());
    let lower = message.to_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    if lower.contains("refusing to merge unrelated histories") {
        Error::UnrelatedHistories(command.to_string())
    } else if matches(NETWORK_PATTERNS) {
        Error::Network(message)
    } else if matches(AUTH_PATTERNS) {
        Error::AuthFailed(message)
    } else if matches(REJECTED_PATTERNS) {
        Error::PushRejected(message)
    } else if matches(NOT_FOUND_PATTERNS) {
        Error::RemoteNotFound(message)
    } else {
        Error::Command {
            command: redact_credentials(command),
            message,
        }
    }
}

/// Classify a libgit2 error raised during a remote operation.
#[must_use]
pub fn classify_git2(command: &str, err: &git2::Error) -> Error {
    use git2::{ErrorClass, ErrorCode};

    match (err.class(), err.code()) {
        (_, ErrorCode::Auth) => Error::AuthFailed(redact_credentials(err.message())),
        (_, ErrorCode::NotFastForward) => Error::PushRejected(redact_credentials(err.message())),
        (ErrorClass::Net, _) if !is_http_status(err.message()) => {
            Error::Network(redact_credentials(err.message()))
        }
        _ => classify(command, err.message()),
    }
}

/// Whether a `git branch --set-upstream-to` failure just means the tracking
/// relationship is already in place.
#[must_use]
pub fn is_already_tracking(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("already") && (lower.contains("track") || lower.contains("upstream"))
}

fn is_http_status(message: &str) -> bool {
    message.to_lowercase().contains("http status")
}

/// Replace the user-info part of every URL in `text` with `***`.
///
/// Used on every URL or git message that may be logged or shown, so that a
/// token embedded in the remote URL never leaves the process.
#[must_use]
pub fn redact_credentials(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(idx) = rest.find("://") {
        let (head, tail) = rest.split_at(idx + 3);
        out.push_str(head);

        let authority_end = tail
            .find(|c: char| c == '/' || c == '\'' || c == '"' || c.is_whitespace())
            .unwrap_or(tail.len());
        let authority = &tail[..authority_end];

        if let Some(at) = authority.rfind('@') {
            out.push_str("***");
            out.push_str(&authority[at..]);
        } else {
            out.push_str(authority);
        }
        rest = &tail[authority_end..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_network_errors() {
        let err = classify(
            "fetch origin",
            "fatal: unable to access 'https://github.com/a/b.git/': Could not resolve host: github.com",
        );
        assert_eq!(err.kind(), ErrorKind::Network);

        let err = classify("push", "ssh: connect to host github.com port 22: Connection refused");
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[test]
    fn test_auth_errors() {
        let err = classify(
            "fetch origin",
            "remote: Invalid username or password.\nfatal: Authentication failed for 'https://github.com/a/b.git/'",
        );
        assert_eq!(err.kind(), ErrorKind::Auth);

        let err = classify(
            "fetch origin",
            "fatal: could not read Username for 'https://github.com': terminal prompts disabled",
        );
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[test]
    fn test_not_found_errors() {
        let err = classify(
            "fetch origin",
            "remote: Repository not found.\nfatal: repository 'https://github.com/a/b.git/' not found",
        );
        assert_eq!(err.kind(), ErrorKind::RemoteNotFound);

        let err = classify(
            "fetch origin",
            "fatal: '/tmp/nowhere' does not appear to be a git repository",
        );
        assert_eq!(err.kind(), ErrorKind::RemoteNotFound);
    }

    #[test]
    fn test_push_rejected() {
        let err = classify(
            "push origin main",
            " ! [rejected]        main -> main (fetch first)\nerror: failed to push some refs",
        );
        assert_eq!(err.kind(), ErrorKind::PushRejected);

        let err = classify("push origin main", "error: src refspec main does not match any");
        assert_eq!(err.kind(), ErrorKind::PushRejected);
    }

    #[test]
    fn test_unrelated_histories() {
        let err = classify(
            "pull origin main",
            "fatal: refusing to merge unrelated histories",
        );
        assert!(matches!(err, Error::UnrelatedHistories(_)));
    }

    #[test]
    fn test_unknown_preserves_message() {
        let err = classify("status", "fatal: something unexpected");
        match err {
            Error::Command { command, message } => {
                assert_eq!(command, "status");
                assert_eq!(message, "fatal: something unexpected");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_classify_redacts_token() {
        let err = classify(
            "fetch",
            "fatal: Authentication failed for 'https://ghp_secret@github.com/a/b.git/'",
        );
        let text = err.to_string();
        assert!(!text.contains("ghp_secret"));
        assert!(text.contains("***@github.com"));
    }

    #[test]
    fn test_redact_credentials() {
        assert_eq!(
            redact_credentials("https://ghp_abc@github.com/me/saves.git"),
            "https://***@github.com/me/saves.git"
        );
        assert_eq!(
            redact_credentials("https://user:pw@example.com"),
            "https://***@example.com"
        );
        assert_eq!(
            redact_credentials("https://github.com/me/saves.git"),
            "https://github.com/me/saves.git"
        );
        assert_eq!(
            redact_credentials("from 'https://t@h/x' and 'https://u@h/y'"),
            "from 'https://***@h/x' and 'https://***@h/y'"
        );
        assert_eq!(redact_credentials("no urls here"), "no urls here");
    }

    #[test]
    fn test_is_already_tracking() {
        assert!(is_already_tracking(
            "branch 'main' is already tracking 'origin/main'"
        ));
        assert!(!is_already_tracking(
            "fatal: the requested upstream branch 'origin/main' does not exist"
        ));
    }
}
