//! `git` subprocess backend.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::classify::{classify, is_already_tracking, redact_credentials};
use crate::error::{Error, Result};
use crate::exclude;
use crate::traits::{GitOps, RemoteDivergence};
use crate::{DEFAULT_BRANCH, FALLBACK_EMAIL, FALLBACK_NAME, INITIAL_COMMIT_MESSAGE};

/// Runs the `git` executable against a fixed working directory.
///
/// Credential prompts are disabled so a missing or rejected token fails the
/// operation instead of blocking on the terminal, and the C locale keeps
/// error text stable for [`classify`].
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
}

impl GitCli {
    /// Bind to a working directory. The directory does not need to exist yet.
    #[must_use]
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C");
        cmd
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        tracing::trace!(args = %redact_credentials(&args.join(" ")), "git");
        Ok(self.command(args).output()?)
    }

    /// Run git and return stdout, classifying stderr on failure.
    fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string());
        }

        let mut message = String::from_utf8_lossy(&output.stderr).into_owned();
        // Merge conflicts are reported on stdout.
        let stdout = String::from_utf8_lossy(&output.stdout);
        if message.trim().is_empty() || stdout.contains("CONFLICT") {
            message.push_str(&stdout);
        }
        Err(self.failure(args, &message))
    }

    /// Run git and report only whether it exited successfully.
    fn succeeds(&self, args: &[&str]) -> bool {
        self.output(args).is_ok_and(|o| o.status.success())
    }

    fn failure(&self, args: &[&str], message: &str) -> Error {
        if message.contains("CONFLICT") {
            return Error::MergeConflict(self.conflicting_files().unwrap_or_default());
        }
        if message.contains("not a git repository") && !self.is_initialized() {
            return Error::NotARepository;
        }
        classify(&args.join(" "), message)
    }

    fn conflicting_files(&self) -> Result<Vec<String>> {
        let out = self.run(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(out.lines().map(String::from).collect())
    }

    /// Set a repository-local identity if git has none configured.
    fn ensure_identity(&self) -> Result<()> {
        if !self.succeeds(&["config", "user.name"]) {
            self.run(&["config", "user.name", FALLBACK_NAME])?;
        }
        if !self.succeeds(&["config", "user.email"]) {
            self.run(&["config", "user.email", FALLBACK_EMAIL])?;
        }
        Ok(())
    }
}

impl GitOps for GitCli {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn is_initialized(&self) -> bool {
        self.workdir.join(".git").exists()
    }

    fn initialize(&self, gitignore: &str) -> Result<bool> {
        fs::create_dir_all(&self.workdir)?;
        if self.is_initialized() {
            return Ok(false);
        }

        tracing::info!(path = %self.workdir.display(), "initializing repository");
        self.run(&["init", "--quiet"])?;
        let head = format!("refs/heads/{DEFAULT_BRANCH}");
        self.run(&["symbolic-ref", "HEAD", &head])?;
        self.ensure_identity()?;

        fs::write(self.workdir.join(".gitignore"), gitignore)?;
        self.run(&["add", ".gitignore"])?;
        self.run(&["commit", "--quiet", "-m", INITIAL_COMMIT_MESSAGE])?;
        Ok(true)
    }

    fn current_branch(&self) -> Result<String> {
        if !self.is_initialized() {
            return Err(Error::NotARepository);
        }
        self.run(&["symbolic-ref", "--quiet", "--short", "HEAD"])
            .map_err(|_| Error::DetachedHead)
    }

    fn branch_exists(&self, name: &str) -> bool {
        let reference = format!("refs/heads/{name}");
        self.succeeds(&["rev-parse", "--verify", "--quiet", &reference])
    }

    fn create_branch(&self, name: &str) -> Result<()> {
        self.run(&["branch", name]).map(drop)
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        if !self.branch_exists(branch) {
            return Err(Error::BranchNotFound(branch.into()));
        }
        self.run(&["checkout", "--quiet", branch]).map(drop)
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        if !self.branch_exists(name) {
            return Err(Error::BranchNotFound(name.into()));
        }
        self.run(&["branch", "-D", name]).map(drop)
    }

    fn stage_all(&self) -> Result<()> {
        self.run(&["add", "--all"]).map(drop)
    }

    fn has_staged_changes(&self) -> Result<bool> {
        let args = ["diff", "--cached", "--quiet"];
        let output = self.output(&args)?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(self.failure(&args, &String::from_utf8_lossy(&output.stderr))),
        }
    }

    fn create_commit(&self, message: &str) -> Result<()> {
        self.ensure_identity()?;
        self.run(&["commit", "--quiet", "-m", message]).map(drop)
    }

    fn changed_files(&self) -> Result<Vec<String>> {
        let out = self.run(&["status", "--porcelain", "--untracked-files=all"])?;
        Ok(out
            .lines()
            .filter(|line| line.len() > 3)
            .map(|line| {
                let path = &line[3..];
                path.rsplit_once(" -> ")
                    .map_or(path, |(_, to)| to)
                    .trim_matches('"')
                    .to_string()
            })
            .collect())
    }

    fn last_commit_message(&self) -> Result<Option<String>> {
        if !self.succeeds(&["rev-parse", "--verify", "--quiet", "HEAD"]) {
            return Ok(None);
        }
        self.run(&["log", "-1", "--format=%s"]).map(Some)
    }

    fn commit_count(&self) -> Result<usize> {
        if !self.succeeds(&["rev-parse", "--verify", "--quiet", "HEAD"]) {
            return Ok(0);
        }
        let out = self.run(&["rev-list", "--count", "HEAD"])?;
        out.trim().parse().map_err(|_| Error::Command {
            command: "rev-list --count HEAD".into(),
            message: format!("unexpected output: {out}"),
        })
    }

    fn exclude(&self, patterns: &[&str]) -> Result<()> {
        if !self.is_initialized() {
            return Err(Error::NotARepository);
        }
        exclude::append_patterns(&self.workdir.join(".git"), patterns)
    }

    fn has_remote(&self, name: &str) -> bool {
        self.succeeds(&["remote", "get-url", name])
    }

    fn set_remote(&self, name: &str, url: &str) -> Result<()> {
        if self.has_remote(name) {
            self.run(&["remote", "remove", name])?;
        }
        tracing::debug!(remote = name, url = %redact_credentials(url), "setting remote");
        self.run(&["remote", "add", name, url]).map(drop)
    }

    fn remote_branch_exists(&self, remote: &str, branch: &str) -> bool {
        let reference = format!("refs/remotes/{remote}/{branch}");
        self.succeeds(&["rev-parse", "--verify", "--quiet", &reference])
    }

    fn fetch(&self, remote: &str) -> Result<()> {
        if !self.has_remote(remote) {
            return Err(Error::RemoteNotConfigured(remote.into()));
        }
        tracing::debug!(remote, "fetching");
        self.run(&["fetch", "--quiet", "--prune", remote]).map(drop)
    }

    fn push(&self, remote: &str, branch: &str, set_upstream: bool) -> Result<()> {
        if !self.branch_exists(branch) {
            return Err(Error::PushRejected(format!(
                "src refspec {branch} does not match any"
            )));
        }
        tracing::debug!(remote, branch, set_upstream, "pushing");
        let mut args = vec!["push", "--quiet"];
        if set_upstream {
            args.push("--set-upstream");
        }
        args.extend([remote, branch]);
        self.run(&args).map(drop)
    }

    fn pull(&self, remote: &str, branch: &str) -> Result<()> {
        tracing::debug!(remote, branch, "pulling");
        // A merge commit needs an identity just like a backup commit.
        self.ensure_identity()?;
        self.run(&["pull", "--quiet", "--no-rebase", "--no-edit", remote, branch])
            .map(drop)
    }

    fn reset_to_remote(&self, remote: &str, branch: &str) -> Result<()> {
        if !self.remote_branch_exists(remote, branch) {
            return Err(Error::RemoteNotFound(format!(
                "couldn't find remote ref {branch}"
            )));
        }
        let target = format!("{remote}/{branch}");
        tracing::debug!(target = %target, "resetting to remote");
        self.run(&["reset", "--hard", "--quiet", &target]).map(drop)
    }

    fn set_upstream(&self, local: &str, upstream: &str) -> Result<()> {
        let flag = format!("--set-upstream-to={upstream}");
        match self.run(&["branch", &flag, local]) {
            Ok(_) => Ok(()),
            Err(err) if is_already_tracking(&err.to_string()) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn remote_divergence(&self, remote: &str, branch: &str) -> Result<RemoteDivergence> {
        if !self.remote_branch_exists(remote, branch) {
            return Ok(RemoteDivergence::NoRemote);
        }
        let range = format!("{branch}...{remote}/{branch}");
        let out = self.run(&["rev-list", "--left-right", "--count", &range])?;
        parse_left_right(&out).ok_or_else(|| Error::Command {
            command: format!("rev-list --left-right --count {range}"),
            message: format!("unexpected output: {out}"),
        })
    }
}

fn parse_left_right(out: &str) -> Option<RemoteDivergence> {
    let mut parts = out.split_whitespace();
    let ahead = parts.next()?.parse().ok()?;
    let behind = parts.next()?.parse().ok()?;
    Some(RemoteDivergence::from_counts(ahead, behind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CommitOutcome;
    use tempfile::TempDir;

    fn init_test_repo() -> (TempDir, GitCli) {
        let temp = TempDir::new().unwrap();
        let git = GitCli::new(temp.path().join("repo"));
        assert!(git.initialize("*.tmp\n").unwrap());
        (temp, git)
    }

    #[test]
    fn test_parse_left_right() {
        assert_eq!(parse_left_right("0\t0"), Some(RemoteDivergence::InSync));
        assert_eq!(
            parse_left_right("2\t1"),
            Some(RemoteDivergence::Diverged {
                ahead: 2,
                behind: 1
            })
        );
        assert_eq!(parse_left_right("garbage"), None);
    }

    #[test]
    fn test_initialize_creates_main_with_commit() {
        let (_temp, git) = init_test_repo();

        assert!(git.is_initialized());
        assert_eq!(git.current_branch().unwrap(), "main");
        assert_eq!(
            git.last_commit_message().unwrap().as_deref(),
            Some(INITIAL_COMMIT_MESSAGE)
        );
        assert_eq!(
            fs::read_to_string(git.workdir().join(".gitignore")).unwrap(),
            "*.tmp\n"
        );
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (_temp, git) = init_test_repo();
        fs::write(git.workdir().join(".gitignore"), "changed\n").unwrap();

        assert!(!git.initialize("*.tmp\n").unwrap());
        assert_eq!(
            fs::read_to_string(git.workdir().join(".gitignore")).unwrap(),
            "changed\n"
        );
    }

    #[test]
    fn test_commit_without_changes_is_noop() {
        let (_temp, git) = init_test_repo();

        assert_eq!(git.commit("nothing").unwrap(), CommitOutcome::NothingToCommit);
        assert_eq!(
            git.last_commit_message().unwrap().as_deref(),
            Some(INITIAL_COMMIT_MESSAGE)
        );
    }

    #[test]
    fn test_commit_with_changes() {
        let (_temp, git) = init_test_repo();
        fs::write(git.workdir().join("save.sl2"), b"data").unwrap();

        assert_eq!(git.changed_files().unwrap(), vec!["save.sl2".to_string()]);
        assert_eq!(git.commit("backup").unwrap(), CommitOutcome::Created);
        assert!(git.changed_files().unwrap().is_empty());
        assert_eq!(git.last_commit_message().unwrap().as_deref(), Some("backup"));
    }

    #[test]
    fn test_status_on_missing_repo() {
        let temp = TempDir::new().unwrap();
        let git = GitCli::new(temp.path().join("absent"));

        assert_eq!(git.status(), crate::RepoStatus::default());
        assert!(matches!(git.current_branch(), Err(Error::NotARepository)));
    }

    #[test]
    fn test_fetch_without_remote() {
        let (_temp, git) = init_test_repo();
        assert!(matches!(
            git.fetch("origin"),
            Err(Error::RemoteNotConfigured(_))
        ));
    }

    #[test]
    fn test_set_remote_replaces_existing() {
        let (_temp, git) = init_test_repo();

        git.set_remote("origin", "https://example.com/a.git").unwrap();
        git.set_remote("origin", "https://example.com/b.git").unwrap();

        assert_eq!(
            git.run(&["remote", "get-url", "origin"]).unwrap(),
            "https://example.com/b.git"
        );
    }

    #[test]
    fn test_commit_count() {
        let temp = TempDir::new().unwrap();
        let git = GitCli::new(temp.path().join("repo"));
        fs::create_dir_all(git.workdir()).unwrap();
        git.run(&["init", "--quiet"]).unwrap();
        assert_eq!(git.commit_count().unwrap(), 0);

        let (_temp, git) = init_test_repo();
        assert_eq!(git.commit_count().unwrap(), 1);
    }

    #[test]
    fn test_excluded_files_are_not_staged() {
        let (_temp, git) = init_test_repo();
        git.exclude(&["local.lock"]).unwrap();
        fs::write(git.workdir().join("local.lock"), b"").unwrap();

        assert_eq!(git.commit("nothing").unwrap(), CommitOutcome::NothingToCommit);
        assert!(git.changed_files().unwrap().is_empty());
    }

    #[test]
    fn test_push_missing_branch_is_rejected() {
        let (_temp, git) = init_test_repo();
        git.set_remote("origin", "https://example.com/a.git").unwrap();

        assert!(matches!(
            git.push("origin", "nope", false),
            Err(Error::PushRejected(_))
        ));
    }
}
