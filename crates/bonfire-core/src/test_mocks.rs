//! Mock implementation of `GitOps` for testing the orchestrator.
//!
//! Every call is appended to `calls` so tests can assert on the exact
//! sequence of git operations.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use bonfire_git::{Error, GitOps, INITIAL_COMMIT_MESSAGE, RemoteDivergence, Result};

pub struct MockGitOps {
    pub workdir: PathBuf,
    pub initialized: Cell<bool>,
    pub current_branch: RefCell<String>,
    pub branches: RefCell<HashSet<String>>,
    pub remotes: RefCell<HashSet<String>>,
    pub remote_branches: RefCell<HashSet<String>>,
    pub divergence: Cell<(usize, usize)>,
    pub has_staged_changes: Cell<bool>,
    pub commits: Cell<usize>,
    pub last_message: RefCell<Option<String>>,
    pub excluded: RefCell<Vec<String>>,
    pub fail_fetch: Cell<bool>,
    pub fail_push: Cell<bool>,
    pub fail_create_branch: Cell<bool>,
    pub fail_set_upstream: Cell<bool>,
    pub calls: RefCell<Vec<String>>,
}

impl Default for MockGitOps {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGitOps {
    /// An uninitialized repository.
    pub fn new() -> Self {
        Self {
            workdir: PathBuf::from("/mock/backup"),
            initialized: Cell::new(false),
            current_branch: RefCell::new("main".to_string()),
            branches: RefCell::new(HashSet::new()),
            remotes: RefCell::new(HashSet::new()),
            remote_branches: RefCell::new(HashSet::new()),
            divergence: Cell::new((0, 0)),
            has_staged_changes: Cell::new(false),
            commits: Cell::new(0),
            last_message: RefCell::new(None),
            excluded: RefCell::new(Vec::new()),
            fail_fetch: Cell::new(false),
            fail_push: Cell::new(false),
            fail_create_branch: Cell::new(false),
            fail_set_upstream: Cell::new(false),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// An existing repository on `branch`.
    pub fn existing(branch: &str) -> Self {
        let mock = Self::new();
        mock.initialized.set(true);
        *mock.current_branch.borrow_mut() = branch.to_string();
        mock.branches.borrow_mut().insert(branch.to_string());
        mock.commits.set(2);
        *mock.last_message.borrow_mut() = Some("Manual save backup".to_string());
        mock
    }

    /// An existing repository holding only the initial commit on `main`.
    pub fn bootstrap_only() -> Self {
        let mock = Self::existing("main");
        mock.commits.set(1);
        *mock.last_message.borrow_mut() = Some(INITIAL_COMMIT_MESSAGE.to_string());
        mock
    }

    pub fn with_workdir(mut self, dir: &Path) -> Self {
        self.workdir = dir.to_path_buf();
        self
    }

    pub fn with_remote(self) -> Self {
        self.remotes.borrow_mut().insert("origin".to_string());
        self
    }

    /// Remote-tracking branch that appears once `fetch` succeeds.
    pub fn with_remote_branch(self, branch: &str) -> Self {
        self.remote_branches.borrow_mut().insert(branch.to_string());
        self
    }

    pub fn with_divergence(self, ahead: usize, behind: usize) -> Self {
        self.divergence.set((ahead, behind));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }
}

impl GitOps for MockGitOps {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    fn initialize(&self, _gitignore: &str) -> Result<bool> {
        if self.initialized.get() {
            return Ok(false);
        }
        self.record("init");
        self.initialized.set(true);
        self.branches.borrow_mut().insert("main".to_string());
        *self.current_branch.borrow_mut() = "main".to_string();
        self.commits.set(1);
        *self.last_message.borrow_mut() = Some(INITIAL_COMMIT_MESSAGE.to_string());
        Ok(true)
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.current_branch.borrow().clone())
    }

    fn branch_exists(&self, name: &str) -> bool {
        self.branches.borrow().contains(name)
    }

    fn create_branch(&self, name: &str) -> Result<()> {
        self.record(format!("create_branch {name}"));
        if self.fail_create_branch.get() {
            return Err(Error::Command {
                command: format!("branch {name}"),
                message: "cannot lock ref".into(),
            });
        }
        self.branches.borrow_mut().insert(name.to_string());
        Ok(())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.record(format!("checkout {branch}"));
        if !self.branch_exists(branch) {
            return Err(Error::BranchNotFound(branch.to_string()));
        }
        *self.current_branch.borrow_mut() = branch.to_string();
        Ok(())
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        self.record(format!("delete_branch {name}"));
        self.branches.borrow_mut().remove(name);
        Ok(())
    }

    fn stage_all(&self) -> Result<()> {
        self.record("stage_all");
        Ok(())
    }

    fn has_staged_changes(&self) -> Result<bool> {
        Ok(self.has_staged_changes.get())
    }

    fn create_commit(&self, message: &str) -> Result<()> {
        self.record(format!("commit {message}"));
        self.has_staged_changes.set(false);
        self.commits.set(self.commits.get() + 1);
        *self.last_message.borrow_mut() = Some(message.to_string());
        let (ahead, behind) = self.divergence.get();
        self.divergence.set((ahead + 1, behind));
        Ok(())
    }

    fn changed_files(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn last_commit_message(&self) -> Result<Option<String>> {
        Ok(self.last_message.borrow().clone())
    }

    fn commit_count(&self) -> Result<usize> {
        Ok(self.commits.get())
    }

    fn exclude(&self, patterns: &[&str]) -> Result<()> {
        let mut excluded = self.excluded.borrow_mut();
        for pattern in patterns {
            if !excluded.iter().any(|p| p == pattern) {
                excluded.push((*pattern).to_string());
            }
        }
        Ok(())
    }

    fn has_remote(&self, name: &str) -> bool {
        self.remotes.borrow().contains(name)
    }

    fn set_remote(&self, name: &str, url: &str) -> Result<()> {
        self.record(format!("set_remote {name} {url}"));
        self.remotes.borrow_mut().insert(name.to_string());
        Ok(())
    }

    fn remote_branch_exists(&self, _remote: &str, branch: &str) -> bool {
        self.calls.borrow().iter().any(|c| c.starts_with("fetch"))
            && self.remote_branches.borrow().contains(branch)
    }

    fn fetch(&self, remote: &str) -> Result<()> {
        self.record(format!("fetch {remote}"));
        if self.fail_fetch.get() {
            return Err(Error::Network("could not resolve host: github.com".into()));
        }
        Ok(())
    }

    fn push(&self, remote: &str, branch: &str, set_upstream: bool) -> Result<()> {
        let flag = if set_upstream { " -u" } else { "" };
        self.record(format!("push{flag} {remote} {branch}"));
        if self.fail_push.get() {
            return Err(Error::PushRejected("non-fast-forward".into()));
        }
        self.remote_branches.borrow_mut().insert(branch.to_string());
        let (_, behind) = self.divergence.get();
        self.divergence.set((0, behind));
        Ok(())
    }

    fn pull(&self, remote: &str, branch: &str) -> Result<()> {
        self.record(format!("pull {remote} {branch}"));
        let (ahead, behind) = self.divergence.get();
        // A non-fast-forward pull leaves a merge commit to push.
        let ahead = if ahead > 0 && behind > 0 { ahead + 1 } else { ahead };
        self.divergence.set((ahead, 0));
        Ok(())
    }

    fn reset_to_remote(&self, remote: &str, branch: &str) -> Result<()> {
        self.record(format!("reset_hard {remote}/{branch}"));
        self.divergence.set((0, 0));
        Ok(())
    }

    fn set_upstream(&self, local: &str, upstream: &str) -> Result<()> {
        self.record(format!("set_upstream {local} {upstream}"));
        if self.fail_set_upstream.get() {
            return Err(Error::BranchNotFound(upstream.to_string()));
        }
        Ok(())
    }

    fn remote_divergence(&self, remote: &str, branch: &str) -> Result<RemoteDivergence> {
        if !self.remote_branch_exists(remote, branch) {
            return Ok(RemoteDivergence::NoRemote);
        }
        let (ahead, behind) = self.divergence.get();
        Ok(RemoteDivergence::from_counts(ahead, behind))
    }
}
