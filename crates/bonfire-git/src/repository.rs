//! libgit2 backend: repository wrapper providing high-level git operations.

use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{
    BranchType, Cred, CredentialType, ErrorCode, FetchOptions, FetchPrune, IndexAddOption, Oid,
    PushOptions, RemoteCallbacks, ResetType, Signature, StatusOptions,
};

use crate::classify::{classify_git2, redact_credentials};
use crate::error::{Error, Result};
use crate::exclude;
use crate::traits::{GitOps, RemoteDivergence};
use crate::{DEFAULT_BRANCH, FALLBACK_EMAIL, FALLBACK_NAME, INITIAL_COMMIT_MESSAGE};

/// Maximum credential callback invocations before giving up; libgit2 keeps
/// asking as long as the callback returns credentials.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// High-level wrapper around a git repository, bound to a working directory.
///
/// The underlying `git2::Repository` is opened lazily so the wrapper can be
/// created before [`GitOps::initialize`] has run.
pub struct Repository {
    workdir: PathBuf,
    inner: OnceCell<git2::Repository>,
}

impl Repository {
    /// Bind to a working directory. The directory does not need to exist yet.
    #[must_use]
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            inner: OnceCell::new(),
        }
    }

    /// Open an existing repository at the given path.
    ///
    /// # Errors
    /// Returns error if no repository exists at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let inner = git2::Repository::open(path.as_ref()).map_err(|_| Error::NotARepository)?;
        let workdir = inner
            .workdir()
            .map_or_else(|| path.as_ref().to_path_buf(), Path::to_path_buf);
        let repo = Self::new(workdir);
        let _ = repo.inner.set(inner);
        Ok(repo)
    }

    /// Get a reference to the underlying git2 repository.
    ///
    /// # Errors
    /// Returns `NotARepository` if the working directory has no repository.
    pub fn inner(&self) -> Result<&git2::Repository> {
        if let Some(repo) = self.inner.get() {
            return Ok(repo);
        }
        if !self.is_initialized() {
            return Err(Error::NotARepository);
        }
        let repo = git2::Repository::open(&self.workdir)?;
        Ok(self.inner.get_or_init(|| repo))
    }

    /// Get the default signature for commits, falling back to a fixed
    /// identity when git config has no user.name/email.
    fn signature(repo: &git2::Repository) -> Result<Signature<'static>> {
        repo.signature()
            .or_else(|_| Signature::now(FALLBACK_NAME, FALLBACK_EMAIL))
            .map_err(Into::into)
    }

    fn head_commit(repo: &git2::Repository) -> Result<Option<git2::Commit<'_>>> {
        match repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?)),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Full ref name HEAD points at, valid even on an unborn branch.
    fn head_target(repo: &git2::Repository) -> Result<String> {
        let head = repo.find_reference("HEAD")?;
        head.symbolic_target()
            .map(String::from)
            .ok_or(Error::DetachedHead)
    }

    fn remote_tracking_oid(repo: &git2::Repository, remote: &str, branch: &str) -> Option<Oid> {
        repo.find_branch(&format!("{remote}/{branch}"), BranchType::Remote)
            .ok()
            .and_then(|b| b.get().target())
    }

    /// Move HEAD's branch to `target` and update the working tree.
    fn fast_forward(repo: &git2::Repository, target: Oid) -> Result<()> {
        let head_ref = Self::head_target(repo)?;
        repo.reference(&head_ref, target, true, "pull: fast-forward")?;
        repo.set_head(&head_ref)?;
        repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
        Ok(())
    }

    /// Three-way merge of `theirs` into HEAD.
    fn merge_into_head(
        repo: &git2::Repository,
        ours: &git2::Commit<'_>,
        theirs: &git2::Commit<'_>,
        label: &str,
    ) -> Result<()> {
        let ancestor_tree = match repo.merge_base(ours.id(), theirs.id()) {
            Ok(base) => repo.find_commit(base)?.tree()?,
            Err(e) if e.code() == ErrorCode::NotFound => {
                return Err(Error::UnrelatedHistories(label.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut index = repo.merge_trees(&ancestor_tree, &ours.tree()?, &theirs.tree()?, None)?;
        if index.has_conflicts() {
            let files = index
                .conflicts()?
                .filter_map(std::result::Result::ok)
                .filter_map(|c| c.our.or(c.their).or(c.ancestor))
                .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
                .collect();
            return Err(Error::MergeConflict(files));
        }

        let tree_id = index.write_tree_to(repo)?;
        let tree = repo.find_tree(tree_id)?;
        let sig = Self::signature(repo)?;
        let message = format!("Merge remote-tracking branch '{label}'");
        repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &[ours, theirs])?;
        repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
        Ok(())
    }
}

/// Credential callbacks for remote operations.
///
/// A user name embedded in the URL is treated as an access token (the form
/// produced for hosted remotes); otherwise the configured credential helper
/// or ssh-agent is asked.
fn remote_callbacks<'a>(config: git2::Config) -> RemoteCallbacks<'a> {
    let mut attempts = 0;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str(
                "authentication failed: credentials rejected",
            ));
        }

        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Some(token) = username {
                return Cred::userpass_plaintext(token, "x-oauth-basic");
            }
            return Cred::credential_helper(&config, url, username);
        }
        if allowed.contains(CredentialType::SSH_KEY) {
            return Cred::ssh_key_from_agent(username.unwrap_or("git"));
        }
        Cred::default()
    });
    callbacks
}

impl GitOps for Repository {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn is_initialized(&self) -> bool {
        self.inner.get().is_some() || self.workdir.join(".git").exists()
    }

    fn initialize(&self, gitignore: &str) -> Result<bool> {
        fs::create_dir_all(&self.workdir)?;
        if self.is_initialized() {
            return Ok(false);
        }

        tracing::info!(path = %self.workdir.display(), "initializing repository");
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head(DEFAULT_BRANCH);
        let repo = git2::Repository::init_opts(&self.workdir, &opts)?;

        fs::write(self.workdir.join(".gitignore"), gitignore)?;
        {
            let mut index = repo.index()?;
            index.add_path(Path::new(".gitignore"))?;
            index.write()?;
            let tree = repo.find_tree(index.write_tree()?)?;
            let sig = Self::signature(&repo)?;
            repo.commit(Some("HEAD"), &sig, &sig, INITIAL_COMMIT_MESSAGE, &tree, &[])?;
        }

        let _ = self.inner.set(repo);
        Ok(true)
    }

    fn current_branch(&self) -> Result<String> {
        let repo = self.inner()?;
        let target = Self::head_target(repo)?;
        target
            .strip_prefix("refs/heads/")
            .map(String::from)
            .ok_or(Error::DetachedHead)
    }

    fn branch_exists(&self, name: &str) -> bool {
        self.inner()
            .is_ok_and(|repo| repo.find_branch(name, BranchType::Local).is_ok())
    }

    fn create_branch(&self, name: &str) -> Result<()> {
        let repo = self.inner()?;
        let head_commit = repo.head()?.peel_to_commit()?;
        repo.branch(name, &head_commit, false)?;
        Ok(())
    }

    fn checkout(&self, branch_name: &str) -> Result<()> {
        let repo = self.inner()?;
        let branch = repo
            .find_branch(branch_name, BranchType::Local)
            .map_err(|_| Error::BranchNotFound(branch_name.into()))?;

        let object = branch.get().peel(git2::ObjectType::Commit)?;
        repo.checkout_tree(&object, None)?;
        repo.set_head(&format!("refs/heads/{branch_name}"))?;
        Ok(())
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        let repo = self.inner()?;
        let mut branch = repo
            .find_branch(name, BranchType::Local)
            .map_err(|_| Error::BranchNotFound(name.into()))?;
        branch.delete()?;
        Ok(())
    }

    fn stage_all(&self) -> Result<()> {
        let repo = self.inner()?;
        let mut index = repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    }

    fn has_staged_changes(&self) -> Result<bool> {
        let repo = self.inner()?;
        let index = repo.index()?;
        let head_tree = match Self::head_commit(repo)? {
            Some(commit) => Some(commit.tree()?),
            None => None,
        };
        let diff = repo.diff_tree_to_index(head_tree.as_ref(), Some(&index), None)?;
        Ok(diff.deltas().len() > 0)
    }

    fn create_commit(&self, message: &str) -> Result<()> {
        let repo = self.inner()?;
        let mut index = repo.index()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let sig = Self::signature(repo)?;
        let parent = Self::head_commit(repo)?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        Ok(())
    }

    fn changed_files(&self) -> Result<Vec<String>> {
        let repo = self.inner()?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let statuses = repo.statuses(Some(&mut opts))?;
        Ok(statuses
            .iter()
            .filter_map(|entry| entry.path().map(String::from))
            .collect())
    }

    fn last_commit_message(&self) -> Result<Option<String>> {
        let repo = self.inner()?;
        Ok(Self::head_commit(repo)?.and_then(|c| c.summary().map(String::from)))
    }

    fn commit_count(&self) -> Result<usize> {
        let repo = self.inner()?;
        if Self::head_commit(repo)?.is_none() {
            return Ok(0);
        }
        let mut walk = repo.revwalk()?;
        walk.push_head()?;
        Ok(walk.count())
    }

    fn exclude(&self, patterns: &[&str]) -> Result<()> {
        let repo = self.inner()?;
        exclude::append_patterns(repo.path(), patterns)
    }

    fn has_remote(&self, name: &str) -> bool {
        self.inner().is_ok_and(|repo| repo.find_remote(name).is_ok())
    }

    fn set_remote(&self, name: &str, url: &str) -> Result<()> {
        let repo = self.inner()?;
        if self.has_remote(name) {
            repo.remote_delete(name)?;
        }
        tracing::debug!(remote = name, url = %redact_credentials(url), "setting remote");
        repo.remote(name, url)?;
        Ok(())
    }

    fn remote_branch_exists(&self, remote: &str, branch: &str) -> bool {
        self.inner()
            .is_ok_and(|repo| Self::remote_tracking_oid(repo, remote, branch).is_some())
    }

    fn fetch(&self, remote_name: &str) -> Result<()> {
        let repo = self.inner()?;
        let mut remote = repo
            .find_remote(remote_name)
            .map_err(|_| Error::RemoteNotConfigured(remote_name.into()))?;

        tracing::debug!(remote = remote_name, "fetching");
        let mut opts = FetchOptions::new();
        opts.remote_callbacks(remote_callbacks(repo.config()?));
        opts.prune(FetchPrune::On);
        remote
            .fetch(&[] as &[&str], Some(&mut opts), None)
            .map_err(|e| classify_git2(&format!("fetch {remote_name}"), &e))
    }

    fn push(&self, remote_name: &str, branch: &str, set_upstream: bool) -> Result<()> {
        let repo = self.inner()?;
        if !self.branch_exists(branch) {
            return Err(Error::PushRejected(format!(
                "src refspec {branch} does not match any"
            )));
        }
        let mut remote = repo
            .find_remote(remote_name)
            .map_err(|_| Error::RemoteNotConfigured(remote_name.into()))?;

        tracing::debug!(remote = remote_name, branch, set_upstream, "pushing");
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let mut rejected: Option<String> = None;
        {
            let mut callbacks = remote_callbacks(repo.config()?);
            callbacks.push_update_reference(|refname, status| {
                if let Some(msg) = status {
                    rejected = Some(format!("{refname}: {msg}"));
                }
                Ok(())
            });
            let mut opts = PushOptions::new();
            opts.remote_callbacks(callbacks);
            remote
                .push(&[refspec.as_str()], Some(&mut opts))
                .map_err(|e| classify_git2(&format!("push {remote_name} {branch}"), &e))?;
        }
        if let Some(msg) = rejected {
            return Err(Error::PushRejected(msg));
        }

        // Record the pushed position like `git push` does.
        let local = repo
            .find_branch(branch, BranchType::Local)?
            .get()
            .target()
            .ok_or_else(|| Error::BranchNotFound(branch.into()))?;
        repo.reference(
            &format!("refs/remotes/{remote_name}/{branch}"),
            local,
            true,
            "push",
        )?;

        if set_upstream {
            self.set_upstream(branch, &format!("{remote_name}/{branch}"))?;
        }
        Ok(())
    }

    fn pull(&self, remote: &str, branch: &str) -> Result<()> {
        self.fetch(remote)?;

        let repo = self.inner()?;
        let label = format!("{remote}/{branch}");
        let their_oid = Self::remote_tracking_oid(repo, remote, branch).ok_or_else(|| {
            Error::RemoteNotFound(format!("couldn't find remote ref {branch}"))
        })?;
        let theirs = repo.find_commit(their_oid)?;

        tracing::debug!(remote, branch, "pulling");
        let Some(ours) = Self::head_commit(repo)? else {
            return Self::fast_forward(repo, their_oid);
        };

        if ours.id() == their_oid || repo.graph_descendant_of(ours.id(), their_oid)? {
            return Ok(());
        }
        if repo.graph_descendant_of(their_oid, ours.id())? {
            return Self::fast_forward(repo, their_oid);
        }
        Self::merge_into_head(repo, &ours, &theirs, &label)
    }

    fn reset_to_remote(&self, remote: &str, branch: &str) -> Result<()> {
        let repo = self.inner()?;
        let target = Self::remote_tracking_oid(repo, remote, branch).ok_or_else(|| {
            Error::RemoteNotFound(format!("couldn't find remote ref {branch}"))
        })?;
        tracing::debug!(remote, branch, "resetting to remote");

        let object = repo.find_object(target, None)?;
        repo.reset(&object, ResetType::Hard, Some(CheckoutBuilder::new().force()))?;
        // Drop any half-finished merge left behind by an earlier attempt.
        repo.cleanup_state()?;
        Ok(())
    }

    fn set_upstream(&self, local: &str, upstream: &str) -> Result<()> {
        let repo = self.inner()?;
        let mut branch = repo
            .find_branch(local, BranchType::Local)
            .map_err(|_| Error::BranchNotFound(local.into()))?;

        let current = branch
            .upstream()
            .ok()
            .and_then(|u| u.name().ok().flatten().map(String::from));
        if current.as_deref() == Some(upstream) {
            return Ok(());
        }
        branch.set_upstream(Some(upstream))?;
        Ok(())
    }

    fn remote_divergence(&self, remote: &str, branch: &str) -> Result<RemoteDivergence> {
        let repo = self.inner()?;
        let Some(remote_oid) = Self::remote_tracking_oid(repo, remote, branch) else {
            return Ok(RemoteDivergence::NoRemote);
        };
        let local_oid = repo
            .find_branch(branch, BranchType::Local)
            .map_err(|_| Error::BranchNotFound(branch.into()))?
            .get()
            .target()
            .ok_or_else(|| Error::BranchNotFound(branch.into()))?;

        let (ahead, behind) = repo.graph_ahead_behind(local_oid, remote_oid)?;
        Ok(RemoteDivergence::from_counts(ahead, behind))
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("workdir", &self.workdir)
            .finish_non_exhaustive()
    }
}
