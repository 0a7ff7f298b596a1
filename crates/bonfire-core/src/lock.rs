//! Working Repository locking.
//!
//! Uses advisory file locks (`flock(2)` on Unix) via the `fs2` crate, so a
//! crashed process never leaves a stale lock behind. The lock file lives in
//! the Working Repository itself (it may not have a `.git` yet) and is
//! listed in the committed `.gitignore`.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

/// Name of the lock file inside the Working Repository.
pub const LOCK_FILE: &str = ".bonfire.lock";

/// How long [`RepoLock::acquire`] waits before reporting busy.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// An exclusive lock on a Working Repository.
///
/// Released when dropped.
#[derive(Debug)]
pub struct RepoLock {
    _file: File,
}

impl RepoLock {
    /// Acquire the lock, waiting at most [`DEFAULT_TIMEOUT`].
    ///
    /// # Errors
    /// Returns `Busy` if another process holds the lock.
    pub fn acquire(working_repo: &Path) -> Result<Self> {
        Self::acquire_with_timeout(working_repo, DEFAULT_TIMEOUT)
    }

    /// Acquire the lock, polling until `timeout` expires.
    ///
    /// # Errors
    /// Returns `Busy` on timeout, or an IO error if the lock file can't be
    /// created.
    pub fn acquire_with_timeout(working_repo: &Path, timeout: Duration) -> Result<Self> {
        std::fs::create_dir_all(working_repo)?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(working_repo.join(LOCK_FILE))?;

        let start = Instant::now();
        let poll_interval = Duration::from_millis(10);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { _file: file }),
                Err(_) if start.elapsed() >= timeout => {
                    return Err(Error::Busy(working_repo.to_path_buf()));
                }
                Err(_) => std::thread::sleep(poll_interval),
            }
        }
    }
}
