//! Scoped change of the process working directory.
//!
//! The working directory is process-wide state. A [`WorkingDirGuard`] holds a
//! global lock for its whole lifetime so concurrent runs enter and restore in
//! turn; keep it only around code that does not await.

use std::env;
use std::path::{Path, PathBuf};

use parking_lot::{const_mutex, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::core::errors::{Result, TestlensError};

static WORKING_DIR_LOCK: Mutex<()> = const_mutex(());

/// Changes the working directory on creation and restores the previous one on drop.
///
/// Not reentrant: entering a second guard on a thread that already holds one
/// deadlocks.
#[derive(Debug)]
pub struct WorkingDirGuard {
    original: PathBuf,
    current: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl WorkingDirGuard {
    /// Enter `target`, remembering the directory to return to.
    pub fn enter(target: impl AsRef<Path>) -> Result<Self> {
        let target = target.as_ref();
        let lock = WORKING_DIR_LOCK.lock();
        let original = env::current_dir()
            .map_err(|e| TestlensError::io("Failed to read current directory", e))?;

        env::set_current_dir(target).map_err(|e| {
            TestlensError::io(
                format!("Failed to change directory to {}", target.display()),
                e,
            )
        })?;

        debug!(
            from = %original.display(),
            to = %target.display(),
            "entered working directory"
        );

        Ok(Self {
            original,
            current: target.to_path_buf(),
            _lock: lock,
        })
    }

    /// Directory that will be restored on drop
    pub fn original(&self) -> &Path {
        &self.original
    }

    /// Directory entered by this guard
    pub fn current(&self) -> &Path {
        &self.current
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Err(err) = env::set_current_dir(&self.original) {
            warn!(
                original = %self.original.display(),
                error = %err,
                "failed to restore working directory"
            );
        }
    }
}
