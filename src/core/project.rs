//! Project root resolution and validation.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::config::ProjectConfig;
use crate::core::errors::{Result, TestlensError};

/// Resolves the project root a run targets.
///
/// Resolution order: explicit override, then an upward search from the current
/// directory for one of the configured config files, then the current directory.
#[derive(Debug, Clone)]
pub struct ProjectLocator {
    config_files: Vec<String>,
}

impl ProjectLocator {
    /// Create a locator for the given project configuration
    pub fn new(config: &ProjectConfig) -> Self {
        Self {
            config_files: config.config_files.clone(),
        }
    }

    /// Resolve and validate the project root
    pub fn resolve(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            debug!(path = %path.display(), "using explicit project root");
            return validate_project_root(path);
        }

        let cwd = env::current_dir()
            .map_err(|e| TestlensError::io("Failed to read current directory", e))?;

        match self.search_upward(&cwd) {
            Some(found) => {
                debug!(path = %found.display(), "found project root by config file");
                validate_project_root(&found)
            }
            None => {
                debug!(path = %cwd.display(), "falling back to current directory");
                validate_project_root(&cwd)
            }
        }
    }

    /// Walk from `start` towards the filesystem root, returning the first
    /// directory containing one of the config files.
    pub fn search_upward(&self, start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| self.config_files.iter().any(|name| dir.join(name).is_file()))
            .map(Path::to_path_buf)
    }
}

/// Check that `path` is an existing directory and return its canonical form.
pub fn validate_project_root(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(TestlensError::config(format!(
            "Project directory does not exist: {}",
            path.display()
        )));
    }

    if !path.is_dir() {
        return Err(TestlensError::config(format!(
            "Project path is not a directory: {}",
            path.display()
        )));
    }

    path.canonicalize().map_err(|e| {
        TestlensError::config(format!(
            "Project directory cannot be resolved: {} ({e})",
            path.display()
        ))
    })
}
