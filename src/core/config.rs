//! Configuration types and management for testlens-rs.
//!
//! Configuration is a plain serde structure persisted as YAML. Every section has
//! a `Default` that matches a stock vitest project, and `validate` is called by
//! the orchestrator before any subprocess is launched.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TestlensError};

/// Main configuration for the testlens orchestrator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestlensConfig {
    /// Runner subprocess configuration
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Coverage artifact configuration
    #[serde(default)]
    pub coverage: CoverageConfig,

    /// Project root discovery configuration
    #[serde(default)]
    pub project: ProjectConfig,
}

impl TestlensConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            TestlensError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;

        serde_yaml::from_str(&content).map_err(Into::into)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content).map_err(|e| {
            TestlensError::io(
                format!("Failed to write config file: {}", path.display()),
                e,
            )
        })
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> Result<()> {
        self.runner.validate()?;
        self.coverage.validate()?;
        self.project.validate()?;
        Ok(())
    }
}

/// How the output assembler decides that the runner's report is complete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMode {
    /// Sniff the buffered stdout for a complete JSON report and stop the
    /// runner as soon as one is present
    #[default]
    Heuristic,
    /// Wait for end-of-stream and process exit only
    ProcessExit,
}

/// Runner subprocess configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Program to launch
    pub program: String,

    /// Arguments enabling the structured (JSON) reporter
    pub args: Vec<String>,

    /// Arguments appended when coverage instrumentation is requested
    pub coverage_args: Vec<String>,

    /// Exit codes meaning "the tests ran" (all passed / some failed)
    pub accepted_exit_codes: Vec<i32>,

    /// Hard bound on a single run, in milliseconds
    pub timeout_ms: u64,

    /// Delay between signalling the runner and resolving, in milliseconds
    pub grace_period_ms: u64,

    /// Upper bound on captured bytes per output stream
    pub max_output_bytes: usize,

    /// Completion detection strategy
    pub completion: CompletionMode,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            args: vec![
                "vitest".to_string(),
                "run".to_string(),
                "--reporter=json".to_string(),
            ],
            coverage_args: vec![
                "--coverage".to_string(),
                "--coverage.reporter=json".to_string(),
                "--coverage.reporter=json-summary".to_string(),
            ],
            accepted_exit_codes: vec![0, 1],
            timeout_ms: 120_000,
            grace_period_ms: 100,
            max_output_bytes: 50 * 1024 * 1024,
            completion: CompletionMode::Heuristic,
        }
    }
}

impl RunnerConfig {
    /// Run timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Grace period as a [`Duration`]
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Whether `code` means the runner completed its tests
    pub fn accepts_exit_code(&self, code: i32) -> bool {
        self.accepted_exit_codes.contains(&code)
    }

    /// Validate the runner configuration
    pub fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(TestlensError::config_field(
                "Runner program must not be empty",
                "runner.program",
            ));
        }

        if self.timeout_ms == 0 {
            return Err(TestlensError::config_field(
                "Runner timeout must be greater than 0",
                "runner.timeout_ms",
            ));
        }

        if self.accepted_exit_codes.is_empty() {
            return Err(TestlensError::config_field(
                "At least one accepted exit code is required",
                "runner.accepted_exit_codes",
            ));
        }

        if self.max_output_bytes == 0 {
            return Err(TestlensError::config_field(
                "max_output_bytes must be greater than 0",
                "runner.max_output_bytes",
            ));
        }

        Ok(())
    }
}

/// Coverage artifact configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Directory (relative to the project root) the runner writes coverage into
    pub directory: PathBuf,

    /// Per-file summary document
    pub summary_file: String,

    /// Per-file statement-level document
    pub detail_file: String,

    /// Increasing delays between artifact checks, in milliseconds
    pub poll_delays_ms: Vec<u64>,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("coverage"),
            summary_file: "coverage-summary.json".to_string(),
            detail_file: "coverage-final.json".to_string(),
            poll_delays_ms: vec![100, 250, 500, 1000],
        }
    }
}

impl CoverageConfig {
    /// The polling schedule as durations
    pub fn poll_schedule(&self) -> Vec<Duration> {
        self.poll_delays_ms
            .iter()
            .copied()
            .map(Duration::from_millis)
            .collect()
    }

    /// Validate the coverage configuration
    pub fn validate(&self) -> Result<()> {
        if self.summary_file.trim().is_empty() || self.detail_file.trim().is_empty() {
            return Err(TestlensError::config_field(
                "Coverage artifact file names must not be empty",
                "coverage",
            ));
        }

        if self.poll_delays_ms.is_empty() {
            return Err(TestlensError::config_field(
                "Coverage poll schedule must contain at least one delay",
                "coverage.poll_delays_ms",
            ));
        }

        if self.poll_delays_ms.windows(2).any(|w| w[1] <= w[0]) {
            return Err(TestlensError::config_field(
                "Coverage poll delays must be strictly increasing",
                "coverage.poll_delays_ms",
            ));
        }

        Ok(())
    }
}

/// Project root discovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// File names marking a project root during upward search
    pub config_files: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            config_files: [
                "vitest.config.ts",
                "vitest.config.mts",
                "vitest.config.js",
                "vitest.config.mjs",
                "vite.config.ts",
                "vite.config.mts",
                "vite.config.js",
                "vite.config.mjs",
            ]
            .iter()
            .map(|name| (*name).to_string())
            .collect(),
        }
    }
}

impl ProjectConfig {
    /// Validate the project configuration
    pub fn validate(&self) -> Result<()> {
        if self.config_files.iter().any(|name| name.trim().is_empty()) {
            return Err(TestlensError::config_field(
                "Project config file names must not be empty",
                "project.config_files",
            ));
        }
        Ok(())
    }
}
