//! # Testlens-RS: Test Runner Orchestration and Coverage Reduction
//!
//! Launches a JavaScript test runner with its JSON reporter enabled, decides
//! when the streamed report is complete, and turns the runner's output into
//! structures an automation client can consume:
//!
//! - **Run Summaries**: suite trees flattened into leaf test outcomes with
//!   counts derived from the leaves
//! - **Coverage Reports**: statement-level coverage reduced to per-file status
//!   and uncovered line ranges
//! - **Result Store**: a caller-owned record of the latest report per project
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      TestOrchestrator                        │
//! ├──────────────────────────────┬───────────────────────────────┤
//! │  Runner                      │  Coverage                     │
//! │ • OutputAssembler            │ • CoverageArtifacts (polling) │
//! │ • CompletionDetector         │ • Uncovered-line extractor    │
//! │ • JSON report / normalizer   │ • Range grouper / reducer     │
//! ├──────────────────────────────┴───────────────────────────────┤
//! │  Core: config • errors • logging • project root • workdir    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use testlens_rs::{ResultStore, RunRequest, TestOrchestrator, TestlensConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     testlens_rs::core::logging::init_tracing(false);
//!
//!     let orchestrator = TestOrchestrator::new(TestlensConfig::default())?;
//!     let store = ResultStore::new();
//!     let request = RunRequest::new("./web").with_coverage(true);
//!
//!     let report = orchestrator.run_and_record(&store, &request).await?;
//!     println!("{}", serde_json::to_string_pretty(&*report)?);
//!     Ok(())
//! }
//! ```

#![warn(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Shared infrastructure
pub mod core {
    //! Configuration, errors, logging and process-level helpers.

    pub mod config;
    pub mod errors;
    pub mod logging;
    pub mod project;
    pub mod workdir;
}

// Coverage artifact reduction
pub mod coverage;

// Runner subprocess orchestration
pub mod runner;

// Re-export primary types for convenience
pub use crate::core::config::{CompletionMode, CoverageConfig, ProjectConfig, RunnerConfig, TestlensConfig};
pub use crate::core::errors::{Result, ResultExt, TestlensError};
pub use crate::core::project::ProjectLocator;
pub use coverage::{CoverageReport, CoverageSection, CoverageStatus, FileCoverageEntry};
pub use runner::{ResultStore, RunReport, RunRequest, RunSummary, TestOrchestrator, TestResults};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
