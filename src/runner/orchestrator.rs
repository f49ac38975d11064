//! End-to-end test runs: launch, assemble, normalize, and collect coverage.

use std::path::PathBuf;
use std::time::{Instant, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::core::config::TestlensConfig;
use crate::core::errors::{Result, TestlensError};
use crate::core::project::validate_project_root;
use crate::core::workdir::WorkingDirGuard;
use crate::coverage::artifacts::{collect_coverage, CoverageArtifacts};
use crate::coverage::types::CoverageSection;
use crate::runner::assembler::{OutputAssembler, RunContext};
use crate::runner::normalizer::{normalize, RunSummary};
use crate::runner::report::parse_run_output;

/// What to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Project directory the runner is launched in
    pub project_root: PathBuf,
    /// Optional test file or directory filter passed to the runner
    #[serde(default)]
    pub target: Option<String>,
    /// Whether to enable coverage instrumentation and reduce its artifacts
    #[serde(default)]
    pub coverage: bool,
}

impl RunRequest {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            target: None,
            coverage: false,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_coverage(mut self, coverage: bool) -> Self {
        self.coverage = coverage;
        self
    }
}

/// Normalized test results, or why the runner's output could not be read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestResults {
    Parsed(RunSummary),
    Unparsable { message: String, sample: String },
}

impl TestResults {
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            Self::Parsed(summary) => Some(summary),
            Self::Unparsable { .. } => None,
        }
    }
}

/// Outcome of one orchestrated run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub project_root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub results: TestResults,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageSection>,
}

/// Runs the configured test runner against a project.
///
/// Holds only configuration; every call to [`run`](Self::run) is independent.
#[derive(Debug, Clone)]
pub struct TestOrchestrator {
    config: TestlensConfig,
}

impl TestOrchestrator {
    pub fn new(config: TestlensConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TestlensConfig {
        &self.config
    }

    /// Runner invocation for `request`: program, reporter args, target, coverage args
    pub fn command(&self, request: &RunRequest) -> Command {
        let runner = &self.config.runner;
        let mut command = Command::new(&runner.program);
        command.args(&runner.args);
        if let Some(target) = &request.target {
            command.arg(target);
        }
        if request.coverage {
            command.args(&runner.coverage_args);
        }
        command
    }

    /// Run the tests described by `request`.
    ///
    /// Configuration, launch, timeout and unexpected-exit failures are returned
    /// as errors. Unreadable runner output and missing coverage are reported
    /// inside the [`RunReport`].
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport> {
        let started_at = Utc::now();
        let started = Instant::now();
        let not_before = SystemTime::now();

        let project_root = validate_project_root(&request.project_root)?;
        let mut command = self.command(request);
        command.current_dir(&project_root);
        let assembler = OutputAssembler::new(&self.config.runner);

        let (child, working_dir) = {
            let guard = WorkingDirGuard::enter(&project_root)?;
            let child = assembler.launch(&mut command)?;
            (child, guard.current().to_path_buf())
        };

        info!(
            project_root = %project_root.display(),
            target = request.target.as_deref().unwrap_or("<all>"),
            coverage = request.coverage,
            "test run started"
        );

        let context = RunContext {
            directory: project_root.clone(),
            working_dir,
        };
        let artifacts = CoverageArtifacts::locate(&project_root, &self.config.coverage);
        let schedule = self.config.coverage.poll_schedule();
        let (finished_tx, finished_rx) = oneshot::channel::<bool>();

        let assemble = async {
            let output = assembler.assemble(child, &context).await;
            let _ = finished_tx.send(output.is_ok());
            output
        };
        let poll = async {
            if !request.coverage {
                return None;
            }
            match finished_rx.await {
                Ok(true) => {
                    Some(collect_coverage(&artifacts, &project_root, &schedule, not_before).await)
                }
                _ => None,
            }
        };

        let (output, coverage) = tokio::join!(assemble, poll);
        let output = output?;

        let results = match parse_run_output(&output.stdout) {
            Ok(report) => TestResults::Parsed(normalize(&report.task_files(&project_root))),
            Err(err) => {
                warn!(error = %err, "runner output could not be parsed");
                unparsable(err)
            }
        };

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if let Some(summary) = results.summary() {
            info!(
                tests = summary.num_total_tests,
                passed = summary.num_passed_tests,
                failed = summary.num_failed_tests,
                duration_ms,
                "test run finished"
            );
        }

        Ok(RunReport {
            project_root,
            started_at,
            duration_ms,
            results,
            coverage,
        })
    }
}

fn unparsable(err: TestlensError) -> TestResults {
    match err {
        TestlensError::Parse { message, sample } => TestResults::Unparsable { message, sample },
        other => TestResults::Unparsable {
            message: other.to_string(),
            sample: String::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_appends_target_then_coverage_flags() {
        let orchestrator = TestOrchestrator::new(TestlensConfig::default()).unwrap();
        let request = RunRequest::new("/p")
            .with_target("src/math.test.ts")
            .with_coverage(true);

        let command = orchestrator.command(&request);
        let std = command.as_std();
        assert_eq!(std.get_program(), "npx");
        let args: Vec<_> = std.get_args().map(|arg| arg.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "vitest",
                "run",
                "--reporter=json",
                "src/math.test.ts",
                "--coverage",
                "--coverage.reporter=json",
                "--coverage.reporter=json-summary",
            ]
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = TestlensConfig::default();
        config.runner.timeout_ms = 0;
        assert!(matches!(
            TestOrchestrator::new(config),
            Err(TestlensError::Config { .. })
        ));
    }

    #[test]
    fn test_unparsable_keeps_message_and_sample() {
        let results = unparsable(TestlensError::parse("bad", "{oops"));
        assert_eq!(
            results,
            TestResults::Unparsable {
                message: "bad".to_string(),
                sample: "{oops".to_string(),
            }
        );
        assert!(results.summary().is_none());
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = RunReport {
            project_root: PathBuf::from("/p"),
            started_at: Utc::now(),
            duration_ms: 12,
            results: TestResults::Parsed(RunSummary::default()),
            coverage: Some(CoverageSection::unavailable("none")),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["projectRoot"], "/p");
        assert_eq!(value["durationMs"], 12);
        assert_eq!(value["results"]["numTotalTests"], 0);
        assert_eq!(value["coverage"]["message"], "none");
        assert!(value.get("startedAt").is_some());
    }
}
