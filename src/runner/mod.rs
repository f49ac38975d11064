//! Runner subprocess orchestration.
//!
//! [`assembler`] owns the child process and decides when its output is a
//! complete report, [`report`] and [`normalizer`] turn that output into a
//! [`RunSummary`](normalizer::RunSummary), and [`orchestrator`] ties both to
//! coverage collection.

pub mod assembler;
pub mod completion;
pub mod normalizer;
pub mod orchestrator;
pub mod report;
pub mod store;

pub use assembler::{AssembledOutput, OutputAssembler, RunContext, Termination};
pub use completion::{CompletionDetector, ExitOnly, JsonReportHeuristic};
pub use normalizer::{normalize, FileOutcome, RunSummary, SuiteNode, TaskFile, TestOutcome};
pub use orchestrator::{RunReport, RunRequest, TestOrchestrator, TestResults};
pub use report::{parse_run_output, JsonReport};
pub use store::ResultStore;
