//! Coverage artifact location, polling and loading.
//!
//! The runner writes its coverage documents asynchronously relative to its own
//! exit, so presence is polled on a short bounded schedule. Loading never fails:
//! any problem becomes a [`CoverageSection::Unavailable`] placeholder.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::core::config::CoverageConfig;
use crate::core::errors::{Result, TestlensError};
use crate::coverage::extractor::{extract_uncovered_lines, parse_detail_document};
use crate::coverage::reducer::{parse_summary_document, CoverageReducer};
use crate::coverage::types::CoverageSection;

/// Allowance for filesystems with coarse modification timestamps.
const MTIME_SLACK: Duration = Duration::from_secs(1);

/// Paths of the two coverage documents for a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageArtifacts {
    /// Per-file summary document
    pub summary: PathBuf,
    /// Per-file statement-level document
    pub detail: PathBuf,
}

impl CoverageArtifacts {
    /// Resolve artifact paths under `project_root`
    pub fn locate(project_root: &Path, config: &CoverageConfig) -> Self {
        let directory = project_root.join(&config.directory);
        Self {
            summary: directory.join(&config.summary_file),
            detail: directory.join(&config.detail_file),
        }
    }

    /// Whether both documents exist and were written no earlier than `not_before`
    pub fn present_since(&self, not_before: SystemTime) -> bool {
        is_fresh(&self.summary, not_before) && is_fresh(&self.detail, not_before)
    }

    /// Check for the artifacts, then retry once after each delay in `schedule`.
    pub async fn poll(&self, schedule: &[Duration], not_before: SystemTime) -> bool {
        if self.present_since(not_before) {
            return true;
        }

        for (attempt, delay) in schedule.iter().enumerate() {
            tokio::time::sleep(*delay).await;
            if self.present_since(not_before) {
                debug!(attempt = attempt + 1, "coverage artifacts appeared");
                return true;
            }
        }

        info!(
            summary = %self.summary.display(),
            detail = %self.detail.display(),
            attempts = schedule.len() + 1,
            "coverage artifacts not found"
        );
        false
    }

    /// Read, parse and reduce both documents
    pub async fn load(&self, project_root: &Path) -> Result<CoverageSection> {
        let summary_text = read_artifact(&self.summary).await?;
        let detail_text = read_artifact(&self.detail).await?;

        let summary = parse_summary_document(&summary_text)
            .map_err(|err| TestlensError::artifact(&self.summary, err.to_string()))?;
        let detail = parse_detail_document(&detail_text)
            .map_err(|err| TestlensError::artifact(&self.detail, err.to_string()))?;

        let uncovered = extract_uncovered_lines(&detail);
        let report = CoverageReducer::new(project_root).reduce(&summary, &uncovered);

        info!(
            files = report.len(),
            files_with_gaps = uncovered.len(),
            "coverage report reduced"
        );

        Ok(CoverageSection::Report(report))
    }

    /// Like [`load`](Self::load), but degrades every failure to a placeholder
    pub async fn load_section(&self, project_root: &Path) -> CoverageSection {
        match self.load(project_root).await {
            Ok(section) => section,
            Err(err) => {
                warn!(error = %err, "coverage report unavailable");
                CoverageSection::unavailable(err.to_string())
            }
        }
    }
}

/// Poll for the artifacts and load them, or explain why there is no report.
pub async fn collect_coverage(
    artifacts: &CoverageArtifacts,
    project_root: &Path,
    schedule: &[Duration],
    not_before: SystemTime,
) -> CoverageSection {
    if !artifacts.poll(schedule, not_before).await {
        return CoverageSection::unavailable(format!(
            "No coverage data found at {} and {}. Ensure the coverage provider is installed and configured to emit json and json-summary reports.",
            artifacts.summary.display(),
            artifacts.detail.display()
        ));
    }

    artifacts.load_section(project_root).await
}

async fn read_artifact(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|err| TestlensError::artifact(path, format!("failed to read: {err}")))
}

fn is_fresh(path: &Path, not_before: SystemTime) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    match metadata.modified() {
        Ok(modified) => {
            let threshold = not_before.checked_sub(MTIME_SLACK).unwrap_or(not_before);
            modified >= threshold
        }
        Err(_) => true,
    }
}
