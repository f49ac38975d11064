//! Reduction of summary metrics and uncovered lines into a per-file report.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::errors::{Result, TestlensError};
use crate::coverage::ranges::group_line_ranges;
use crate::coverage::types::{
    CoverageReport, CoverageStatus, FileCoverageEntry, FileSummary, SummaryTable,
    UncoveredLines, UncoveredRendering,
};

/// Key under which the summary document stores project-wide totals.
const SUMMARY_TOTAL_KEY: &str = "total";

/// Parse the summary document into a per-file table.
///
/// The project-wide `total` row is dropped; rows that do not match the summary
/// shape are skipped.
pub fn parse_summary_document(text: &str) -> Result<SummaryTable> {
    let root: Value = serde_json::from_str(text)?;
    let Value::Object(map) = root else {
        return Err(TestlensError::validation(
            "Coverage summary document must be an object",
        ));
    };
    Ok(summary_table_from_map(map))
}

fn summary_table_from_map(map: Map<String, Value>) -> SummaryTable {
    map.into_iter()
        .filter(|(path, _)| path != SUMMARY_TOTAL_KEY)
        .filter_map(|(path, value)| match serde_json::from_value::<FileSummary>(value) {
            Ok(summary) => Some((path, summary)),
            Err(err) => {
                debug!(path = %path, error = %err, "skipping malformed summary row");
                None
            }
        })
        .collect()
}

/// Builds [`FileCoverageEntry`] values relative to a project root.
#[derive(Debug, Clone)]
pub struct CoverageReducer {
    project_root: PathBuf,
}

impl CoverageReducer {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// One entry per file in the summary table, keyed by project-relative path.
    ///
    /// Files outside the project root keep their reported path.
    pub fn reduce(&self, summary: &SummaryTable, uncovered: &UncoveredLines) -> CoverageReport {
        let files = summary
            .iter()
            .map(|(path, file_summary)| {
                let lines = uncovered.get(path).map(Vec::as_slice).unwrap_or(&[]);
                (
                    relative_path(path, &self.project_root),
                    reduce_entry(file_summary, lines),
                )
            })
            .collect();

        CoverageReport { files }
    }
}

/// Classify one file and render its uncovered lines.
///
/// Zero line coverage wins over everything else; otherwise an empty uncovered
/// set means perfect coverage.
#[allow(clippy::float_cmp)]
pub fn reduce_entry(summary: &FileSummary, uncovered: &[usize]) -> FileCoverageEntry {
    let ranges = group_line_ranges(uncovered.iter().copied());
    let unique_lines: usize = ranges.iter().map(|range| range.line_count()).sum();

    let (status, uncovered_lines, total_uncovered_lines) = if summary.lines.pct == 0.0 {
        let total = usize::try_from(summary.lines.uncovered()).unwrap_or(usize::MAX);
        (CoverageStatus::None, UncoveredRendering::All, total)
    } else if unique_lines == 0 {
        (CoverageStatus::Perfect, UncoveredRendering::None, 0)
    } else {
        (
            CoverageStatus::Partial {
                uncovered: unique_lines,
            },
            UncoveredRendering::Ranges(ranges),
            unique_lines,
        )
    };

    FileCoverageEntry {
        summary: *summary,
        status,
        uncovered_lines,
        total_uncovered_lines,
    }
}

/// Re-derive an entry from its own summary and rendering.
pub fn rereduce_entry(entry: &FileCoverageEntry) -> FileCoverageEntry {
    reduce_entry(&entry.summary, &entry.uncovered_lines.lines())
}

/// Strip `root` from `path`, normalising separators to `/`.
pub fn relative_path(path: &str, root: &Path) -> String {
    let relative = Path::new(path)
        .strip_prefix(root)
        .map(|rest| rest.to_string_lossy().into_owned())
        .unwrap_or_else(|_| path.to_string());
    relative.replace('\\', "/")
}
