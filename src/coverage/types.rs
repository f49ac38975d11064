use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::coverage::ranges::LineRange;
use crate::core::errors::TestlensError;

/// A source position inside a statement map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: usize,
    #[serde(default)]
    pub column: Option<usize>,
}

/// Location of a single instrumented statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLocation {
    pub start: SourcePosition,
    #[serde(default)]
    pub end: Option<SourcePosition>,
}

/// Statement identifier to location, as written by the instrumentation step
pub type StatementMap = BTreeMap<String, StatementLocation>;

/// Statement identifier to execution count
pub type StatementCounts = BTreeMap<String, u64>;

/// Uncovered line numbers per file path, ascending and de-duplicated
pub type UncoveredLines = BTreeMap<String, Vec<usize>>;

/// The statement-level part of one file's entry in the detail document.
///
/// Function and branch maps are present in the document but not needed here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileCoverageData {
    #[serde(rename = "statementMap", default)]
    pub statement_map: Option<StatementMap>,
    #[serde(rename = "s", default)]
    pub statement_counts: Option<StatementCounts>,
}

/// Percentage / total / covered for one coverage metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub total: u64,
    pub covered: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(deserialize_with = "deserialize_pct")]
    pub pct: f64,
}

impl MetricSummary {
    pub fn uncovered(&self) -> u64 {
        self.total.saturating_sub(self.covered)
    }
}

/// Istanbul writes `"Unknown"` instead of a number when a metric has no
/// instrumented units; nothing is uncovered in that case.
fn deserialize_pct<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Pct {
        Number(f64),
        Text(String),
    }

    Ok(match Pct::deserialize(deserializer)? {
        Pct::Number(value) => value,
        Pct::Text(_) => 100.0,
    })
}

/// Summary metrics for a single file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub lines: MetricSummary,
    pub functions: MetricSummary,
    pub statements: MetricSummary,
    pub branches: MetricSummary,
}

/// Per-file summary table keyed by the path the runner reported
pub type SummaryTable = BTreeMap<String, FileSummary>;

/// Coverage classification of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CoverageStatus {
    /// Every instrumented line executed
    Perfect,
    /// Some lines never executed
    Partial { uncovered: usize },
    /// Line coverage is zero
    None,
}

impl fmt::Display for CoverageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Perfect => write!(f, "perfect coverage"),
            Self::Partial { uncovered } => write!(f, "{uncovered} uncovered lines"),
            Self::None => write!(f, "no coverage"),
        }
    }
}

/// Rendered form of a file's uncovered lines: `"all"`, `"none"` or
/// comma-separated ranges such as `"3-5, 9"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum UncoveredRendering {
    All,
    None,
    Ranges(Vec<LineRange>),
}

impl UncoveredRendering {
    /// Line numbers named by the rendering (`All` names none explicitly)
    pub fn lines(&self) -> Vec<usize> {
        match self {
            Self::All | Self::None => Vec::new(),
            Self::Ranges(ranges) => ranges.iter().flat_map(LineRange::lines).collect(),
        }
    }
}

impl fmt::Display for UncoveredRendering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::None => write!(f, "none"),
            Self::Ranges(ranges) => {
                let rendered: Vec<String> = ranges.iter().map(ToString::to_string).collect();
                write!(f, "{}", rendered.join(", "))
            }
        }
    }
}

impl From<UncoveredRendering> for String {
    fn from(value: UncoveredRendering) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for UncoveredRendering {
    type Error = TestlensError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim() {
            "all" => Ok(Self::All),
            "none" => Ok(Self::None),
            text => text
                .split(',')
                .map(|part| part.trim().parse::<LineRange>())
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Ranges),
        }
    }
}

/// Reduced coverage for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCoverageEntry {
    pub summary: FileSummary,
    pub status: CoverageStatus,
    pub uncovered_lines: UncoveredRendering,
    pub total_uncovered_lines: usize,
}

/// Reduced coverage keyed by project-relative path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageReport {
    pub files: BTreeMap<String, FileCoverageEntry>,
}

impl CoverageReport {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&FileCoverageEntry> {
        self.files.get(path)
    }

    /// Keep only files under the relative directory `prefix`.
    ///
    /// The reducer never filters; callers that only care about the directory
    /// they asked to test apply this afterwards.
    pub fn retain_under(&mut self, prefix: &str) {
        let prefix = prefix.trim_start_matches("./").trim_end_matches('/');
        if prefix.is_empty() || prefix == "." {
            return;
        }
        self.files.retain(|path, _| {
            path == prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        });
    }
}

/// Coverage part of a run report: the reduced report or an explanation of why
/// it is missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoverageSection {
    Report(CoverageReport),
    Unavailable { message: String },
}

impl CoverageSection {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn report(&self) -> Option<&CoverageReport> {
        match self {
            Self::Report(report) => Some(report),
            Self::Unavailable { .. } => None,
        }
    }
}
