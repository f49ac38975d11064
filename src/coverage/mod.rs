//! Coverage reduction: statement maps in, per-file uncovered line ranges out.
//!
//! The pipeline is extractor → range grouper → reducer, fed by the two
//! on-disk documents located and polled in [`artifacts`].

pub mod artifacts;
pub mod extractor;
pub mod ranges;
pub mod reducer;
pub mod types;

pub use artifacts::{collect_coverage, CoverageArtifacts};
pub use extractor::{extract_uncovered_lines, parse_detail_document};
pub use ranges::{group_and_render, group_line_ranges, LineRange};
pub use reducer::{parse_summary_document, reduce_entry, CoverageReducer};
pub use types::{
    CoverageReport, CoverageSection, CoverageStatus, FileCoverageEntry, FileSummary,
    MetricSummary, UncoveredRendering,
};
