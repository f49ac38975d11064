//! Uncovered-line extraction from statement-level coverage.
//!
//! The detail document maps file paths to Istanbul file coverage objects. Only
//! `statementMap` and `s` are consulted: a statement is uncovered when its count
//! is exactly zero, or when the file has no counts object at all.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::debug;

use crate::core::errors::{Result, TestlensError};
use crate::coverage::types::{FileCoverageData, UncoveredLines};

/// Parse the detail document, which must be a JSON object at the top level.
pub fn parse_detail_document(text: &str) -> Result<Map<String, Value>> {
    let root: Value = serde_json::from_str(text)?;
    match root {
        Value::Object(map) => Ok(map),
        other => Err(TestlensError::validation(format!(
            "Coverage detail document must be an object, found {}",
            json_kind(&other)
        ))),
    }
}

/// Compute uncovered lines for every analysable file in the detail document.
///
/// Malformed entries (null, non-objects, missing or invalid statement maps) are
/// skipped without error. Fully covered files are omitted.
pub fn extract_uncovered_lines(detail: &Map<String, Value>) -> UncoveredLines {
    let mut result = UncoveredLines::new();

    for (path, entry) in detail {
        if !entry.is_object() {
            debug!(path = %path, kind = json_kind(entry), "skipping non-object coverage entry");
            continue;
        }

        let data: FileCoverageData = match serde_json::from_value(entry.clone()) {
            Ok(data) => data,
            Err(err) => {
                debug!(path = %path, error = %err, "skipping malformed coverage entry");
                continue;
            }
        };

        if let Some(lines) = uncovered_lines_for_file(&data) {
            if !lines.is_empty() {
                result.insert(path.clone(), lines);
            }
        }
    }

    result
}

/// Uncovered lines for one file, ascending and unique.
///
/// Returns `None` when the file has no statement map and cannot be analysed.
pub fn uncovered_lines_for_file(data: &FileCoverageData) -> Option<Vec<usize>> {
    let statement_map = data.statement_map.as_ref()?;

    let lines: BTreeSet<usize> = statement_map
        .iter()
        .filter(|(id, _)| match &data.statement_counts {
            None => true,
            Some(counts) => counts.get(*id) == Some(&0),
        })
        .map(|(_, location)| location.start.line)
        .filter(|line| *line > 0)
        .collect();

    Some(lines.into_iter().collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
