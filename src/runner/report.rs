//! The runner's JSON reporter document.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::errors::{Result, TestlensError};

/// Top-level report written by the JSON reporter.
///
/// Aggregate counters are kept for diagnostics only; run summaries are always
/// recomputed from the assertion results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReport {
    #[serde(default)]
    pub num_total_test_suites: u64,
    #[serde(default)]
    pub num_passed_test_suites: u64,
    #[serde(default)]
    pub num_failed_test_suites: u64,
    #[serde(default)]
    pub num_total_tests: u64,
    #[serde(default)]
    pub num_passed_tests: u64,
    #[serde(default)]
    pub num_failed_tests: u64,
    #[serde(default)]
    pub success: bool,
    pub test_results: Vec<FileResult>,
}

/// Results for one test file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub assertion_results: Vec<AssertionResult>,
}

/// One executed (or skipped) test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    #[serde(default)]
    pub ancestor_titles: Vec<String>,
    pub title: String,
    pub status: AssertionStatus,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub failure_messages: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssertionStatus {
    Passed,
    Failed,
    Skipped,
    Pending,
    Todo,
    Disabled,
    #[serde(other)]
    Unknown,
}

/// Extract the JSON report from buffered runner output.
///
/// Stray log lines before the report and trailing output after it are
/// tolerated: the first `{` that starts a valid report wins.
pub fn parse_run_output(text: &str) -> Result<JsonReport> {
    let mut first_error: Option<String> = None;

    for (offset, _) in text.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&text[offset..]).into_iter::<JsonReport>();
        match stream.next() {
            Some(Ok(report)) => {
                if offset > 0 {
                    debug!(skipped_bytes = offset, "ignored output before JSON report");
                }
                return Ok(report);
            }
            Some(Err(err)) => {
                if first_error.is_none() {
                    first_error = Some(err.to_string());
                }
            }
            None => break,
        }
    }

    let message = match first_error {
        Some(err) => format!("Runner output is not a valid JSON report: {err}"),
        None if text.trim().is_empty() => "Runner produced no output".to_string(),
        None => "Runner output contains no JSON object".to_string(),
    };
    Err(TestlensError::parse(message, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "numTotalTestSuites": 2,
        "numPassedTestSuites": 1,
        "numFailedTestSuites": 1,
        "numTotalTests": 2,
        "numPassedTests": 1,
        "numFailedTests": 1,
        "numPendingTests": 0,
        "success": false,
        "startTime": 1700000000000,
        "testResults": [{
            "name": "/p/src/math.test.ts",
            "status": "failed",
            "message": "",
            "startTime": 1700000000000,
            "endTime": 1700000000010,
            "assertionResults": [
                {"ancestorTitles": ["math"], "fullName": "math adds", "title": "adds",
                 "status": "passed", "duration": 1.5, "failureMessages": []},
                {"ancestorTitles": ["math"], "fullName": "math divides", "title": "divides",
                 "status": "failed", "duration": null, "failureMessages": ["expected 2"],
                 "location": {"line": 9, "column": 3}}
            ]
        }]
    }"#;

    #[test]
    fn test_parses_reporter_document() {
        let report = parse_run_output(REPORT).unwrap();
        assert_eq!(report.num_total_tests, 2);
        assert!(!report.success);

        let file = &report.test_results[0];
        assert_eq!(file.assertion_results.len(), 2);
        assert_eq!(file.assertion_results[0].status, AssertionStatus::Passed);
        assert_eq!(file.assertion_results[1].duration, None);
        assert_eq!(file.assertion_results[1].failure_messages, vec!["expected 2"]);
    }

    #[test]
    fn test_skips_leading_logs_and_trailing_output() {
        let text = format!(
            "{{\"level\":\"info\",\"msg\":\"starting\"}}\n RUN  v1.0.0 /p\n{REPORT}\nclose timed out after 10000ms\n"
        );
        let report = parse_run_output(&text).unwrap();
        assert_eq!(report.test_results.len(), 1);
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let text = r#"{"testResults":[{"name":"a","assertionResults":[{"title":"t","status":"flaky"}]}]}"#;
        let report = parse_run_output(text).unwrap();
        assert_eq!(
            report.test_results[0].assertion_results[0].status,
            AssertionStatus::Unknown
        );
    }

    #[test]
    fn test_garbage_yields_truncated_parse_error() {
        let text = format!("{{\"testResults\": [{}", "x".repeat(1000));
        match parse_run_output(&text) {
            Err(TestlensError::Parse { message, sample }) => {
                assert!(message.contains("not a valid JSON report"));
                assert!(sample.ends_with("..."));
                assert!(sample.chars().count() <= 203);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_output_is_a_parse_error() {
        match parse_run_output("  \n") {
            Err(TestlensError::Parse { message, .. }) => assert_eq!(message, "Runner produced no output"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
