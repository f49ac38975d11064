//! Completion detection over the runner's buffered standard output.
//!
//! The runner gives no terminal marker for its JSON report and may keep writing
//! after it, so completeness is inferred from the text itself.

use crate::core::config::CompletionMode;

/// Decides, after each chunk, whether the buffered output holds a complete report.
///
/// Implementations are monotonic: once `observe` returns `true` it keeps
/// returning `true` for any longer buffer.
pub trait CompletionDetector: Send {
    /// Inspect the whole buffer accumulated so far
    fn observe(&mut self, buffer: &[u8]) -> bool;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Build the detector for a configured completion mode
pub fn detector_for(mode: CompletionMode) -> Box<dyn CompletionDetector> {
    match mode {
        CompletionMode::Heuristic => Box::new(JsonReportHeuristic::new()),
        CompletionMode::ProcessExit => Box::new(ExitOnly),
    }
}

const TEST_RESULTS_KEY: &[u8] = b"\"testResults\"";
const TOTAL_TESTS_KEY: &[u8] = b"\"numTotalTests\"";
const PASSED_TESTS_KEY: &[u8] = b"\"numPassedTests\"";

/// Fires when the buffer contains the per-file results marker, both aggregate
/// counters, and ends with the closing brace of a top-level object.
///
/// The three conditions must hold at the same time; the marker conditions are
/// remembered once seen since the buffer only grows. Braces are tracked
/// incrementally outside string literals so an inner `}` that happens to end a
/// read never counts as the end of the report.
#[derive(Debug, Default, Clone)]
pub struct JsonReportHeuristic {
    results_marker: bool,
    total_marker: bool,
    passed_marker: bool,
    structure: BraceTracker,
    complete: bool,
}

impl JsonReportHeuristic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the detector has fired
    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

impl CompletionDetector for JsonReportHeuristic {
    fn observe(&mut self, buffer: &[u8]) -> bool {
        if self.complete {
            return true;
        }

        self.results_marker = self.results_marker || contains_results_marker(buffer);
        self.total_marker = self.total_marker || contains(buffer, TOTAL_TESTS_KEY);
        self.passed_marker = self.passed_marker || contains(buffer, PASSED_TESTS_KEY);
        self.structure.advance(buffer);

        self.complete = self.results_marker
            && self.total_marker
            && self.passed_marker
            && self.structure.ends_on_top_level_close(buffer);
        self.complete
    }

    fn name(&self) -> &'static str {
        "json-report-heuristic"
    }
}

/// Object nesting over a growing buffer.
///
/// Text at depth zero is treated as log noise: quotes there do not open
/// strings and unmatched `}` are ignored.
#[derive(Debug, Default, Clone)]
struct BraceTracker {
    scanned: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
    last_top_level_close: Option<usize>,
}

impl BraceTracker {
    /// Scan the bytes appended since the previous call
    fn advance(&mut self, buffer: &[u8]) {
        let start = self.scanned.min(buffer.len());
        for (offset, &byte) in buffer[start..].iter().enumerate() {
            let pos = start + offset;
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match byte {
                b'{' => self.depth += 1,
                b'}' if self.depth > 0 => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        self.last_top_level_close = Some(pos);
                    }
                }
                b'"' if self.depth > 0 => self.in_string = true,
                _ => {}
            }
        }
        self.scanned = buffer.len();
    }

    /// The last non-whitespace byte closed an object back to depth zero
    fn ends_on_top_level_close(&self, buffer: &[u8]) -> bool {
        self.depth == 0
            && last_non_whitespace(buffer).is_some_and(|pos| Some(pos) == self.last_top_level_close)
    }
}

/// Never fires; the assembler resolves on end-of-stream and process exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExitOnly;

impl CompletionDetector for ExitOnly {
    fn observe(&mut self, _buffer: &[u8]) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "process-exit"
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find_from(haystack, needle, 0).is_some()
}

fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// `"testResults"`, optional whitespace, `:`, optional whitespace, `[`
fn contains_results_marker(buffer: &[u8]) -> bool {
    let mut from = 0;
    while let Some(pos) = find_from(buffer, TEST_RESULTS_KEY, from) {
        let after_key = pos + TEST_RESULTS_KEY.len();
        let mut rest = buffer[after_key..].iter().skip_while(|b| b.is_ascii_whitespace());
        if rest.next() == Some(&b':') {
            let mut rest = rest.skip_while(|b| b.is_ascii_whitespace());
            if rest.next() == Some(&b'[') {
                return true;
            }
        }
        from = after_key;
    }
    false
}

fn last_non_whitespace(buffer: &[u8]) -> Option<usize> {
    buffer.iter().rposition(|b| !b.is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(detector: &mut dyn CompletionDetector, chunks: &[&str]) -> Vec<bool> {
        let mut buffer = Vec::new();
        chunks
            .iter()
            .map(|chunk| {
                buffer.extend_from_slice(chunk.as_bytes());
                detector.observe(&buffer)
            })
            .collect()
    }

    #[test]
    fn test_fires_only_after_third_chunk() {
        let mut detector = JsonReportHeuristic::new();
        let fired = feed(
            &mut detector,
            &[
                r#"{"numTotalTests":3,"#,
                r#""numPassedTests":2,"testResults":["#,
                r#"...],"numFailedTests":1}"#,
            ],
        );
        assert_eq!(fired, vec![false, false, true]);
        assert!(detector.is_complete());
    }

    #[test]
    fn test_closing_brace_alone_is_not_enough() {
        assert!(!JsonReportHeuristic::new().observe(br#"{"numTotalTests":1,"numPassedTests":1}"#));
        assert!(!JsonReportHeuristic::new().observe(br#"{"testResults":[],"numTotalTests":1}"#));
    }

    #[test]
    fn test_marker_tolerates_whitespace_and_trailing_newlines() {
        let mut detector = JsonReportHeuristic::new();
        let text = "{\n  \"numTotalTests\": 1,\n  \"numPassedTests\": 1,\n  \"testResults\" :\n  [ ]\n}\n\n";
        assert!(detector.observe(text.as_bytes()));
    }

    #[test]
    fn test_results_key_without_array_does_not_count() {
        let mut detector = JsonReportHeuristic::new();
        let text = r#"{"testResults":"pending","numTotalTests":1,"numPassedTests":1}"#;
        assert!(!detector.observe(text.as_bytes()));
    }

    #[test]
    fn test_latches_once_satisfied() {
        let mut detector = JsonReportHeuristic::new();
        let fired = feed(
            &mut detector,
            &[
                r#"{"numTotalTests":0,"numPassedTests":0,"testResults":[]}"#,
                "\nstray log line after the report",
            ],
        );
        assert_eq!(fired, vec![true, true]);
    }

    #[test]
    fn test_inner_brace_at_chunk_end_does_not_fire() {
        let mut detector = JsonReportHeuristic::new();
        let fired = feed(
            &mut detector,
            &[
                r#"{"numTotalTests":2,"numPassedTests":2,"testResults":[{"name":"a","assertionResults":[{"title":"x"}"#,
                r#"]}"#,
                r#",{"name":"b","assertionResults":[]}"#,
                "],\"success\":true}\n",
            ],
        );
        assert_eq!(fired, vec![false, false, false, true]);
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let mut detector = JsonReportHeuristic::new();
        let fired = feed(
            &mut detector,
            &[
                r#"{"numTotalTests":1,"numPassedTests":0,"testResults":[{"failureMessages":["expected \"}\" got {"#,
                r#"}"]}"#,
                r#"]}"#,
            ],
        );
        assert_eq!(fired, vec![false, false, true]);
    }

    #[test]
    fn test_log_noise_before_report_does_not_confuse_depth() {
        let mut detector = JsonReportHeuristic::new();
        let fired = feed(
            &mut detector,
            &[
                "stray } and \" in a log line\n{\"level\":\"info\"}\n",
                r#"{"numTotalTests":0,"numPassedTests":0,"testResults":[]"#,
                "}",
            ],
        );
        assert_eq!(fired, vec![false, false, true]);
    }

    #[test]
    fn test_exit_only_never_fires() {
        let mut detector = detector_for(CompletionMode::ProcessExit);
        assert_eq!(detector.name(), "process-exit");
        assert!(!detector.observe(br#"{"numTotalTests":0,"numPassedTests":0,"testResults":[]}"#));
    }
}
