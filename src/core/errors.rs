//! Error types for the testlens-rs library.
//!
//! Every failure the orchestrator can report maps onto one variant here. Launch,
//! configuration, timeout and unexpected-exit errors propagate to the caller;
//! parse and artifact errors are normally recovered into structured
//! placeholders before they reach it.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Main result type for testlens operations.
pub type Result<T> = std::result::Result<T, TestlensError>;

/// Maximum number of characters of offending output kept in a parse error.
pub const PARSE_SAMPLE_CHARS: usize = 200;

/// Error type for all testlens operations.
#[derive(Error, Debug)]
pub enum TestlensError {
    /// I/O related errors (file operations, pipes, etc.)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors, including a missing or invalid project directory
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// The runner subprocess could not be started
    #[error("Failed to launch test runner `{program}`: {source}")]
    Launch {
        /// Program that failed to start
        program: String,
        /// Underlying spawn failure
        #[source]
        source: io::Error,
    },

    /// No completion signal arrived before the deadline
    #[error(
        "Test run timed out after {timeout_ms}ms (directory: {}, working directory: {}, stdout: {stdout_bytes} bytes, stderr: {stderr_bytes} bytes)",
        .directory.display(),
        .working_dir.display()
    )]
    Timeout {
        /// Project directory the run targeted
        directory: PathBuf,
        /// Process working directory at launch
        working_dir: PathBuf,
        /// Configured bound
        timeout_ms: u64,
        /// Bytes buffered from stdout before the kill
        stdout_bytes: usize,
        /// Bytes buffered from stderr before the kill
        stderr_bytes: usize,
    },

    /// The runner exited with a code outside the accepted set
    #[error("Test runner exited with {}: {stderr}", .code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")))]
    RunnerExit {
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
        /// Captured error stream
        stderr: String,
    },

    /// Buffered output was not a valid structured report
    #[error("Parse error: {message} (sample: {sample})")]
    Parse {
        /// Error description
        message: String,
        /// Truncated prefix of the offending text
        sample: String,
    },

    /// Coverage artifacts missing or malformed
    #[error("Coverage artifact error at {}: {message}", .path.display())]
    Artifact {
        /// Artifact path
        path: PathBuf,
        /// Error description
        message: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Data type being serialized
        data_type: Option<String>,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
        /// Additional context
        context: Option<String>,
    },
}

impl TestlensError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new launch error
    pub fn launch(program: impl Into<String>, source: io::Error) -> Self {
        Self::Launch {
            program: program.into(),
            source,
        }
    }

    /// Create a new parse error, keeping only a bounded sample of `text`
    pub fn parse(message: impl Into<String>, text: &str) -> Self {
        Self::Parse {
            message: message.into(),
            sample: truncate_sample(text, PARSE_SAMPLE_CHARS),
        }
    }

    /// Create a new artifact error
    pub fn artifact(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Artifact {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new validation error with field context
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        match &mut self {
            Self::Internal { context: ctx, .. } => {
                *ctx = Some(context.into());
            }
            Self::Io { message, .. } | Self::Artifact { message, .. } => {
                *message = format!("{}: {}", context.into(), message);
            }
            _ => {}
        }
        self
    }

    /// Whether the error is recovered locally into a placeholder rather than
    /// propagated to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Artifact { .. })
    }
}

/// Truncate `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_sample(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

impl From<io::Error> for TestlensError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for TestlensError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            data_type: Some("JSON".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for TestlensError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            data_type: Some("YAML".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

/// Result extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error result
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<TestlensError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }

    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| e.into().with_context(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = TestlensError::config("Project directory missing");
        assert!(matches!(err, TestlensError::Config { .. }));

        let err = TestlensError::artifact("coverage/coverage-final.json", "not found");
        assert!(matches!(err, TestlensError::Artifact { .. }));
    }

    #[test]
    fn test_parse_error_truncates_sample() {
        let huge = "x".repeat(10_000);
        let err = TestlensError::parse("not JSON", &huge);

        if let TestlensError::Parse { sample, .. } = &err {
            assert_eq!(sample.chars().count(), PARSE_SAMPLE_CHARS + 3);
            assert!(sample.ends_with("..."));
        } else {
            panic!("Expected Parse error");
        }
        assert!(err.to_string().len() < 400);
    }

    #[test]
    fn test_truncate_sample_respects_char_boundaries() {
        assert_eq!(truncate_sample("héllo wörld", 4), "héll...");
        assert_eq!(truncate_sample("short", 10), "short");
        assert_eq!(truncate_sample("", 10), "");
    }

    #[test]
    fn test_timeout_display_includes_diagnostics() {
        let err = TestlensError::Timeout {
            directory: PathBuf::from("/work/app"),
            working_dir: PathBuf::from("/work/app"),
            timeout_ms: 500,
            stdout_bytes: 42,
            stderr_bytes: 7,
        };
        let display = err.to_string();
        assert!(display.contains("500ms"));
        assert!(display.contains("/work/app"));
        assert!(display.contains("42 bytes"));
        assert!(display.contains("7 bytes"));
    }

    #[test]
    fn test_runner_exit_display() {
        let err = TestlensError::RunnerExit {
            code: Some(2),
            stderr: "config not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Test runner exited with code 2: config not found"
        );

        let err = TestlensError::RunnerExit {
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("a signal"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(TestlensError::parse("bad", "{").is_recoverable());
        assert!(TestlensError::artifact("x", "y").is_recoverable());
        assert!(!TestlensError::config("x").is_recoverable());
        assert!(!TestlensError::launch(
            "npx",
            io::Error::new(io::ErrorKind::NotFound, "missing")
        )
        .is_recoverable());
    }

    #[test]
    fn test_with_context_internal_error() {
        let err = TestlensError::internal("Channel closed").with_context("During artifact polling");

        if let TestlensError::Internal { context, .. } = err {
            assert_eq!(context, Some("During artifact polling".to_string()));
        } else {
            panic!("Expected Internal error");
        }
    }

    #[test]
    fn test_result_ext_with_context() {
        let result: std::result::Result<i32, std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        ));

        let err = result
            .with_context(|| "Reading coverage summary".to_string())
            .unwrap_err();
        if let TestlensError::Io { message, .. } = err {
            assert!(message.starts_with("Reading coverage summary"));
        } else {
            panic!("Expected Io error");
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<i32>("invalid json").unwrap_err();
        let err: TestlensError = json_err.into();

        if let TestlensError::Serialization { data_type, .. } = err {
            assert_eq!(data_type, Some("JSON".to_string()));
        } else {
            panic!("Expected Serialization error");
        }
    }

    #[test]
    fn test_from_yaml_error() {
        let yaml_err = serde_yaml::from_str::<i32>("invalid: yaml: content").unwrap_err();
        let err: TestlensError = yaml_err.into();

        if let TestlensError::Serialization { data_type, .. } = err {
            assert_eq!(data_type, Some("YAML".to_string()));
        } else {
            panic!("Expected Serialization error");
        }
    }
}
