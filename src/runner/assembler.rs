//! Runner subprocess launch and stdout assembly.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::core::config::RunnerConfig;
use crate::core::errors::{Result, ResultExt, TestlensError};
use crate::runner::completion::{detector_for, CompletionDetector};

/// Bound on collecting stderr once stdout is done; a killed runner's
/// descendants may keep the pipe open.
const STDERR_CAPTURE_TIMEOUT: Duration = Duration::from_secs(2);

const READ_CHUNK_BYTES: usize = 8192;

/// How the runner process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited on its own with an accepted code
    Completed { code: i32 },
    /// Stopped by the assembler after the report was detected
    Terminated,
}

/// Buffered runner output
#[derive(Debug, Clone)]
pub struct AssembledOutput {
    pub stdout: String,
    pub stderr: String,
    pub termination: Termination,
}

/// Diagnostic context attached to timeout errors
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Project directory the run targets
    pub directory: PathBuf,
    /// Process working directory at launch
    pub working_dir: PathBuf,
}

enum StreamOutcome {
    Detected,
    EndOfStream,
    DeadlineReached,
}

/// Spawns the runner and accumulates its stdout until a report is complete.
pub struct OutputAssembler {
    config: RunnerConfig,
    detector: Box<dyn CompletionDetector>,
}

impl OutputAssembler {
    pub fn new(config: &RunnerConfig) -> Self {
        Self::with_detector(config, detector_for(config.completion))
    }

    pub fn with_detector(config: &RunnerConfig, detector: Box<dyn CompletionDetector>) -> Self {
        Self {
            config: config.clone(),
            detector,
        }
    }

    /// Spawn `command` with piped output.
    ///
    /// The child inherits the process working directory at the time of the call.
    pub fn launch(&self, command: &mut Command) -> Result<Child> {
        let program = command
            .as_std()
            .get_program()
            .to_string_lossy()
            .into_owned();

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %program, "spawning test runner");
        command
            .spawn()
            .map_err(|err| TestlensError::launch(program, err))
    }

    /// Read the child's output until the detector fires, the stream ends, or
    /// the deadline passes.
    pub async fn assemble(mut self, mut child: Child, context: &RunContext) -> Result<AssembledOutput> {
        let deadline = Instant::now() + self.config.timeout();

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| TestlensError::internal("runner stdout was not piped"))?;
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(read_bounded(stderr, self.config.max_output_bytes)));

        let mut buffer: Vec<u8> = Vec::with_capacity(READ_CHUNK_BYTES);
        let mut chunk = [0u8; READ_CHUNK_BYTES];
        let mut truncated = false;

        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);

        let outcome = loop {
            tokio::select! {
                read = stdout.read(&mut chunk) => {
                    let n = read.context("Failed to read runner stdout")?;
                    if n == 0 {
                        break StreamOutcome::EndOfStream;
                    }

                    let remaining = self.config.max_output_bytes.saturating_sub(buffer.len());
                    if remaining < n && !truncated {
                        warn!(max_bytes = self.config.max_output_bytes, "runner stdout exceeded limit, truncating");
                        truncated = true;
                    }
                    buffer.extend_from_slice(&chunk[..n.min(remaining)]);

                    if self.detector.observe(&buffer) {
                        break StreamOutcome::Detected;
                    }
                }
                () = &mut sleep => break StreamOutcome::DeadlineReached,
            }
        };

        match outcome {
            StreamOutcome::Detected => {
                debug!(
                    detector = self.detector.name(),
                    stdout_bytes = buffer.len(),
                    "complete report detected, stopping runner"
                );
                if let Err(err) = child.start_kill() {
                    debug!(error = %err, "runner already exited");
                }
                tokio::time::sleep(self.config.grace_period()).await;
                let _ = timeout(self.config.grace_period(), child.wait()).await;

                Ok(AssembledOutput {
                    stdout: String::from_utf8_lossy(&buffer).into_owned(),
                    stderr: collect_stderr(stderr_task).await,
                    termination: Termination::Terminated,
                })
            }
            StreamOutcome::EndOfStream => {
                let status = tokio::select! {
                    status = child.wait() => {
                        status.context("Failed to wait for runner")?
                    }
                    () = &mut sleep => {
                        let stderr = collect_stderr_after_kill(&mut child, stderr_task).await;
                        return Err(timeout_error(&self, context, buffer.len(), stderr.len()));
                    }
                };
                let stderr = collect_stderr(stderr_task).await;

                match status.code() {
                    Some(code) if self.config.accepts_exit_code(code) => {
                        info!(code, stdout_bytes = buffer.len(), "test runner exited");
                        Ok(AssembledOutput {
                            stdout: String::from_utf8_lossy(&buffer).into_owned(),
                            stderr,
                            termination: Termination::Completed { code },
                        })
                    }
                    code => {
                        warn!(code = ?code, "test runner exited unexpectedly");
                        Err(TestlensError::RunnerExit { code, stderr })
                    }
                }
            }
            StreamOutcome::DeadlineReached => {
                let stderr = collect_stderr_after_kill(&mut child, stderr_task).await;
                Err(timeout_error(&self, context, buffer.len(), stderr.len()))
            }
        }
    }
}

fn timeout_error(
    assembler: &OutputAssembler,
    context: &RunContext,
    stdout_bytes: usize,
    stderr_bytes: usize,
) -> TestlensError {
    let timeout_ms = assembler.config.timeout_ms;
    warn!(
        timeout_ms,
        directory = %context.directory.display(),
        stdout_bytes,
        stderr_bytes,
        "test run timed out, runner killed"
    );
    TestlensError::Timeout {
        directory: context.directory.clone(),
        working_dir: context.working_dir.clone(),
        timeout_ms,
        stdout_bytes,
        stderr_bytes,
    }
}

async fn collect_stderr_after_kill(
    child: &mut Child,
    task: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
) -> String {
    if let Err(err) = child.kill().await {
        warn!(error = %err, "failed to kill timed-out runner");
    }
    collect_stderr(task).await
}

async fn collect_stderr(task: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> String {
    let Some(mut task) = task else {
        return String::new();
    };

    match timeout(STDERR_CAPTURE_TIMEOUT, &mut task).await {
        Ok(Ok(Ok(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Ok(Err(err))) => {
            warn!(error = %err, "stderr capture failed");
            String::new()
        }
        Ok(Err(err)) => {
            warn!(error = %err, "stderr task panicked");
            String::new()
        }
        Err(_) => {
            debug!("stderr capture timed out");
            task.abort();
            String::new()
        }
    }
}

/// Read from an async reader, keeping at most `max_bytes` and draining the rest.
async fn read_bounded<R: AsyncRead + Unpin>(mut reader: R, max_bytes: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(READ_CHUNK_BYTES);
    let mut chunk = [0u8; READ_CHUNK_BYTES];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }

        let remaining = max_bytes.saturating_sub(buf.len());
        if remaining == 0 {
            warn!(max_bytes, "runner stderr exceeded limit, truncating");
            while reader.read(&mut chunk).await? > 0 {}
            break;
        }

        buf.extend_from_slice(&chunk[..n.min(remaining)]);
    }

    Ok(buf)
}
