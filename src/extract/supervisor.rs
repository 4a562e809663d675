//! Parent side of the extraction boundary: spawn, feed, wait, tear down.
use super::{ExtractionResult, ENV_MEMORY_LIMIT_MB, ENV_MIME_HINT};
use crate::config::Config;
use crate::util::truncate_bytes;
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Default upper bound on worker stdout; extracted text beyond this is an error.
const MAX_WORKER_OUTPUT_BYTES: usize = 64 * 1024 * 1024;
/// How much worker stderr is quoted in failure messages.
const MAX_STDERR_SNIPPET_BYTES: usize = 2048;

/// Program and arguments used to launch an extraction worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// `<current exe> extract-worker`.
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe().context("locate current executable")?;
        Ok(Self {
            program,
            args: vec!["extract-worker".to_string()],
        })
    }

    /// Parse a shell-words command line.
    pub fn parse(command: &str) -> Result<Self> {
        let mut args = shell_words::split(command)
            .with_context(|| format!("parse worker command: {command}"))?;
        if args.is_empty() {
            return Err(anyhow!("worker command is empty"));
        }
        let program = PathBuf::from(args.remove(0));
        Ok(Self { program, args })
    }
}

/// Runs each extraction in a fresh worker process with a hard timeout.
#[derive(Debug, Clone)]
pub struct IsolatedExtractor {
    command: WorkerCommand,
    timeout: Duration,
    max_bytes: usize,
    max_output_bytes: usize,
    memory_limit_mb: Option<u64>,
}

impl IsolatedExtractor {
    pub fn new(command: WorkerCommand, timeout: Duration, max_bytes: usize) -> Self {
        Self {
            command,
            timeout,
            max_bytes,
            max_output_bytes: MAX_WORKER_OUTPUT_BYTES,
            memory_limit_mb: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let command = match config.worker_command.as_deref() {
            Some(command) => WorkerCommand::parse(command)?,
            None => WorkerCommand::current_exe()?,
        };
        Ok(Self::new(
            command,
            Duration::from_secs(config.extract_timeout_secs),
            config.extract_max_bytes,
        )
        .with_memory_limit(config.worker_memory_limit_mb))
    }

    pub fn with_memory_limit(mut self, limit_mb: Option<u64>) -> Self {
        self.memory_limit_mb = limit_mb;
        self
    }

    pub fn with_max_output_bytes(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }

    /// Extract text from `payload`. Never fails: every problem is reported as
    /// `success = false` with a non-empty message. No retry is attempted.
    pub async fn extract(&self, payload: &[u8], mime_hint: &str) -> ExtractionResult {
        if payload.is_empty() {
            return ExtractionResult::failed("document is empty");
        }
        if payload.len() > self.max_bytes {
            return ExtractionResult::failed(format!(
                "document is {} bytes, above the {} byte limit",
                payload.len(),
                self.max_bytes
            ));
        }

        let start = Instant::now();
        let result = match self.run_worker(payload, mime_hint).await {
            Ok(result) => result.normalized(),
            Err(err) => ExtractionResult::failed(format!("{err:#}")),
        };
        let elapsed_ms = start.elapsed().as_millis();
        if result.success {
            tracing::info!(
                elapsed_ms,
                payload_bytes = payload.len(),
                mime_hint,
                "extraction complete"
            );
        } else {
            tracing::warn!(
                elapsed_ms,
                payload_bytes = payload.len(),
                mime_hint,
                error = result.error.as_deref().unwrap_or_default(),
                "extraction failed"
            );
        }
        result
    }

    async fn run_worker(&self, payload: &[u8], mime_hint: &str) -> Result<ExtractionResult> {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .env(ENV_MIME_HINT, mime_hint)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(limit) = self.memory_limit_mb {
            cmd.env(ENV_MEMORY_LIMIT_MB, limit.to_string());
        }

        let mut child = cmd.spawn().with_context(|| {
            format!(
                "spawn extraction worker {}",
                self.command.program.display()
            )
        })?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let exchange = async {
            let feed = async {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(payload).await?;
                    stdin.shutdown().await?;
                }
                Ok::<_, std::io::Error>(())
            };
            tokio::join!(
                feed,
                read_pipe(stdout, self.max_output_bytes),
                read_pipe(stderr, MAX_WORKER_OUTPUT_BYTES),
                child.wait()
            )
        };
        let outcome = tokio::time::timeout(self.timeout, exchange).await;

        let (fed, stdout, stderr, status) = match outcome {
            Ok(parts) => parts,
            Err(_) => {
                // Single teardown point for a stuck worker: kill() also reaps it.
                if let Err(err) = child.kill().await {
                    tracing::warn!(error = %err, "failed to kill timed-out extraction worker");
                }
                return Ok(ExtractionResult::failed(format!(
                    "extraction worker timed out after {}s",
                    self.timeout.as_secs_f64()
                )));
            }
        };

        let status = status.context("wait for extraction worker")?;
        let stdout = stdout.context("read extraction worker stdout")?;
        // Checked before the exit status: an overflowing worker usually dies of SIGPIPE.
        if stdout.len() > self.max_output_bytes {
            return Ok(ExtractionResult::failed(format!(
                "extraction worker output exceeds {} bytes",
                self.max_output_bytes
            )));
        }
        let stderr = stderr.unwrap_or_default();
        if !status.success() {
            return Ok(ExtractionResult::failed(abnormal_exit_message(
                &status, &stderr,
            )));
        }
        if let Err(err) = fed {
            tracing::debug!(error = %err, "extraction worker closed stdin early");
        }

        parse_worker_response(&stdout)
    }
}

/// Read at most `cap + 1` bytes so the caller can tell an overflow from a
/// pipe that ended exactly at the cap.
async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>, cap: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(pipe) = pipe {
        let limit = u64::try_from(cap).unwrap_or(u64::MAX).saturating_add(1);
        pipe.take(limit).read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

fn abnormal_exit_message(status: &ExitStatus, stderr: &[u8]) -> String {
    let stderr = truncate_bytes(stderr, MAX_STDERR_SNIPPET_BYTES);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("extraction worker exited abnormally ({status})")
    } else {
        format!("extraction worker exited abnormally ({status}): {stderr}")
    }
}

fn parse_worker_response(stdout: &[u8]) -> Result<ExtractionResult> {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| anyhow!("extraction worker produced no response"))?;
    serde_json::from_str(line.trim()).context("extraction worker produced an invalid response")
}

#[cfg(all(test, unix))]
#[path = "supervisor_tests.rs"]
mod tests;
