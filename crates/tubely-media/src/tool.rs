//! External media tools (ffprobe, ffmpeg) behind a capability trait.

use async_trait::async_trait;
use std::ffi::OsString;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Stderr is truncated to this many bytes before it is kept for logging.
const MAX_STDERR_BYTES: usize = 4096;

/// Captured output of a successful tool run
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {code:?}: {stderr}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{program} timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

/// An external executable invoked with arguments.
///
/// A non-zero exit is always an error. Implementations must stop the process
/// when the returned future is dropped.
#[async_trait]
pub trait MediaTool: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, args: &[OsString]) -> Result<ToolOutput, ToolError>;
}

/// Runs a real executable as a child process with a timeout.
#[derive(Debug, Clone)]
pub struct ProcessTool {
    program: String,
    timeout: Duration,
}

impl ProcessTool {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

fn truncate_stderr(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.len() <= MAX_STDERR_BYTES {
        return trimmed.to_string();
    }
    let mut end = MAX_STDERR_BYTES;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &trimmed[..end])
}

#[async_trait]
impl MediaTool for ProcessTool {
    fn name(&self) -> &str {
        &self.program
    }

    #[tracing::instrument(skip(self, args), fields(program = %self.program))]
    async fn run(&self, args: &[OsString]) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ToolError::Io {
                program: self.program.clone(),
                source,
            })?,
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "Tool invocation timed out");
                return Err(ToolError::TimedOut {
                    program: self.program.clone(),
                    timeout: self.timeout,
                });
            }
        };

        let stderr = truncate_stderr(&output.stderr);

        if !output.status.success() {
            return Err(ToolError::NonZeroExit {
                program: self.program.clone(),
                code: output.status.code(),
                stderr,
            });
        }

        tracing::debug!(
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            stdout_bytes = output.stdout.len(),
            "Tool invocation finished"
        );

        Ok(ToolOutput {
            stdout: output.stdout,
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_stderr_keeps_short_output() {
        assert_eq!(truncate_stderr(b"  moov atom not found\n"), "moov atom not found");
    }

    #[test]
    fn test_truncate_stderr_bounds_long_output() {
        let long = "é".repeat(MAX_STDERR_BYTES);
        let truncated = truncate_stderr(long.as_bytes());
        assert!(truncated.len() <= MAX_STDERR_BYTES + "…".len());
        assert!(truncated.ends_with('…'));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let tool = ProcessTool::new("tubely-no-such-binary", Duration::from_secs(5));
        let err = tool.run(&[]).await.unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_error() {
        let tool = ProcessTool::new("sh", Duration::from_secs(5));
        let args: Vec<OsString> = vec!["-c".into(), "echo broken >&2; exit 3".into()];
        match tool.run(&args).await {
            Err(ToolError::NonZeroExit { code, stderr, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("expected NonZeroExit, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        let tool = ProcessTool::new("sleep", Duration::from_millis(100));
        let args: Vec<OsString> = vec!["5".into()];
        let start = Instant::now();
        let err = tool.run(&args).await.unwrap_err();
        assert!(matches!(err, ToolError::TimedOut { .. }));
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
