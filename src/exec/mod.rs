// External process execution (aws CLI)
use crate::error::ProcessError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(180);

/// Seam for shelling out to external tooling. The renewal protocol and the
/// monitor's refresh path go through this so tests can script outcomes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args` to completion, returning stdout on success.
    async fn run(&self, program: &str, args: &[String]) -> Result<String, ProcessError>;
}

/// Runs commands through tokio with a hard timeout. "No response" within the
/// bound is reported the same way as a failed invocation.
pub struct AwsCliRunner {
    timeout: Duration,
}

impl AwsCliRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for AwsCliRunner {
    fn default() -> Self {
        Self::new(DEFAULT_PROCESS_TIMEOUT)
    }
}

#[async_trait]
impl ProcessRunner for AwsCliRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, ProcessError> {
        let command_line = format!("{} {}", program, args.join(" "));
        tracing::debug!(command = %command_line, "running external command");

        let output = tokio::time::timeout(self.timeout, Command::new(program).args(args).output())
            .await
            .map_err(|_| ProcessError::Timeout {
                command: command_line.clone(),
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|err| ProcessError::NotFound {
                command: command_line.clone(),
                message: err.to_string(),
            })?;

        if !output.status.success() {
            return Err(ProcessError::NonZeroExit {
                command: command_line,
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Convenience for building owned argument vectors at call sites.
pub fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let runner = AwsCliRunner::default();
        let output = runner.run("echo", &args(&["hello"])).await.unwrap();
        assert_eq!(output.trim(), "hello");
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let runner = AwsCliRunner::default();
        let err = runner
            .run("sh", &args(&["-c", "echo oops >&2; exit 3"]))
            .await
            .unwrap_err();
        match err {
            ProcessError::NonZeroExit { status, stderr, .. } => {
                assert_eq!(status, 3);
                assert_eq!(stderr, "oops");
            }
            other => panic!("expected NonZeroExit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_found() {
        let runner = AwsCliRunner::default();
        let err = runner
            .run("definitely-not-a-real-binary", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let runner = AwsCliRunner::new(Duration::from_millis(50));
        let err = runner.run("sleep", &args(&["5"])).await.unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
    }
}
