use std::path::Path;
use std::time::Duration;

use tokio::process::Command;

pub const SHELL_ESCAPE_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a local shell escape. A non-zero exit or a timeout is a
/// result, not an error: the caller renders it, nothing propagates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutcome {
    pub exit_code: Option<i32>,
    pub output: String,
    pub timed_out: bool,
}

pub async fn run_shell_escape(command: &str, working_dir: &Path) -> ShellOutcome {
    run_with_timeout(command, working_dir, SHELL_ESCAPE_TIMEOUT).await
}

async fn run_with_timeout(command: &str, working_dir: &Path, timeout: Duration) -> ShellOutcome {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(working_dir)
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(timeout, output).await {
        Err(_) => ShellOutcome {
            exit_code: None,
            output: String::new(),
            timed_out: true,
        },
        Ok(Err(error)) => ShellOutcome {
            exit_code: None,
            output: format!("failed to start shell: {error}"),
            timed_out: false,
        },
        Ok(Ok(output)) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                if !combined.is_empty() && !combined.ends_with('\n') {
                    combined.push('\n');
                }
                combined.push_str(stderr.trim_end());
            }
            ShellOutcome {
                exit_code: output.status.code(),
                output: combined,
                timed_out: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tmp() -> PathBuf {
        std::env::temp_dir()
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let outcome = run_with_timeout("echo hello", &tmp(), Duration::from_secs(5)).await;
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.output, "hello\n");
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_a_result() {
        let outcome = run_with_timeout("exit 3", &tmp(), Duration::from_secs(5)).await;
        assert_eq!(outcome.exit_code, Some(3));
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn test_stderr_is_appended_to_output() {
        let outcome =
            run_with_timeout("echo out; echo err 1>&2", &tmp(), Duration::from_secs(5)).await;
        assert_eq!(outcome.output, "out\nerr");
    }

    #[tokio::test]
    async fn test_timeout_kills_the_command() {
        let outcome = run_with_timeout("sleep 5", &tmp(), Duration::from_millis(50)).await;
        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, None);
    }

    #[tokio::test]
    async fn test_runs_in_the_given_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run_with_timeout("pwd", dir.path(), Duration::from_secs(5)).await;
        let printed = outcome.output.trim();
        assert!(
            printed.ends_with(
                dir.path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
            ),
            "unexpected pwd output: {printed}"
        );
    }
}
