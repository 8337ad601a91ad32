// Subprocess plumbing shared by the backends

use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::errors::DownloadError;

/// Locate an external tool binary.
///
/// Common install locations are checked before falling back to PATH, since
/// GUI-launched processes often run with a stripped environment.
pub fn locate_tool(binary: &str) -> Option<PathBuf> {
    let common_paths = [
        format!("/opt/homebrew/bin/{}", binary),
        format!("/usr/local/bin/{}", binary),
        format!("/usr/bin/{}", binary),
    ];
    for path in common_paths {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }
    which::which(binary).ok()
}

/// Run a command to completion, capturing stdout and stderr, killing the
/// child if it exceeds `timeout_secs`.
pub async fn run_output_with_timeout(
    program: &std::path::Path,
    args: &[String],
    timeout_secs: u64,
) -> Result<std::process::Output, DownloadError> {
    debug!(program = %program.display(), ?args, "spawning");
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_error)?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| DownloadError::Execution("could not capture stdout".to_string()))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| DownloadError::Execution("could not capture stderr".to_string()))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status) => {
            let status = status?;
            let stdout = join_read(stdout_task).await?;
            let stderr = join_read(stderr_task).await?;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(DownloadError::Execution(format!(
                "{} timed out after {}s",
                program.display(),
                timeout_secs
            )))
        }
    }
}

/// Run a command whose stdout is consumed line by line as it appears,
/// with stderr collected for post-mortem classification. Returns the exit
/// status and the full stderr text.
pub async fn run_streaming_lines(
    program: &std::path::Path,
    args: &[String],
    mut on_line: impl FnMut(&str),
) -> Result<(std::process::ExitStatus, String), DownloadError> {
    debug!(program = %program.display(), ?args, "spawning (streaming)");
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_error)?;

    let stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| DownloadError::Execution("could not capture stdout".to_string()))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| DownloadError::Execution("could not capture stderr".to_string()))?;

    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    let mut lines = BufReader::new(stdout_pipe).lines();
    while let Some(line) = lines.next_line().await? {
        on_line(&line);
    }

    let status = child.wait().await?;
    let stderr = String::from_utf8_lossy(&join_read(stderr_task).await?).into_owned();
    if !status.success() {
        warn!(program = %program.display(), code = ?status.code(), "command failed");
    }
    Ok((status, stderr))
}

fn spawn_error(e: std::io::Error) -> DownloadError {
    if e.kind() == std::io::ErrorKind::NotFound {
        DownloadError::ToolNotFound(e.to_string())
    } else {
        DownloadError::Execution(format!("failed to spawn: {}", e))
    }
}

async fn join_read(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, DownloadError> {
    match task.await {
        Ok(read) => Ok(read?),
        Err(e) => Err(DownloadError::Execution(format!("reader task failed: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let sh = locate_tool("sh").unwrap();
        let out = run_output_with_timeout(
            &sh,
            &["-c".to_string(), "echo out; echo err >&2".to_string()],
            5,
        )
        .await
        .unwrap();
        assert!(out.status.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&out.stderr).trim(), "err");
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let sh = locate_tool("sh").unwrap();
        let err = run_output_with_timeout(&sh, &["-c".to_string(), "sleep 30".to_string()], 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Execution(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn missing_binary_is_tool_not_found() {
        let err = run_output_with_timeout(
            std::path::Path::new("/definitely/not/here"),
            &[],
            5,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn streaming_sees_every_line_in_order() {
        let sh = locate_tool("sh").unwrap();
        let mut seen = Vec::new();
        let (status, stderr) = run_streaming_lines(
            &sh,
            &["-c".to_string(), "echo one; echo two; echo oops >&2".to_string()],
            |line| seen.push(line.to_string()),
        )
        .await
        .unwrap();
        assert!(status.success());
        assert_eq!(seen, vec!["one", "two"]);
        assert_eq!(stderr.trim(), "oops");
    }
}
