//! Lifecycle management for the language-server subprocess.

use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::lsp::error::LspError;

/// A running language-server child process.
///
/// Owns the child handle and its stderr logging task; the stdin/stdout pipes
/// are handed to the caller at spawn time and drive the framed transport.
pub struct LanguageServerProcess {
    child: Child,
    stderr_task: JoinHandle<()>,
}

impl LanguageServerProcess {
    /// Spawn `program` with `args`, all three stdio streams piped.
    ///
    /// Returns the process handle together with the stdin and stdout pipes.
    /// Any pipe or spawn failure aborts construction; a partially spawned
    /// child is killed before the error is returned.
    pub fn spawn(
        program: &str,
        args: &[&str],
    ) -> Result<(Self, ChildStdin, ChildStdout), LspError> {
        info!("starting language server: {program} {args:?}");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    LspError::ServerNotFound(program.to_string())
                } else {
                    LspError::Spawn(e)
                }
            })?;

        let (stdin, stdout, stderr) = match Self::take_pipes(&mut child) {
            Ok(pipes) => pipes,
            Err(e) => {
                let _ = child.start_kill();
                return Err(e);
            }
        };

        info!("language server started with PID: {:?}", child.id());

        let stderr_task = tokio::spawn(log_stderr(stderr));

        Ok((Self { child, stderr_task }, stdin, stdout))
    }

    fn take_pipes(child: &mut Child) -> Result<(ChildStdin, ChildStdout, ChildStderr), LspError> {
        let stdin = child.stdin.take().ok_or(LspError::Pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(LspError::Pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(LspError::Pipe("stderr"))?;
        Ok((stdin, stdout, stderr))
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Forcibly terminate the child and stop stderr logging.
    pub async fn kill(&mut self) {
        info!("killing language server with PID: {:?}", self.child.id());
        self.stderr_task.abort();
        if let Err(e) = self.child.kill().await {
            warn!("failed to kill language server: {e}");
        }
        let _ = self.child.wait().await;
    }
}

/// Drain stderr for the lifetime of the child, relaying lines into tracing.
/// Lines that look like failures are upgraded so they surface at the
/// default log level.
async fn log_stderr(stderr: ChildStderr) {
    let mut reader = BufReader::new(stderr);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed.contains("error") || trimmed.contains("Error") {
                    warn!("terraform-ls stderr: {trimmed}");
                } else {
                    debug!("terraform-ls stderr: {trimmed}");
                }
            }
            Err(e) => {
                warn!("error reading language server stderr: {e}");
                break;
            }
        }
    }

    debug!("language server stderr stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_and_kill_lifecycle() {
        let (mut process, _stdin, _stdout) =
            LanguageServerProcess::spawn("cat", &[]).expect("failed to spawn cat");

        assert!(process.id().is_some());

        process.kill().await;
    }

    #[tokio::test]
    async fn missing_binary_is_reported_distinctly() {
        let err = LanguageServerProcess::spawn("definitely-not-a-real-binary-xyz", &[])
            .map(|_| ())
            .unwrap_err();

        match err {
            LspError::ServerNotFound(name) => {
                assert_eq!(name, "definitely-not-a-real-binary-xyz");
            }
            other => panic!("expected ServerNotFound, got: {other:?}"),
        }
    }
}
