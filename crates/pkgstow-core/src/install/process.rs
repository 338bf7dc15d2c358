//! External command execution with streamed output.

use super::cancel::Cancellation;
use super::error::InstallError;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

/// How long to keep forwarding output once the child itself has exited.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Runs external commands, forwarding their output as it arrives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    stdout_to_stderr: bool,
}

impl ProcessRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Send child stdout to our stderr, keeping our stdout free for machine output.
    #[must_use]
    pub fn with_stdout_to_stderr(mut self, yes: bool) -> Self {
        self.stdout_to_stderr = yes;
        self
    }

    /// Run `program` with `args`, optionally inside `cwd`.
    ///
    /// Succeeds only when the process exits with status zero. On cancellation the
    /// child is killed and `PKG_CANCELLED` is returned.
    ///
    /// # Errors
    /// Returns `PKG_EXTERNAL_COMMAND_FAILED` with the exit code on a non-zero exit
    /// (`-1` when the child was killed by a signal), or when the command cannot be
    /// spawned.
    pub async fn run<I, S>(
        &self,
        program: &str,
        args: I,
        cwd: Option<&Path>,
        cancel: &Cancellation,
    ) -> Result<(), InstallError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        let shown = std::iter::once(program.to_string())
            .chain(args.iter().map(|a| format!("{:?}", a.to_string_lossy())))
            .collect::<Vec<_>>()
            .join(" ");

        if cancel.is_cancelled() {
            return Err(InstallError::cancelled());
        }

        debug!(command = %shown, cwd = ?cwd, "Running command");

        let mut command = Command::new(program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| InstallError::command_spawn_failed(program, e))?;

        let stdout_forward = child.stdout.take().map(|out| {
            if self.stdout_to_stderr {
                forward(out, tokio::io::stderr())
            } else {
                forward(out, tokio::io::stdout())
            }
        });
        let stderr_forward = child.stderr.take().map(|err| forward(err, tokio::io::stderr()));

        let mut cancel = cancel.clone();
        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| InstallError::command_spawn_failed(program, e))?,
            () = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(InstallError::cancelled());
            }
        };

        // Drain whatever the child wrote before exiting. Background processes it left
        // behind may hold the pipes open, so the drain is bounded.
        let mut forwards: Vec<_> = [stdout_forward, stderr_forward]
            .into_iter()
            .flatten()
            .collect();
        let drain = async {
            for task in &mut forwards {
                let _ = task.await;
            }
        };
        let cancelled = tokio::select! {
            drained = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, drain) => {
                if drained.is_err() {
                    debug!(command = %shown, "Output still open after exit, detaching");
                }
                false
            }
            () = cancel.cancelled() => true,
        };
        for task in &forwards {
            task.abort();
        }
        if cancelled {
            return Err(InstallError::cancelled());
        }

        if status.success() {
            Ok(())
        } else {
            Err(InstallError::command_failed(
                program,
                status.code().unwrap_or(-1),
            ))
        }
    }

    /// Run a shell command string (`sh -c` on Unix, `cmd.exe /C` on Windows).
    ///
    /// # Errors
    /// See [`ProcessRunner::run`].
    pub async fn run_shell(
        &self,
        command: &str,
        cwd: Option<&Path>,
        cancel: &Cancellation,
    ) -> Result<(), InstallError> {
        let (shell, shell_arg) = if cfg!(windows) {
            ("cmd.exe", "/C")
        } else {
            ("sh", "-c")
        };

        self.run(shell, [shell_arg, command], cwd, cancel)
            .await
            .map_err(|e| {
                if let Some(code) = e.exit_code() {
                    InstallError::command_failed(command, code)
                } else {
                    e
                }
            })
    }
}

fn forward<R, W>(mut reader: R, mut writer: W) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let _ = tokio::io::copy(&mut reader, &mut writer).await;
    })
}
