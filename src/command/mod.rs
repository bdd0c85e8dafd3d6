use crate::config::ShellKind;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Token that marks the rest of a reply as a command line.
pub const COMMAND_MARKER: &str = "///CMD///";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on any configured command timeout.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// How long the stream drains may run past the deadline before being abandoned.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

static LANG_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[LANG:[a-zA-Z0-9-]+\]").expect("valid regex"));

/// Raw model or rule output that may carry an embedded command.
#[derive(Debug, Clone, Copy)]
pub struct CommandEnvelope<'a> {
    raw: &'a str,
}

impl<'a> CommandEnvelope<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self { raw }
    }

    pub fn has_marker(&self) -> bool {
        self.raw.contains(COMMAND_MARKER)
    }

    /// The literal command line: markers and language tags removed, then trimmed.
    /// `None` when there is no marker.
    pub fn command_line(&self) -> Option<String> {
        if !self.has_marker() {
            return None;
        }
        let without_marker = self.raw.replace(COMMAND_MARKER, "");
        let without_tags = LANG_TAG.replace_all(&without_marker, "");
        Some(without_tags.trim().to_string())
    }
}

/// Captured output of one command run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Anything on stderr counts as a failure, even if stdout has content.
    pub fn reply_text(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();

        if !stderr.is_empty() {
            return format!("Command failed: {}", stderr);
        }
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        if self.timed_out {
            "Command timed out.".to_string()
        } else {
            "Executed.".to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// No marker; the text goes back to the user untouched
    Passthrough(String),
    Executed(ExecutionResult),
    /// The process could not be started or read
    Failed,
}

impl CommandOutcome {
    pub fn into_reply(self) -> String {
        match self {
            CommandOutcome::Passthrough(text) => text,
            CommandOutcome::Executed(result) => result.reply_text(),
            CommandOutcome::Failed => "Failed to execute.".to_string(),
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run one command line through the host interpreter.
    async fn run(&self, command_line: &str) -> io::Result<ExecutionResult>;

    /// Fire-and-forget run for launchers such as URL openers. Output is not captured.
    async fn launch(&self, command_line: &str) -> io::Result<()> {
        let result = self.run(command_line).await?;
        if !result.stderr.trim().is_empty() {
            tracing::warn!(stderr = %result.stderr.trim(), "launcher reported an error");
        }
        Ok(())
    }

    /// Shell flavour, used to build helper commands such as URL openers.
    fn shell(&self) -> ShellKind;
}

/// Run the command embedded in `raw`, or hand `raw` back if it has none.
pub async fn extract_and_run(runner: &dyn CommandRunner, raw: &str) -> CommandOutcome {
    let Some(command_line) = CommandEnvelope::new(raw).command_line() else {
        return CommandOutcome::Passthrough(raw.to_string());
    };

    tracing::info!(command = %command_line, "executing command");

    match runner.run(&command_line).await {
        Ok(result) => {
            if !result.stderr.trim().is_empty() {
                tracing::warn!(stderr = %result.stderr.trim(), "command wrote to stderr");
            }
            CommandOutcome::Executed(result)
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to execute command");
            CommandOutcome::Failed
        }
    }
}

/// Command line that opens `url` with the desktop's default handler.
pub fn open_url_command(shell: ShellKind, url: &str) -> String {
    match shell.resolve() {
        ShellKind::PowerShell => format!("Start-Process '{}'", url),
        _ if cfg!(target_os = "macos") => format!("open '{}'", url),
        _ => format!("xdg-open '{}'", url),
    }
}

/// Runs command lines through PowerShell or `sh` with a wall-clock limit.
pub struct ShellExecutor {
    shell: ShellKind,
    timeout: Duration,
}

impl ShellExecutor {
    pub fn new(shell: ShellKind, timeout: Duration) -> Self {
        if timeout > MAX_TIMEOUT {
            tracing::warn!(
                requested_secs = timeout.as_secs(),
                max_secs = MAX_TIMEOUT.as_secs(),
                "command timeout clamped"
            );
        }
        Self {
            shell: shell.resolve(),
            timeout: timeout.min(MAX_TIMEOUT),
        }
    }

    fn build_command(&self, command_line: &str) -> TokioCommand {
        match self.shell {
            ShellKind::PowerShell => {
                let mut cmd = TokioCommand::new("powershell.exe");
                cmd.arg("-NoProfile")
                    .arg("-ExecutionPolicy")
                    .arg("Bypass")
                    .arg("-Command")
                    .arg(command_line);
                cmd
            }
            _ => {
                let mut cmd = TokioCommand::new("sh");
                cmd.arg("-c").arg(command_line);
                cmd
            }
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new(ShellKind::Auto, DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl CommandRunner for ShellExecutor {
    async fn run(&self, command_line: &str) -> io::Result<ExecutionResult> {
        let deadline = deadline_after(self.timeout);

        let mut child = self
            .build_command(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stderr was not captured"))?;

        // Both pipes are drained while the wait runs so a chatty child never blocks
        // on a full pipe buffer.
        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let mut stdout_task = spawn_drain(stdout, stdout_buf.clone());
        let mut stderr_task = spawn_drain(stderr, stderr_buf.clone());

        let timed_out = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(status) => {
                let status = status?;
                tracing::debug!(exit_code = ?status.code(), "command finished");
                false
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs_f32(),
                    "command timed out, killing it"
                );
                if let Err(e) = child.start_kill() {
                    tracing::warn!(error = %e, "could not kill timed out command");
                }
                true
            }
        };

        // A background grandchild can hold the pipes open; stop reading at the deadline.
        let drain_deadline = deadline.checked_add(DRAIN_GRACE).unwrap_or(deadline);
        let drained = tokio::time::timeout_at(drain_deadline, async {
            let _ = (&mut stdout_task).await;
            let _ = (&mut stderr_task).await;
        })
        .await;
        if drained.is_err() {
            tracing::debug!("abandoning output drains still open after the deadline");
        }
        stdout_task.abort();
        stderr_task.abort();

        Ok(ExecutionResult {
            stdout: take_lossy(&stdout_buf),
            stderr: take_lossy(&stderr_buf),
            timed_out,
        })
    }

    /// Launchers like `xdg-open` pass their stdio on to the program they start, so
    /// nothing is piped here and only the launcher's own exit is awaited.
    async fn launch(&self, command_line: &str) -> io::Result<()> {
        let mut child = self
            .build_command(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        match tokio::time::timeout_at(deadline_after(self.timeout), child.wait()).await {
            Ok(status) => {
                let status = status?;
                if !status.success() {
                    tracing::warn!(exit_code = ?status.code(), "launcher exited with an error");
                }
            }
            Err(_) => tracing::warn!("launcher still running at the deadline, leaving it"),
        }
        Ok(())
    }

    fn shell(&self) -> ShellKind {
        self.shell
    }
}

fn spawn_drain<R>(mut reader: R, sink: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => sink
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .extend_from_slice(&chunk[..n]),
                Err(e) => {
                    tracing::debug!(error = %e, "output stream read failed");
                    break;
                }
            }
        }
    })
}

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(MAX_TIMEOUT))
        .unwrap_or(now)
}

fn take_lossy(buf: &Mutex<Vec<u8>>) -> String {
    let bytes = buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    String::from_utf8_lossy(&bytes).into_owned()
}
