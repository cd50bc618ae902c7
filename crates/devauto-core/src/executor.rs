//! Task executors
//!
//! The runner hands each task to a [`TaskExecutor`]. The shell executor runs
//! the command body on the host; tests substitute a mock.

use crate::{CoreError, Result};
use async_trait::async_trait;
use devauto_config::TaskSpec;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Environment variable carrying the id of the running task
pub const TASK_ID_ENV: &str = "DEVAUTO_TASK_ID";

/// Everything an executor needs besides the task itself
#[derive(Debug, Clone)]
pub struct ExecContext {
    /// Working directory for the command
    pub workdir: PathBuf,
    /// Shell used as `<shell> -c <command>`
    pub shell: String,
    /// Extra environment variables
    pub env: HashMap<String, String>,
    /// Kill the command after this long
    pub timeout: Option<Duration>,
    /// Output lines, prefixed with the task id
    pub progress: Option<mpsc::UnboundedSender<String>>,
}

impl ExecContext {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            shell: "/bin/sh".to_string(),
            env: HashMap::new(),
            timeout: None,
            progress: None,
        }
    }
}

/// Result of running one task command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// Process exit code; -1 when killed by a signal or timed out
    pub exit_code: i64,
    pub timed_out: bool,
    pub duration: Duration,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Runs a single task's command
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, id: &str, task: &TaskSpec, ctx: &ExecContext) -> Result<ExecResult>;
}

/// Runs command bodies through a local shell
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }
}

/// Kills a task's whole process group when dropped, unless disarmed.
///
/// Commands run in their own group so that processes forked by the shell
/// die together with it on timeout or cancellation.
struct ProcessGroup {
    #[cfg(unix)]
    pgid: Option<nix::unistd::Pid>,
}

impl ProcessGroup {
    #[cfg(unix)]
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.map(|p| nix::unistd::Pid::from_raw(p as i32)),
        }
    }

    #[cfg(not(unix))]
    fn new(_pid: Option<u32>) -> Self {
        Self {}
    }

    fn kill(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            use nix::sys::signal::{killpg, Signal};
            match killpg(pgid, Signal::SIGKILL) {
                Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
                Err(e) => tracing::warn!("Failed to kill process group {}: {}", pgid, e),
            }
        }
    }

    fn disarm(&mut self) {
        #[cfg(unix)]
        {
            self.pgid = None;
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

pub(crate) fn send_progress(progress: Option<&mpsc::UnboundedSender<String>>, msg: &str) {
    if let Some(tx) = progress {
        let _ = tx.send(msg.to_string());
    }
}

#[async_trait]
impl TaskExecutor for ShellExecutor {
    async fn execute(&self, id: &str, task: &TaskSpec, ctx: &ExecContext) -> Result<ExecResult> {
        let started = Instant::now();

        let mut cmd = Command::new(&ctx.shell);
        cmd.arg("-c")
            .arg(&task.command)
            .current_dir(&ctx.workdir)
            .envs(&ctx.env)
            .env(TASK_ID_ENV, id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        tracing::debug!("Spawning task '{}' with {} in {:?}", id, ctx.shell, ctx.workdir);
        let mut child = cmd
            .spawn()
            .map_err(|e| CoreError::ExecFailed(format!("failed to spawn {}: {}", ctx.shell, e)))?;
        let mut group = ProcessGroup::new(child.id());

        // Drain both pipes together so neither fills up and blocks the child
        let mut stdout_lines = child.stdout.take().map(|s| BufReader::new(s).lines());
        let mut stderr_lines = child.stderr.take().map(|s| BufReader::new(s).lines());
        let progress = ctx.progress.as_ref();

        let drain_and_wait = async {
            while stdout_lines.is_some() || stderr_lines.is_some() {
                tokio::select! {
                    result = async {
                        match stdout_lines.as_mut() {
                            Some(lines) => lines.next_line().await,
                            None => std::future::pending().await,
                        }
                    } => match result {
                        Ok(Some(line)) => send_progress(progress, &format!("[{}] {}", id, line)),
                        _ => stdout_lines = None,
                    },
                    result = async {
                        match stderr_lines.as_mut() {
                            Some(lines) => lines.next_line().await,
                            None => std::future::pending().await,
                        }
                    } => match result {
                        Ok(Some(line)) => send_progress(progress, &format!("[{}] {}", id, line)),
                        _ => stderr_lines = None,
                    },
                }
            }
            child.wait().await
        };

        let waited = match ctx.timeout {
            Some(limit) => match tokio::time::timeout(limit, drain_and_wait).await {
                Ok(status) => Some(status?),
                Err(_) => None,
            },
            None => Some(drain_and_wait.await?),
        };

        let duration = started.elapsed();
        match waited {
            Some(status) => {
                group.disarm();
                let exit_code = status.code().map(i64::from).unwrap_or(-1);
                tracing::debug!("Task '{}' exited with {} after {:?}", id, exit_code, duration);
                Ok(ExecResult {
                    exit_code,
                    timed_out: false,
                    duration,
                })
            }
            None => {
                group.kill();
                let _ = child.start_kill();
                let _ = child.wait().await;
                tracing::warn!("Task '{}' timed out after {:?}", id, duration);
                Ok(ExecResult {
                    exit_code: -1,
                    timed_out: true,
                    duration,
                })
            }
        }
    }
}
