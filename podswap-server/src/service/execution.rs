//! Execution service
//!
//! Runs one stage command as a child process:
//! - Working directory is the pipeline's work dir
//! - Stdout and stderr are captured, stdin is closed
//! - The process is killed when the stage timeout fires
//!
//! Shutdown does not reach into a running command. Only the timeout stops it.

use async_trait::async_trait;
use podswap_core::command::launch_path;
use podswap_core::{CommandLine, Stage, StageOutcome, StageResult};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long to keep reading output after the process is gone. Background
/// children that inherited the pipes would otherwise hold the stage open.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Service trait for executing stage commands
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Runs `command` in `work_dir`, giving up after `timeout`
    ///
    /// Never fails: launch errors and timeouts are reported in the result.
    async fn execute(
        &self,
        stage: Stage,
        command: &CommandLine,
        work_dir: &Path,
        timeout: Duration,
    ) -> StageResult;
}

/// Executes stage commands as local child processes
#[derive(Debug, Default)]
pub struct ProcessExecutor {}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl StageExecutor for ProcessExecutor {
    async fn execute(
        &self,
        stage: Stage,
        command: &CommandLine,
        work_dir: &Path,
        timeout: Duration,
    ) -> StageResult {
        debug!(
            "Spawning {} command: {} {:?} in {}",
            stage,
            command.program,
            command.args,
            work_dir.display()
        );

        let started = Instant::now();
        let mut child = match Command::new(launch_path(&command.program, work_dir))
            .args(&command.args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return StageResult::launch_failed(stage, e.to_string()),
        };

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let outcome = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => StageOutcome::Succeeded,
            Ok(Ok(status)) => StageOutcome::Exited {
                code: status.code(),
            },
            Ok(Err(e)) => StageOutcome::LaunchFailed {
                reason: format!("failed to wait for process: {}", e),
            },
            Err(_) => {
                warn!("{} command exceeded {:?}, killing it", stage, timeout);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill {} command: {}", stage, e);
                }
                StageOutcome::TimedOut { after: timeout }
            }
        };

        let mut output = collect(stdout).await;
        output.push_str(&collect(stderr).await);

        StageResult {
            stage,
            output,
            elapsed: started.elapsed(),
            outcome,
        }
    }
}

fn spawn_reader<R>(reader: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            if let Err(e) = reader.read_to_end(&mut buf).await {
                debug!("Stopped reading command output: {}", e);
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

async fn collect(mut handle: JoinHandle<String>) -> String {
    match tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut handle).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            warn!("Output reader failed: {}", e);
            String::new()
        }
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}
