// src/exec/shell.rs

//! Shell command runner used by command tasks.

use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// Run `cmd` through the platform shell and wait for it to exit.
///
/// Stdout and stderr are drained line by line and logged at debug level so
/// the pipes never fill up. The child is killed if the returned future is
/// dropped before it exits.
///
/// Only failures to spawn or wait produce an `Err`; a non-zero exit is
/// reported through the returned status.
pub async fn run_shell(task: &str, step: &str, cmd: &str) -> Result<ExitStatus> {
    info!(task, step, cmd, "starting process");

    // Build a shell command appropriate for the platform.
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning {step} process for task '{task}'"))?;

    if let Some(stdout) = child.stdout.take() {
        drain_lines(task, "stdout", stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        drain_lines(task, "stderr", stderr);
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for {step} process of task '{task}'"))?;

    info!(
        task,
        step,
        exit_code = status.code().unwrap_or(-1),
        success = status.success(),
        "process exited"
    );

    Ok(status)
}

fn drain_lines<R>(task: &str, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let task = task.to_string();
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(task = %task, "{}: {}", stream, line);
        }
    });
}
