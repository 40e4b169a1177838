// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawns one child process and turns its byte streams into a structured
//! frame sequence (§4.4).
//!
//! Grounded on `crates/daemon/src/engine/executor.rs`'s `execute_shell`
//! (child spawn, piped stdio, timeout race) generalized with
//! `unicity-astrid-astrid`'s idle/wall-timeout escalation idiom
//! (terminate, grace period, kill).

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use hce_adapters::{sandboxed_command, send_kill, send_terminate};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// Grace period between a terminate signal and the follow-up kill signal
/// (§4.4, §5).
pub const GRACE_PERIOD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct HookSpec {
    pub command: String,
    pub working_dir: PathBuf,
    pub env: HashMap<String, String>,
    pub env_whitelist: Vec<String>,
    pub idle_timeout: Duration,
    pub wall_timeout: Duration,
    pub stdin_payload: Option<Vec<u8>>,
}

/// One unit of runner output. Frames for a single stream are strictly
/// ordered; stdout and stderr may interleave arbitrarily (§5).
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    StdoutLine(String),
    StderrLine(String),
    Complete { exit_code: i32, duration_ms: u64, error: Option<String> },
}

/// Spawns `spec` and streams its output on a channel, returning
/// immediately. The channel closes after the terminal `Complete` frame.
pub fn spawn(spec: HookSpec) -> mpsc::Receiver<Frame> {
    spawn_cancelable(spec, CancellationToken::new())
}

/// Like [`spawn`] but also races a [`CancellationToken`] — cancelling it has
/// the same terminate-then-kill escalation as a timeout, but is reported as
/// exit code `130` with no `error` string (cooperative client cancel, §4.5).
pub fn spawn_cancelable(spec: HookSpec, cancel: CancellationToken) -> mpsc::Receiver<Frame> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(run(spec, tx, cancel));
    rx
}

async fn run(spec: HookSpec, tx: mpsc::Sender<Frame>, cancel: CancellationToken) {
    let start = Instant::now();
    let mut cmd = sandboxed_command(&spec.command, &spec.working_dir, &spec.env_whitelist, &spec.env);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            let _ = tx
                .send(Frame::Complete { exit_code: 1, duration_ms: 0, error: Some(e.to_string()) })
                .await;
            return;
        }
    };

    let pid = child.id();

    match (&spec.stdin_payload, child.stdin.take()) {
        (Some(payload), Some(mut stdin)) => {
            let payload = payload.clone();
            tokio::spawn(async move {
                let _ = stdin.write_all(&payload).await;
                let _ = stdin.shutdown().await;
            });
        }
        (None, Some(stdin)) => drop(stdin),
        _ => {}
    }

    let Some(stdout) = child.stdout.take() else { return };
    let Some(stderr) = child.stderr.take() else { return };
    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();

    let wall_deadline = sleep(spec.wall_timeout);
    tokio::pin!(wall_deadline);
    let idle_sleep = sleep(spec.idle_timeout);
    tokio::pin!(idle_sleep);

    let mut stdout_done = false;
    let mut stderr_done = false;
    let mut timeout_kind: Option<&'static str> = None;

    while !(stdout_done && stderr_done) {
        tokio::select! {
            line = stdout_lines.next_line(), if !stdout_done => {
                match line {
                    Ok(Some(text)) => {
                        idle_sleep.as_mut().reset(Instant::now() + spec.idle_timeout);
                        if tx.send(Frame::StdoutLine(strip_cr(text))).await.is_err() {
                            return;
                        }
                    }
                    _ => stdout_done = true,
                }
            }
            line = stderr_lines.next_line(), if !stderr_done => {
                match line {
                    Ok(Some(text)) => {
                        idle_sleep.as_mut().reset(Instant::now() + spec.idle_timeout);
                        if tx.send(Frame::StderrLine(strip_cr(text))).await.is_err() {
                            return;
                        }
                    }
                    _ => stderr_done = true,
                }
            }
            _ = &mut idle_sleep => {
                timeout_kind = Some("idle_timeout");
                break;
            }
            _ = &mut wall_deadline => {
                timeout_kind = Some("wall_timeout");
                break;
            }
            _ = cancel.cancelled() => {
                timeout_kind = Some("cancelled");
                break;
            }
        }
    }

    let (exit_code, error) = if timeout_kind == Some("cancelled") {
        let (_, _) = escalate(&mut child, pid, "cancelled").await;
        (130, None)
    } else if let Some(kind) = timeout_kind {
        escalate(&mut child, pid, kind).await
    } else {
        match child.wait().await {
            Ok(status) => (status.code().unwrap_or(-1), None),
            Err(e) => (1, Some(e.to_string())),
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    let _ = tx.send(Frame::Complete { exit_code, duration_ms, error }).await;
}

fn strip_cr(mut line: String) -> String {
    if line.ends_with('\r') {
        line.pop();
    }
    line
}

/// Terminate, wait up to the grace period, then kill (§4.4). Exit is
/// reported as `143` if the terminate signal was enough, `137` otherwise.
async fn escalate(
    child: &mut tokio::process::Child,
    pid: Option<u32>,
    kind: &'static str,
) -> (i32, Option<String>) {
    if let Some(pid) = pid {
        let _ = send_terminate(pid);
    }

    match tokio::time::timeout(GRACE_PERIOD, child.wait()).await {
        Ok(Ok(_)) => (143, Some(kind.to_string())),
        _ => {
            if let Some(pid) = pid {
                let _ = send_kill(pid);
            }
            let _ = child.wait().await;
            (137, Some(kind.to_string()))
        }
    }
}
