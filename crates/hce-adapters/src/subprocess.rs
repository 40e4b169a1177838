// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandboxed child-process construction and low-level signal delivery.
//!
//! This is the mechanism layer only: building a `Command` with a cleared,
//! whitelisted environment and a restricted `PATH`, running it with a
//! simple overall timeout, and sending POSIX signals by pid. The
//! idle/wall-timeout race and line-framing policy live one layer up, in
//! the hook runner, which needs the injected `Clock` this crate has no
//! reason to depend on.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

#[cfg(unix)]
const SAFE_PATH_DIRS: &[&str] = &["/usr/local/bin", "/usr/bin", "/bin"];
#[cfg(windows)]
const SAFE_PATH_DIRS: &[&str] = &[r"C:\Windows\System32", r"C:\Windows"];

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{1} timed out after {0:?}")]
    Timeout(Duration, String),
    #[error("failed to spawn child process: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("signal delivery failed: {0}")]
    Signal(#[from] nix::Error),
}

/// The restricted `PATH` sandboxed commands are given, independent of
/// whatever the daemon process itself inherited.
pub fn safe_path() -> String {
    SAFE_PATH_DIRS.join(if cfg!(windows) { ";" } else { ":" })
}

/// Builds a `/bin/sh -c <command>` invocation with the environment cleared
/// and rebuilt from `env_whitelist` (pulled from the daemon's own
/// environment), then `extra_env` applied on top — so per-hook
/// configuration can add variables without widening the whitelist itself.
/// stdin/stdout/stderr are all piped.
pub fn sandboxed_command(
    command: &str,
    working_dir: &Path,
    env_whitelist: &[String],
    extra_env: &HashMap<String, String>,
) -> Command {
    let shell = if which_bash_exists() { "bash" } else { "sh" };
    let mut cmd = Command::new(shell);
    cmd.arg("-c").arg(command);
    cmd.current_dir(working_dir);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    cmd.env_clear();
    for var in env_whitelist {
        if var == "PATH" {
            cmd.env("PATH", safe_path());
            continue;
        }
        if let Ok(value) = std::env::var(var) {
            cmd.env(var, value);
        }
    }
    for (key, value) in extra_env {
        cmd.env(key, value);
    }

    cmd
}

fn which_bash_exists() -> bool {
    SAFE_PATH_DIRS.iter().any(|dir| Path::new(dir).join("bash").exists())
}

/// Runs `cmd` to completion, collecting its full output, bounded by
/// `timeout_duration`. For streaming hook output, the caller should use
/// `spawn`/`wait` directly instead — this is for short, non-streaming
/// subprocess calls (e.g. tracked-file hashing helpers).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout_duration: Duration,
    label: &str,
) -> Result<std::process::Output, SubprocessError> {
    match timeout(timeout_duration, cmd.output()).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(SubprocessError::Timeout(timeout_duration, label.to_string())),
    }
}

/// Sends `SIGTERM` to `pid`. A no-op-returning-`Ok` pattern is deliberately
/// not used here — the caller (the hook runner's escalation loop) decides
/// how to treat "process already gone".
pub fn send_terminate(pid: u32) -> Result<(), SubprocessError> {
    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(SubprocessError::Signal)
}

pub fn send_kill(pid: u32) -> Result<(), SubprocessError> {
    kill(Pid::from_raw(pid as i32), Signal::SIGKILL).map_err(SubprocessError::Signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn sandboxed_command_clears_unlisted_env_vars() {
        std::env::set_var("HCE_TEST_SECRET", "leaked");
        let dir = tempdir().unwrap();
        let whitelist = vec!["PATH".to_string()];
        let cmd = sandboxed_command("echo $HCE_TEST_SECRET", dir.path(), &whitelist, &HashMap::new());
        let output = run_with_timeout(cmd, Duration::from_secs(5), "test").await.unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "");
        std::env::remove_var("HCE_TEST_SECRET");
    }

    #[tokio::test]
    async fn sandboxed_command_passes_through_extra_env() {
        let dir = tempdir().unwrap();
        let mut extra = HashMap::new();
        extra.insert("HCE_TEST_VAR".to_string(), "hello".to_string());
        let cmd = sandboxed_command("echo $HCE_TEST_VAR", dir.path(), &[], &extra);
        let output = run_with_timeout(cmd, Duration::from_secs(5), "test").await.unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn run_with_timeout_reports_timeout_error() {
        let dir = tempdir().unwrap();
        let cmd = sandboxed_command("sleep 5", dir.path(), &[], &HashMap::new());
        let result = run_with_timeout(cmd, Duration::from_millis(50), "sleep").await;
        assert!(matches!(result, Err(SubprocessError::Timeout(_, _))));
    }
}
