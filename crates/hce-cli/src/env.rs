// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the CLI crate.
//!
//! Mirrors `hce-daemon`'s resolution exactly — the CLI and the daemon must
//! agree on where the socket lives without either side being able to import
//! the other.

use std::path::PathBuf;
use std::time::Duration;

use crate::client::ClientError;

/// Resolve state directory: `HCE_STATE_DIR` > `XDG_STATE_HOME`/hce > `~/.local/state/hce`.
pub fn state_dir() -> Result<PathBuf, ClientError> {
    if let Ok(dir) = std::env::var("HCE_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("hce"));
    }
    let home = dirs::home_dir().ok_or(ClientError::NoStateDir)?;
    Ok(home.join(".local/state/hce"))
}

pub fn socket_path() -> Result<PathBuf, ClientError> {
    Ok(state_dir()?.join("daemon.sock"))
}

pub fn token_path() -> Result<PathBuf, ClientError> {
    Ok(state_dir()?.join("daemon.token"))
}

/// Per-request IPC read/write timeout.
pub fn ipc_timeout() -> Duration {
    std::env::var("HCE_IPC_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(30))
}

/// How long `connect_or_start` waits for a freshly spawned daemon to bind
/// its socket before giving up.
pub fn start_timeout() -> Duration {
    std::env::var("HCE_START_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}
