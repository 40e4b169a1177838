// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: paths and tunables, resolved once at startup.
//!
//! Mirrors the shape of the teacher's `lifecycle::Config` (fixed paths
//! under a state directory plus a `load()` constructor), extended with the
//! tunables SPEC_FULL.md §1.1/§9 ask to keep out of hardcoded constants.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine state directory")]
    NoStateDir,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. `~/.local/state/hce`).
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
    pub log_path: PathBuf,
    pub wal_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub workspaces_path: PathBuf,

    /// Default idle timeout for a hook with none configured (§4.4).
    pub default_idle_timeout: Duration,
    /// Default wall timeout for a hook with none configured (§4.4).
    pub default_wall_timeout: Duration,
    /// Grace period between terminate and kill signals (§4.4, §5).
    pub grace_period: Duration,
    /// Default slot acquire wait before `slot_wait_timeout` (§4.5).
    pub default_slot_wait_timeout: Duration,
    /// Environment variables forwarded to every child hook regardless of
    /// per-hook configuration (§9 open question decision).
    pub env_whitelist: Vec<String>,
    /// Number of WAL-append operations buffered before an automatic flush.
    pub wal_flush_threshold: usize,
    /// Maximum number of rotated `.bak` files kept per corrupted log (§4.1).
    pub max_backup_files: u32,
}

impl Config {
    /// Load configuration for the user-level daemon.
    ///
    /// Uses fixed paths under `~/.local/state/hce/` (or `$XDG_STATE_HOME/hce/`).
    pub fn load() -> Result<Self, ConfigError> {
        let state_dir = state_dir()?;
        Ok(Self::for_state_dir(state_dir))
    }

    /// Build a config rooted at an arbitrary state directory, used by tests
    /// and by `--state-dir` overrides.
    pub fn for_state_dir(state_dir: PathBuf) -> Self {
        Self {
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            version_path: state_dir.join("daemon.version"),
            log_path: state_dir.join("daemon.log"),
            wal_path: state_dir.join("wal").join("events.wal"),
            snapshot_path: state_dir.join("snapshot.json"),
            workspaces_path: state_dir.join("workspaces"),
            state_dir,
            default_idle_timeout: Duration::from_secs(60),
            default_wall_timeout: Duration::from_secs(600),
            grace_period: Duration::from_millis(500),
            default_slot_wait_timeout: Duration::from_secs(120),
            env_whitelist: vec!["PATH".into(), "HOME".into(), "LANG".into(), "TERM".into()],
            wal_flush_threshold: 100,
            max_backup_files: 3,
        }
    }
}

fn state_dir() -> Result<PathBuf, ConfigError> {
    dirs::state_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join("hce"))
        .ok_or(ConfigError::NoStateDir)
}
