// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown.
//!
//! Grounded on the teacher's `lifecycle/mod.rs`: a lock file guards against
//! two daemons racing for the same state directory, and the socket/lock
//! files are cleaned up on the way out. Crash recovery itself (WAL replay,
//! orphaned-invocation reconciliation, expired-lease reclaim) lives inside
//! `hce_storage::Store::open` and is not re-implemented here.

mod startup;
pub use startup::startup;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use hce_core::SystemClock;
use hce_engine::{Coordinator, SlotManager};
use hce_storage::Store;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

/// Daemon configuration: where its state, socket and lock files live.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub wal_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub token_path: PathBuf,
}

impl Config {
    /// Fixed paths under the resolved state directory. One daemon serves
    /// every project for a user.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        Ok(Self {
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            wal_path: state_dir.join("wal").join("events.wal"),
            snapshot_path: state_dir.join("snapshot.json"),
            token_path: state_dir.join("daemon.token"),
            state_dir,
        })
    }
}

/// Daemon state during operation.
pub struct DaemonState {
    pub config: Config,
    #[allow(dead_code)]
    lock_file: File,
    pub store: Store,
    pub slots: Arc<SlotManager<SystemClock>>,
    pub coordinator: Arc<Coordinator<SystemClock>>,
    pub start_time: Instant,
    /// Shared secret clients must present in their opening `Hello` (§4.6).
    pub token: String,
}

/// Result of daemon startup.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: UnixListener,
}

impl DaemonState {
    /// Shut down gracefully: checkpoint the WAL, then remove the socket and
    /// lock files. The lock itself is released when `lock_file` drops.
    pub fn shutdown(&self) -> Result<(), LifecycleError> {
        info!("shutting down daemon");

        if let Err(e) = self.store.checkpoint() {
            warn!(error = %e, "failed to save shutdown checkpoint");
        }

        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!(error = %e, "failed to remove socket file");
            }
        }
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!(error = %e, "failed to remove lock file");
            }
        }

        info!("daemon shutdown complete");
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,
    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),
    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] hce_storage::StoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
