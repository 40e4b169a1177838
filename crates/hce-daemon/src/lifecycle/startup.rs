// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use hce_core::SystemClock;
use hce_engine::{Coordinator, SlotManager};
use hce_storage::Store;
use tokio::net::UnixListener;
use tracing::info;

use super::{Config, DaemonState, LifecycleError, StartupResult};

pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // A lock failure means another daemon owns these files — leave
            // them alone.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    if let Some(parent) = config.wal_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Acquire the lock before touching anything else — it's what prevents
    // two daemons racing for the same state directory.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // Store::open replays the WAL from the last snapshot and reconciles
    // crash-time state: orphaned `Running` invocations are marked `Killed`,
    // expired slot leases are dropped (§4.3).
    let store = Store::open(&config.wal_path, &config.snapshot_path)?;
    info!("recovered daemon state from wal/snapshot");

    let slots = Arc::new(SlotManager::new(store.clone(), SystemClock));
    let coordinator = Arc::new(Coordinator::new(store.clone(), slots.clone()));

    let token = load_or_create_token(&config.token_path)?;

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    info!("daemon started");

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            store,
            slots,
            coordinator,
            start_time: Instant::now(),
            token,
        },
        listener,
    })
}

/// Loads the persisted handshake token, generating and persisting a new one
/// on first run. Reused across restarts so a client doesn't need to notice
/// the daemon bounced mid-session. Written with owner-only permissions since
/// it's the sole thing standing between the Unix socket's filesystem
/// permissions and anyone who can reach it.
fn load_or_create_token(path: &std::path::Path) -> Result<String, LifecycleError> {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    let token = nanoid::nanoid!(32);
    std::fs::write(path, &token)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(token)
}

fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}
