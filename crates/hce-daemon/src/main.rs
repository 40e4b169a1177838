// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! hced: the hook coordination daemon binary.

mod env;
mod lifecycle;
mod listener;

use std::sync::Arc;

use lifecycle::{Config, LifecycleError};
use listener::{ListenCtx, Listener};
use tokio::sync::Notify;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        error!(error = %e, "daemon exited with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), LifecycleError> {
    let config = Config::load()?;
    let startup = lifecycle::startup(&config).await?;
    let daemon = startup.daemon;

    println!("READY");

    let shutdown = Arc::new(Notify::new());
    let ctx = Arc::new(ListenCtx {
        store: daemon.store.clone(),
        slots: daemon.slots.clone(),
        coordinator: daemon.coordinator.clone(),
        start_time: daemon.start_time,
        shutdown: shutdown.clone(),
        token: daemon.token.clone(),
    });

    let listener_task = tokio::spawn(Listener::new(startup.listener, ctx).run());
    let sweep_task = tokio::spawn(sweep_loop(daemon.slots.clone()));
    let checkpoint_task = tokio::spawn(checkpoint_loop(daemon.store.clone()));

    tokio::select! {
        _ = shutdown.notified() => info!("shutdown requested over rpc"),
        _ = tokio::signal::ctrl_c() => info!("shutdown requested via ctrl-c"),
    }

    listener_task.abort();
    sweep_task.abort();
    checkpoint_task.abort();

    daemon.shutdown()
}

/// Periodically reclaims slot leases past their deadline (§4.3 crash
/// recovery for the common case of a hung or killed runner that never
/// released its lease).
async fn sweep_loop(slots: Arc<hce_engine::SlotManager<hce_core::SystemClock>>) {
    let mut ticker = tokio::time::interval(env::slot_sweep_interval());
    loop {
        ticker.tick().await;
        match slots.sweep() {
            Ok(expired) if !expired.is_empty() => {
                info!(count = expired.len(), "reclaimed expired slot leases");
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "slot sweep failed"),
        }
    }
}

async fn checkpoint_loop(store: hce_storage::Store) {
    let mut ticker = tokio::time::interval(env::checkpoint_interval());
    loop {
        ticker.tick().await;
        if let Err(e) = store.checkpoint() {
            error!(error = %e, "periodic checkpoint failed");
        }
    }
}
