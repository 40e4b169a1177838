// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hce daemon start|stop|restart|status` — daemon lifecycle management.

use anyhow::{anyhow, Result};
use clap::Subcommand;

use crate::client::DaemonClient;
use crate::output::OutputFormat;

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon if it is not already running.
    Start,
    /// Ask the daemon to shut down.
    Stop {
        /// Skip waiting for in-flight invocations to drain.
        #[arg(long)]
        kill: bool,
    },
    /// Stop then start the daemon.
    Restart {
        #[arg(long)]
        kill: bool,
    },
    /// Report whether the daemon is running.
    Status,
}

pub async fn handle(command: DaemonCommand, format: OutputFormat) -> Result<()> {
    match command {
        DaemonCommand::Start => start().await,
        DaemonCommand::Stop { kill } => stop(kill).await,
        DaemonCommand::Restart { kill } => restart(kill).await,
        DaemonCommand::Status => super::status::handle(format).await,
    }
}

async fn start() -> Result<()> {
    if DaemonClient::connect().await.is_ok() {
        println!("daemon already running");
        return Ok(());
    }
    DaemonClient::connect_or_start().await.map_err(|e| anyhow!("{e}"))?;
    println!("daemon started");
    Ok(())
}

async fn stop(kill: bool) -> Result<()> {
    let mut client = match DaemonClient::connect().await {
        Ok(c) => c,
        Err(e) if e.is_not_running() => {
            println!("daemon not running");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    client.shutdown(kill).await?;
    println!("daemon stopped");
    Ok(())
}

async fn restart(kill: bool) -> Result<()> {
    let was_running = DaemonClient::connect().await.is_ok();
    stop(kill).await?;
    if was_running {
        // Grace period for the OS to release the Unix socket after the
        // daemon process exits.
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    }
    DaemonClient::connect_or_start().await.map_err(|e| anyhow!("{e}"))?;
    println!("daemon restarted");
    Ok(())
}
