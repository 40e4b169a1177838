// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hce leases list` — report currently held per-directory slot leases.

use anyhow::Result;

use crate::client::DaemonClient;
use crate::output::{handle_list, OutputFormat};

pub async fn list(format: OutputFormat) -> Result<()> {
    let mut client = DaemonClient::connect().await?;
    let leases = client.list_leases().await?;

    handle_list(format, &leases, "no active slot leases.", |leases| {
        for lease in leases {
            println!(
                "{:<40} holder={} queue_depth={} deadline_ms={}",
                lease.directory, lease.holder, lease.queue_depth, lease.deadline_ms
            );
        }
    })
}
