// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hce status` — report whether the daemon is running and its counters.

use anyhow::Result;

use crate::client::DaemonClient;
use crate::output::{format_or_json, OutputFormat};

pub async fn handle(format: OutputFormat) -> Result<()> {
    let mut client = match DaemonClient::connect().await {
        Ok(c) => c,
        Err(e) if e.is_not_running() => {
            return format_or_json(
                format,
                &serde_json::json!({ "status": "not_running" }),
                || println!("daemon is not running"),
            );
        }
        Err(e) => return Err(e.into()),
    };

    let summary = client.status().await?;

    format_or_json(format, &summary, || {
        println!("status: running");
        println!("version: {}", summary.version);
        println!("uptime: {}ms", summary.uptime_ms);
        println!("active invocations: {}", summary.active_invocations);
        println!("active orchestrations: {}", summary.active_orchestrations);
    })
}
