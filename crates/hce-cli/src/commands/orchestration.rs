// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hce orchestration show <id>` — report one orchestration's state.

use anyhow::{Context, Result};

use crate::client::DaemonClient;
use crate::output::{format_or_json, OutputFormat};

pub async fn show(id: String, format: OutputFormat) -> Result<()> {
    let orchestration_id: hce_core::OrchestrationId = id.clone().into();
    let mut client = DaemonClient::connect().await.context("connecting to the daemon")?;
    let summary = client.query_orchestration(orchestration_id).await?;

    format_or_json(format, &summary, || {
        println!("orchestration: {id}");
        println!("worst exit code: {}", summary.worst_exit_code);
        println!("terminal: {}", summary.is_terminal);
        println!("invocations: {}", summary.invocation_count);
    })
}
