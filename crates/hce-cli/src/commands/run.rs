// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hce run <event>` — dispatch every configured hook for a lifecycle event
//! and exit with the worst exit code.

use std::path::PathBuf;

use anyhow::{Context, Result};
use hce_engine::hook_config::{load_merged, HookDef};
use hce_rpc::{HookToRun, StreamFrame};

use crate::client::DaemonClient;
use crate::exit_error::ExitError;

const DEFAULT_IDLE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_WALL_TIMEOUT_MS: u64 = 60_000;

pub struct RunOptions {
    pub event: String,
    pub cwd: PathBuf,
    pub session_id: Option<String>,
    pub fail_fast: Option<bool>,
    /// When non-empty, restrict dispatch to hooks whose synthesized
    /// `hook_name` (`group<N>-hook<N>`) appears here.
    pub hooks: Vec<String>,
}

pub async fn handle(options: RunOptions) -> Result<()> {
    let event = super::parse_hook_event(&options.event)?;
    let project_root = std::fs::canonicalize(&options.cwd)
        .with_context(|| format!("resolving {}", options.cwd.display()))?;
    let home = dirs::home_dir().context("could not determine home directory")?;

    let settings = load_merged(&project_root, &home).context("loading hook settings")?;
    let groups = match settings.hooks.get(&event) {
        Some(groups) if !groups.is_empty() => groups,
        _ => {
            println!("no hooks configured for {event}");
            return Ok(());
        }
    };

    let mut hooks = to_hooks_to_run(groups, &project_root);
    if !options.hooks.is_empty() {
        hooks.retain(|hook| options.hooks.contains(&hook.hook_name));
    }
    if hooks.is_empty() {
        println!("no runnable hooks configured for {event}");
        return Ok(());
    }

    let mut client = DaemonClient::connect_or_start().await?;
    let orchestration_id =
        client.start_orchestration(event, project_root, options.session_id).await?;

    let worst_exit_code = client
        .execute_hooks(orchestration_id, hooks, options.fail_fast, print_frame)
        .await?;

    client.end_orchestration(orchestration_id).await?;

    if worst_exit_code != 0 {
        return Err(ExitError::new(worst_exit_code, "one or more hooks failed").into());
    }
    Ok(())
}

fn print_frame(frame: StreamFrame) {
    match frame {
        StreamFrame::Stdout { line, .. } => println!("{line}"),
        StreamFrame::Stderr { line, .. } => eprintln!("{line}"),
        StreamFrame::Complete { exit_code, cached, duration_ms, error, .. } => {
            if let Some(error) = error {
                eprintln!("[hce] error after {duration_ms}ms: {error}");
            } else if cached {
                eprintln!("[hce] cache hit (exit {exit_code})");
            } else {
                eprintln!("[hce] exit {exit_code} in {duration_ms}ms");
            }
        }
        StreamFrame::Deferred { deferred_hook_id, .. } => {
            eprintln!("[hce] deferred: {deferred_hook_id}");
        }
    }
}

/// Flattens configured hook groups into the wire shape, synthesizing a
/// stable `(plugin, hook_name)` pair per hook since settings files do not
/// name their own hooks — only the command and its group position.
fn to_hooks_to_run(
    groups: &[hce_engine::hook_config::HookGroup],
    project_root: &std::path::Path,
) -> Vec<HookToRun> {
    let mut hooks = Vec::new();
    for (group_idx, group) in groups.iter().enumerate() {
        for (hook_idx, def) in group.hooks.iter().enumerate() {
            match def {
                HookDef::Command { command, timeout_ms, idle_timeout_ms, if_changed, .. } => {
                    hooks.push(HookToRun {
                        plugin: "local".to_string(),
                        hook_name: format!("group{group_idx}-hook{hook_idx}"),
                        directory: project_root.to_path_buf(),
                        command: command.clone(),
                        env: std::collections::HashMap::new(),
                        env_whitelist: Vec::new(),
                        idle_timeout_ms: idle_timeout_ms.unwrap_or(DEFAULT_IDLE_TIMEOUT_MS),
                        wall_timeout_ms: timeout_ms.unwrap_or(DEFAULT_WALL_TIMEOUT_MS),
                        stdin_payload: None,
                        if_changed: if_changed.clone(),
                        deferrable: def.is_deferrable(),
                    });
                }
                HookDef::Prompt { .. } => {
                    eprintln!(
                        "[hce] skipping prompt hook in group{group_idx}-hook{hook_idx}: \
                         not dispatchable by the daemon"
                    );
                }
            }
        }
    }
    hooks
}
