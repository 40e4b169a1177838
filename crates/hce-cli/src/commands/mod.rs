// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations.

pub mod daemon;
pub mod leases;
pub mod orchestration;
pub mod run;
pub mod status;

/// Parses a hook event name the way settings files spell it
/// (`PreToolUse`, `SessionStart`, ...).
pub fn parse_hook_event(name: &str) -> anyhow::Result<hce_core::HookEvent> {
    use hce_core::HookEvent::*;
    Ok(match name {
        "SessionStart" => SessionStart,
        "UserPromptSubmit" => UserPromptSubmit,
        "PreToolUse" => PreToolUse,
        "PostToolUse" => PostToolUse,
        "Notification" => Notification,
        "Stop" => Stop,
        "SubagentStop" => SubagentStop,
        "SessionEnd" => SessionEnd,
        other => anyhow::bail!("unknown hook event: {other}"),
    })
}
