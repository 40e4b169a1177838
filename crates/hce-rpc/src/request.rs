// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Requests a client can send to the daemon (§6).

use std::collections::HashMap;
use std::path::PathBuf;

use hce_core::{HookEvent, HookInvocationId, OrchestrationId};
use serde::{Deserialize, Serialize};

/// One hook to execute as part of an `ExecuteHooks` or `DispatchSingleHook`
/// request. This is the wire shape; `hce-daemon` translates it into
/// `hce_engine::coordinator::DispatchRequest` once it has resolved a
/// fingerprint and a slot-wait timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookToRun {
    pub plugin: String,
    pub hook_name: String,
    pub directory: PathBuf,
    pub command: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub env_whitelist: Vec<String>,
    pub idle_timeout_ms: u64,
    pub wall_timeout_ms: u64,
    #[serde(default)]
    pub stdin_payload: Option<String>,
    #[serde(default)]
    pub if_changed: Vec<String>,
    #[serde(default)]
    pub deferrable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Liveness check; answered with `Response::Pong`.
    Ping,
    /// First message on a fresh connection. A version or token mismatch
    /// closes the connection with a `Response::Error` instead of an ack.
    Hello {
        version: String,
        token: String,
    },
    /// Ask the daemon to exit. `kill` skips waiting for in-flight
    /// invocations to drain.
    Shutdown {
        #[serde(default)]
        kill: bool,
    },
    /// Begin an orchestration for a lifecycle event.
    StartOrchestration {
        hook_event: HookEvent,
        project_root: PathBuf,
        #[serde(default)]
        session_id: Option<String>,
    },
    /// Run every hook for one orchestration, streaming output frames back
    /// as each hook produces them.
    ExecuteHooks {
        orchestration_id: OrchestrationId,
        hooks: Vec<HookToRun>,
        /// Overrides `HookEvent::fail_fast_by_default` when `Some`.
        #[serde(default)]
        fail_fast: Option<bool>,
    },
    /// Run a single hook outside of a fan-out group.
    DispatchSingleHook {
        orchestration_id: OrchestrationId,
        hook: HookToRun,
    },
    /// Block until a previously deferred hook either completes or is
    /// deferred again.
    WaitForDeferred {
        orchestration_id: OrchestrationId,
        deferred_hook_id: hce_core::DeferredHookId,
        env: HashMap<String, String>,
        env_whitelist: Vec<String>,
        idle_timeout_ms: u64,
        wall_timeout_ms: u64,
    },
    /// Reset a stuck attempt counter so the next dispatch is retried rather
    /// than immediately deferred.
    RaiseMaxAttempts {
        session_or_project: String,
        plugin: String,
        hook_name: String,
        directory: PathBuf,
    },
    /// Finalize an orchestration and report its worst exit code.
    EndOrchestration {
        orchestration_id: OrchestrationId,
    },
    /// Fetch the current state of an orchestration.
    QueryOrchestration {
        orchestration_id: OrchestrationId,
    },
    /// Request an exclusive slot lease for `directory` without dispatching
    /// a hook (used by callers that need to serialize external work).
    AcquireSlot {
        directory: PathBuf,
        holder: HookInvocationId,
        wait_timeout_ms: u64,
    },
    ReleaseSlot {
        directory: PathBuf,
        holder: HookInvocationId,
    },
    /// List every currently held or queued slot lease.
    ListLeases,
    /// Report the daemon's own health and basic counters.
    Status,
}
