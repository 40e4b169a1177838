// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The WAL's unit of durability: one fact about a mutation to the Store.
//!
//! `MaterializedState::apply_event` (in `hce-storage`) folds these into the
//! in-memory entity tables. Every entity mutation in §3/§4.1 has a
//! corresponding variant; nothing is mutated in place without first being
//! represented here.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cache::CacheEntry;
use crate::fingerprint::Fingerprint;
use crate::ids::{DeferredHookId, HookInvocationId, OrchestrationId};
use crate::invocation::InvocationStatus;
use crate::orchestration::HookEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrchestrationStarted {
        id: OrchestrationId,
        session_id: Option<String>,
        hook_event: HookEvent,
        project_root: PathBuf,
        started_at_ms: u64,
    },
    OrchestrationEnded {
        id: OrchestrationId,
        ended_at_ms: u64,
    },

    InvocationRecorded {
        id: HookInvocationId,
        orchestration_id: OrchestrationId,
        plugin: String,
        hook_name: String,
        directory: PathBuf,
        command: String,
        fingerprint: Fingerprint,
    },
    InvocationStarted {
        id: HookInvocationId,
        started_at_ms: u64,
    },
    InvocationCompleted {
        id: HookInvocationId,
        status: InvocationStatus,
        exit_code: i32,
        ended_at_ms: u64,
        stdout_bytes: u64,
        stderr_bytes: u64,
    },

    CacheStored {
        entry: CacheEntry,
    },

    AttemptIncremented {
        key: String,
    },
    AttemptReset {
        key: String,
    },
    AttemptMaxRaised {
        key: String,
        delta: u32,
    },

    DeferredQueued {
        id: DeferredHookId,
        orchestration_id: OrchestrationId,
        plugin: String,
        hook_name: String,
        directory: PathBuf,
        command: String,
        queued_at_ms: u64,
    },
    DeferredResolved {
        id: DeferredHookId,
    },
    DeferredFailed {
        id: DeferredHookId,
        error: String,
    },

    SlotAcquired {
        directory: PathBuf,
        holder: HookInvocationId,
        acquired_at_ms: u64,
        deadline_ms: u64,
    },
    SlotReleased {
        directory: PathBuf,
        holder: HookInvocationId,
    },
    SlotExpired {
        directory: PathBuf,
        holder: HookInvocationId,
    },

    FailureTokenLatched {
        orchestration_id: OrchestrationId,
        first_failure_at_ms: u64,
        failed_invocation_id: HookInvocationId,
    },
    FailureTokenReaped {
        orchestration_id: OrchestrationId,
    },

    /// Control event: daemon shutdown was requested. Persisted so a replay
    /// after a crash mid-shutdown does not resurrect in-flight work, but
    /// skipped (not replayed as a mutation) by the engine loop.
    Shutdown,
}

impl Event {
    /// One-line summary for structured log fields, mirroring the teacher's
    /// `Event::log_summary` idiom.
    pub fn log_summary(&self) -> String {
        match self {
            Event::OrchestrationStarted { id, hook_event, .. } => {
                format!("orchestration_started({id}, {hook_event})")
            }
            Event::OrchestrationEnded { id, .. } => format!("orchestration_ended({id})"),
            Event::InvocationRecorded { id, plugin, hook_name, .. } => {
                format!("invocation_recorded({id}, {plugin}/{hook_name})")
            }
            Event::InvocationStarted { id, .. } => format!("invocation_started({id})"),
            Event::InvocationCompleted { id, status, exit_code, .. } => {
                format!("invocation_completed({id}, {status}, exit={exit_code})")
            }
            Event::CacheStored { entry } => format!("cache_stored({})", entry.fingerprint),
            Event::AttemptIncremented { key } => format!("attempt_incremented({key})"),
            Event::AttemptReset { key } => format!("attempt_reset({key})"),
            Event::AttemptMaxRaised { key, delta } => format!("attempt_max_raised({key}, +{delta})"),
            Event::DeferredQueued { id, .. } => format!("deferred_queued({id})"),
            Event::DeferredResolved { id } => format!("deferred_resolved({id})"),
            Event::DeferredFailed { id, .. } => format!("deferred_failed({id})"),
            Event::SlotAcquired { directory, holder, .. } => {
                format!("slot_acquired({}, {holder})", directory.display())
            }
            Event::SlotReleased { directory, holder } => {
                format!("slot_released({}, {holder})", directory.display())
            }
            Event::SlotExpired { directory, holder } => {
                format!("slot_expired({}, {holder})", directory.display())
            }
            Event::FailureTokenLatched { orchestration_id, .. } => {
                format!("failure_token_latched({orchestration_id})")
            }
            Event::FailureTokenReaped { orchestration_id } => {
                format!("failure_token_reaped({orchestration_id})")
            }
            Event::Shutdown => "shutdown".to_string(),
        }
    }
}
