// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Side effects the coordinator's decision logic wants performed (§4.5).
//!
//! Grounded on `crates/core/src/effect.rs`'s effect-as-data pattern: the
//! coordinator never touches a real process or the store directly, it
//! returns `Effect` values that a separate executor carries out. This is
//! what lets the decision logic be unit-tested without spawning anything.

use std::path::PathBuf;
use std::time::Duration;

use hce_core::{CacheEntry, Event, Fingerprint, HookInvocationId, OrchestrationId};

use crate::runner::HookSpec;

#[derive(Debug, Clone)]
pub enum Effect {
    /// Fold an already-decided fact into the store (mirrors the teacher's
    /// `Effect::Emit`).
    Emit { event: Event },
    CacheLookup { invocation_id: HookInvocationId, fingerprint: Fingerprint },
    CacheStore { entry: CacheEntry },
    SlotAcquire {
        invocation_id: HookInvocationId,
        directory: PathBuf,
        lease_ttl: Duration,
        wait_timeout: Duration,
    },
    SlotRelease { invocation_id: HookInvocationId, directory: PathBuf },
    Spawn { invocation_id: HookInvocationId, spec: HookSpec },
    CancelInvocation { invocation_id: HookInvocationId },
    RecordAttemptSuccess { key: String },
    RecordAttemptFailure { key: String },
    PublishFailureToken { orchestration_id: OrchestrationId, invocation_id: HookInvocationId },
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Emit { .. } => "emit",
            Effect::CacheLookup { .. } => "cache_lookup",
            Effect::CacheStore { .. } => "cache_store",
            Effect::SlotAcquire { .. } => "slot_acquire",
            Effect::SlotRelease { .. } => "slot_release",
            Effect::Spawn { .. } => "spawn",
            Effect::CancelInvocation { .. } => "cancel_invocation",
            Effect::RecordAttemptSuccess { .. } => "record_attempt_success",
            Effect::RecordAttemptFailure { .. } => "record_attempt_failure",
            Effect::PublishFailureToken { .. } => "publish_failure_token",
        }
    }

    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Effect::Emit { event } => vec![("event", event.log_summary())],
            Effect::CacheLookup { invocation_id, fingerprint } => {
                vec![("invocation_id", invocation_id.to_string()), ("fingerprint", fingerprint.to_string())]
            }
            Effect::CacheStore { entry } => vec![("fingerprint", entry.fingerprint.to_string())],
            Effect::SlotAcquire { invocation_id, directory, .. } => {
                vec![("invocation_id", invocation_id.to_string()), ("directory", directory.display().to_string())]
            }
            Effect::SlotRelease { invocation_id, directory } => {
                vec![("invocation_id", invocation_id.to_string()), ("directory", directory.display().to_string())]
            }
            Effect::Spawn { invocation_id, spec } => {
                vec![("invocation_id", invocation_id.to_string()), ("command", spec.command.clone())]
            }
            Effect::CancelInvocation { invocation_id } => vec![("invocation_id", invocation_id.to_string())],
            Effect::RecordAttemptSuccess { key } | Effect::RecordAttemptFailure { key } => {
                vec![("key", key.clone())]
            }
            Effect::PublishFailureToken { orchestration_id, invocation_id } => vec![
                ("orchestration_id", orchestration_id.to_string()),
                ("invocation_id", invocation_id.to_string()),
            ],
        }
    }
}
