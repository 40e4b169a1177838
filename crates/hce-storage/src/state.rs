// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory entity tables folded from the WAL, plus the snapshot's `state`
//! payload (see [`crate::snapshot::Snapshot`]).
//!
//! `apply_event` is the single place that turns an [`Event`] into a mutation
//! — every other component reads these tables but never writes them
//! directly, so replaying the WAL from scratch always reaches the same
//! state as the live daemon. Entities are rebuilt via struct literals here,
//! not their `new()` constructors, because `new()` mints a fresh random ID;
//! replay must preserve the ID recorded in the event.

use std::collections::HashMap;
use std::path::PathBuf;

use hce_core::{
    AttemptCounter, CacheEntry, DeferredHook, DeferredHookId, DeferredStatus, Event, FailureToken,
    Fingerprint, HookInvocation, HookInvocationId, InvocationStatus, Orchestration, OrchestrationId,
    SlotLease,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializedState {
    pub orchestrations: HashMap<OrchestrationId, Orchestration>,
    pub invocations: HashMap<HookInvocationId, HookInvocation>,
    pub attempt_counters: HashMap<String, AttemptCounter>,
    pub deferred_hooks: HashMap<DeferredHookId, DeferredHook>,
    pub cache_entries: HashMap<Fingerprint, CacheEntry>,
    /// Keyed by the canonicalized directory path; at most one holder at a
    /// time (§4.3 exclusivity invariant).
    pub slot_leases: HashMap<PathBuf, SlotLease>,
    pub failure_tokens: HashMap<OrchestrationId, FailureToken>,
}

impl MaterializedState {
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::OrchestrationStarted { id, session_id, hook_event, project_root, started_at_ms } => {
                self.orchestrations.insert(
                    *id,
                    Orchestration {
                        id: *id,
                        session_id: session_id.clone(),
                        hook_event: *hook_event,
                        project_root: project_root.clone(),
                        started_at_ms: *started_at_ms,
                        ended_at_ms: None,
                        worst_exit_code: 0,
                    },
                );
            }
            Event::OrchestrationEnded { id, ended_at_ms } => {
                if let Some(orch) = self.orchestrations.get_mut(id) {
                    orch.end(*ended_at_ms);
                }
            }

            Event::InvocationRecorded { id, orchestration_id, plugin, hook_name, directory, command, fingerprint } => {
                self.invocations.insert(
                    *id,
                    HookInvocation {
                        id: *id,
                        orchestration_id: *orchestration_id,
                        plugin: plugin.clone(),
                        hook_name: hook_name.clone(),
                        directory: directory.clone(),
                        command: command.clone(),
                        status: InvocationStatus::Pending,
                        exit_code: None,
                        started_at_ms: None,
                        ended_at_ms: None,
                        duration_ms: None,
                        stdout_bytes: 0,
                        stderr_bytes: 0,
                        fingerprint: *fingerprint,
                    },
                );
            }
            Event::InvocationStarted { id, started_at_ms } => {
                if let Some(inv) = self.invocations.get_mut(id) {
                    inv.start(*started_at_ms);
                }
            }
            Event::InvocationCompleted { id, status, exit_code, ended_at_ms, stdout_bytes, stderr_bytes } => {
                let orchestration_id = self.invocations.get(id).map(|inv| inv.orchestration_id);
                if let Some(inv) = self.invocations.get_mut(id) {
                    inv.complete(*status, *exit_code, *ended_at_ms);
                    inv.stdout_bytes = *stdout_bytes;
                    inv.stderr_bytes = *stderr_bytes;
                }
                // A `Killed` invocation was cancelled (fail-fast sibling, or a
                // crash-orphaned run reconciled at startup) rather than
                // exiting on its own — its 130 is the cancel signal's code,
                // not the hook's, and must not inflate worst_exit_code
                // (§4.5, §8 scenario S5).
                if *status != InvocationStatus::Killed {
                    if let Some(orch) = orchestration_id.and_then(|oid| self.orchestrations.get_mut(&oid)) {
                        orch.observe_exit_code(*exit_code);
                    }
                }
            }

            Event::CacheStored { entry } => {
                self.cache_entries.insert(entry.fingerprint, entry.clone());
            }

            Event::AttemptIncremented { key } => {
                self.attempt_counters.entry(key.clone()).or_default().record_failure();
            }
            Event::AttemptReset { key } => {
                self.attempt_counters.entry(key.clone()).or_default().record_success();
            }
            Event::AttemptMaxRaised { key, delta } => {
                self.attempt_counters.entry(key.clone()).or_default().raise_max(*delta);
            }

            Event::DeferredQueued { id, orchestration_id, plugin, hook_name, directory, command, queued_at_ms } => {
                self.deferred_hooks.insert(
                    *id,
                    DeferredHook {
                        id: *id,
                        orchestration_id: *orchestration_id,
                        plugin: plugin.clone(),
                        hook_name: hook_name.clone(),
                        directory: directory.clone(),
                        command: command.clone(),
                        status: DeferredStatus::Pending,
                        queued_at_ms: *queued_at_ms,
                        last_error: None,
                        resolved: false,
                    },
                );
            }
            Event::DeferredResolved { id } => {
                if let Some(hook) = self.deferred_hooks.get_mut(id) {
                    hook.resolve();
                }
            }
            Event::DeferredFailed { id, error } => {
                if let Some(hook) = self.deferred_hooks.get_mut(id) {
                    hook.fail(error.clone());
                }
            }

            Event::SlotAcquired { directory, holder, acquired_at_ms, deadline_ms } => {
                self.slot_leases.insert(
                    directory.clone(),
                    SlotLease::new(directory.clone(), *holder, *acquired_at_ms, *deadline_ms),
                );
            }
            Event::SlotReleased { directory, .. } | Event::SlotExpired { directory, .. } => {
                self.slot_leases.remove(directory);
            }

            Event::FailureTokenLatched { orchestration_id, first_failure_at_ms, failed_invocation_id } => {
                self.failure_tokens
                    .entry(*orchestration_id)
                    .or_insert_with(|| FailureToken::new(*orchestration_id, *first_failure_at_ms, *failed_invocation_id));
            }
            Event::FailureTokenReaped { orchestration_id } => {
                self.failure_tokens.remove(orchestration_id);
            }

            Event::Shutdown => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hce_core::HookEvent;

    #[test]
    fn apply_event_is_idempotent_for_replays_of_the_same_seq() {
        let mut state = MaterializedState::default();
        let id = OrchestrationId::new();
        let event = Event::OrchestrationStarted {
            id,
            session_id: None,
            hook_event: HookEvent::Stop,
            project_root: "/repo".into(),
            started_at_ms: 10,
        };
        state.apply_event(&event);
        state.apply_event(&event);
        assert_eq!(state.orchestrations.len(), 1);
        assert_eq!(state.orchestrations[&id].started_at_ms, 10);
    }

    #[test]
    fn failure_token_latch_keeps_first_writer() {
        let mut state = MaterializedState::default();
        let orch_id = OrchestrationId::new();
        let inv_a = HookInvocationId::new();
        let inv_b = HookInvocationId::new();

        state.apply_event(&Event::FailureTokenLatched {
            orchestration_id: orch_id,
            first_failure_at_ms: 100,
            failed_invocation_id: inv_a,
        });
        state.apply_event(&Event::FailureTokenLatched {
            orchestration_id: orch_id,
            first_failure_at_ms: 200,
            failed_invocation_id: inv_b,
        });

        let token = &state.failure_tokens[&orch_id];
        assert_eq!(token.first_failure_at_ms, 100);
        assert_eq!(token.failed_invocation_id, inv_a);
    }

    #[test]
    fn slot_release_and_expire_both_clear_the_lease() {
        let mut state = MaterializedState::default();
        let dir = PathBuf::from("/repo");
        let holder = HookInvocationId::new();
        state.apply_event(&Event::SlotAcquired {
            directory: dir.clone(),
            holder,
            acquired_at_ms: 0,
            deadline_ms: 1000,
        });
        assert!(state.slot_leases.contains_key(&dir));

        state.apply_event(&Event::SlotReleased { directory: dir.clone(), holder });
        assert!(!state.slot_leases.contains_key(&dir));
    }
}
