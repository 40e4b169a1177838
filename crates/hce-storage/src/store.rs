// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Store`: the single shared-mutable-state facade described in §4.1.
//!
//! Every mutation is appended to the WAL before it is folded into
//! [`MaterializedState`], so a crash between the two never loses a
//! committed write — on reopen, `Store::open` replays everything after the
//! last snapshot's `seq`. Row-level atomicity comes from holding the whole
//! state behind one `parking_lot::Mutex`; contention is not a concern here
//! because every operation is in-memory plus a buffered file append, never
//! a blocking network call.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use hce_core::{
    attempt_key, AttemptCounter, CacheEntry, DeferredHook, DeferredHookId, DeferredStatus, Event,
    FailureToken, Fingerprint, HookEvent, HookInvocation, HookInvocationId, InvocationStatus,
    Orchestration, OrchestrationId, SlotAcquireResult, SlotLease, SlotReleaseResult,
};
use parking_lot::Mutex;
use thiserror::Error;

use crate::migration::MigrationRegistry;
use crate::snapshot::Snapshot;
use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("wal error: {0}")]
    Wal(#[from] WalError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] crate::snapshot::SnapshotError),
    #[error("invocation {0}:{1}/{2} already has a non-terminal row for this orchestration")]
    Conflict(OrchestrationId, String, String),
}

struct Inner {
    wal: Wal,
    state: MaterializedState,
    snapshot_path: PathBuf,
}

/// Event-sourced durable store for every entity in the daemon's domain
/// model. Cheaply cloneable (`Arc`-free clones share the same lock) so
/// every connection task and background sweep can hold a handle.
#[derive(Clone)]
pub struct Store {
    inner: std::sync::Arc<Mutex<Inner>>,
}

impl Store {
    /// Opens the store at `wal_path`/`snapshot_path`, loading the snapshot
    /// (if any) and replaying WAL entries after its `seq`. Any invocation
    /// left `Running` after replay belongs to a process that no longer
    /// exists; it is marked `Killed` with exit code 130, matching the
    /// crash-recovery contract in §4.1.
    pub fn open(wal_path: &Path, snapshot_path: &Path) -> Result<Self, StoreError> {
        let registry = MigrationRegistry::new();
        let snapshot = Snapshot::load(snapshot_path, &registry)?;
        let (mut state, processed_seq) = match snapshot {
            Some(s) => (s.state, s.seq),
            None => (MaterializedState::default(), 0),
        };

        let mut wal = Wal::open(wal_path, processed_seq)?;
        while let Some(entry) = wal.next_unprocessed()? {
            if !matches!(entry.event, Event::Shutdown) {
                state.apply_event(&entry.event);
            }
            wal.mark_processed(entry.seq);
        }

        let orphaned: Vec<HookInvocationId> = state
            .invocations
            .values()
            .filter(|inv| inv.status == InvocationStatus::Running)
            .map(|inv| inv.id)
            .collect();
        for id in orphaned {
            if let Some(inv) = state.invocations.get_mut(&id) {
                inv.complete(InvocationStatus::Killed, 130, now_ms());
            }
        }

        for lease in state.slot_leases.values().cloned().collect::<Vec<_>>() {
            if lease.is_expired(now_ms()) {
                state.slot_leases.remove(&lease.directory);
            }
        }

        Ok(Self {
            inner: std::sync::Arc::new(Mutex::new(Inner { wal, state, snapshot_path: snapshot_path.to_path_buf() })),
        })
    }

    fn append(&self, inner: &mut Inner, event: Event) -> Result<(), StoreError> {
        inner.wal.append(&event)?;
        inner.state.apply_event(&event);
        if inner.wal.needs_flush() {
            inner.wal.flush()?;
        }
        Ok(())
    }

    pub fn start_orchestration(
        &self,
        session_id: Option<String>,
        hook_event: HookEvent,
        project_root: PathBuf,
    ) -> Result<OrchestrationId, StoreError> {
        let id = OrchestrationId::new();
        let mut inner = self.inner.lock();
        self.append(
            &mut inner,
            Event::OrchestrationStarted { id, session_id, hook_event, project_root, started_at_ms: now_ms() },
        )?;
        Ok(id)
    }

    pub fn end_orchestration(&self, id: OrchestrationId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        self.append(&mut inner, Event::OrchestrationEnded { id, ended_at_ms: now_ms() })?;
        self.append(&mut inner, Event::FailureTokenReaped { orchestration_id: id })?;
        Ok(())
    }

    pub fn get_orchestration(&self, id: OrchestrationId) -> Option<Orchestration> {
        self.inner.lock().state.orchestrations.get(&id).cloned()
    }

    /// Snapshot of the whole materialized state, for read-only reporting
    /// (status/query endpoints) that would otherwise need a method per
    /// table.
    pub fn snapshot_state(&self) -> MaterializedState {
        self.inner.lock().state.clone()
    }

    /// Atomic insert; fails with [`StoreError::Conflict`] if this
    /// `(orchestrationId, plugin, hookName, directory)` already has a
    /// non-terminal row — the idempotency guard against duplicate retries
    /// of the same request.
    pub fn record_invocation(
        &self,
        orchestration_id: OrchestrationId,
        plugin: String,
        hook_name: String,
        directory: PathBuf,
        command: String,
        fingerprint: Fingerprint,
    ) -> Result<HookInvocationId, StoreError> {
        let mut inner = self.inner.lock();
        let dedup_key = format!("{orchestration_id}:{plugin}:{hook_name}:{}", directory.display());
        let conflict = inner.state.invocations.values().any(|inv| {
            !inv.status.is_terminal() && inv.dedup_key() == dedup_key
        });
        if conflict {
            return Err(StoreError::Conflict(orchestration_id, plugin, hook_name));
        }

        let id = HookInvocationId::new();
        self.append(
            &mut inner,
            Event::InvocationRecorded { id, orchestration_id, plugin, hook_name, directory, command, fingerprint },
        )?;
        Ok(id)
    }

    pub fn start_invocation(&self, id: HookInvocationId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        self.append(&mut inner, Event::InvocationStarted { id, started_at_ms: now_ms() })
    }

    pub fn complete_invocation(
        &self,
        id: HookInvocationId,
        status: InvocationStatus,
        exit_code: i32,
        stdout_bytes: u64,
        stderr_bytes: u64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        self.append(
            &mut inner,
            Event::InvocationCompleted { id, status, exit_code, ended_at_ms: now_ms(), stdout_bytes, stderr_bytes },
        )
    }

    pub fn get_invocation(&self, id: HookInvocationId) -> Option<HookInvocation> {
        self.inner.lock().state.invocations.get(&id).cloned()
    }

    pub fn cache_lookup(&self, fingerprint: Fingerprint) -> Option<CacheEntry> {
        self.inner.lock().state.cache_entries.get(&fingerprint).cloned()
    }

    /// Last-writer-wins on fingerprint collision.
    pub fn cache_store(&self, entry: CacheEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        self.append(&mut inner, Event::CacheStored { entry })
    }

    pub fn attempts_get_or_create(
        &self,
        session_or_project: &str,
        plugin: &str,
        hook_name: &str,
        directory: &Path,
    ) -> AttemptCounter {
        let key = attempt_key(session_or_project, plugin, hook_name, directory);
        self.inner.lock().state.attempt_counters.get(&key).copied().unwrap_or_default()
    }

    pub fn attempts_increment(&self, key: String) -> Result<AttemptCounter, StoreError> {
        let mut inner = self.inner.lock();
        self.append(&mut inner, Event::AttemptIncremented { key: key.clone() })?;
        Ok(inner.state.attempt_counters[&key])
    }

    pub fn attempts_reset(&self, key: String) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        self.append(&mut inner, Event::AttemptReset { key })
    }

    pub fn attempts_raise_max(&self, key: String, delta: u32) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        self.append(&mut inner, Event::AttemptMaxRaised { key, delta })
    }

    pub fn deferred_queue(
        &self,
        orchestration_id: OrchestrationId,
        plugin: String,
        hook_name: String,
        directory: PathBuf,
        command: String,
    ) -> Result<DeferredHookId, StoreError> {
        let mut inner = self.inner.lock();
        let id = DeferredHookId::new();
        self.append(
            &mut inner,
            Event::DeferredQueued { id, orchestration_id, plugin, hook_name, directory, command, queued_at_ms: now_ms() },
        )?;
        Ok(id)
    }

    pub fn deferred_complete(&self, id: DeferredHookId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        self.append(&mut inner, Event::DeferredResolved { id })
    }

    pub fn deferred_fail(&self, id: DeferredHookId, error: String) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        self.append(&mut inner, Event::DeferredFailed { id, error })
    }

    /// Only rows in `{pending, running, failed}` for the given session or
    /// project scope — a resolved hook is tombstoned, not merely
    /// transitioned, so it never reappears here.
    pub fn deferred_list(&self, orchestration_id: OrchestrationId) -> Vec<DeferredHook> {
        self.inner
            .lock()
            .state
            .deferred_hooks
            .values()
            .filter(|h| h.orchestration_id == orchestration_id && h.is_open() && DeferredStatus::OPEN.contains(&h.status))
            .cloned()
            .collect()
    }

    /// Non-blocking acquire; the caller (SlotManager) is responsible for
    /// the cooperative wait/retry loop when this returns `Busy`.
    pub fn slot_try_acquire(&self, directory: PathBuf, holder: HookInvocationId, ttl: Duration) -> Result<SlotAcquireResult, StoreError> {
        let mut inner = self.inner.lock();
        let now = now_ms();

        if let Some(existing) = inner.state.slot_leases.get(&directory) {
            if !existing.is_expired(now) {
                return Ok(SlotAcquireResult::Busy { holder: existing.holder, eta_ms: existing.deadline_ms });
            }
        }

        let deadline_ms = now + ttl.as_millis() as u64;
        self.append(
            &mut inner,
            Event::SlotAcquired { directory: directory.clone(), holder, acquired_at_ms: now, deadline_ms },
        )?;
        Ok(SlotAcquireResult::Granted(SlotLease::new(directory, holder, now, deadline_ms)))
    }

    /// A release past the lease's deadline is a no-op that reports
    /// `Expired` rather than erroring — the sweep already reclaimed it.
    pub fn slot_release(&self, directory: PathBuf, holder: HookInvocationId) -> Result<SlotReleaseResult, StoreError> {
        let mut inner = self.inner.lock();
        match inner.state.slot_leases.get(&directory) {
            Some(lease) if lease.holder == holder && !lease.is_expired(now_ms()) => {
                self.append(&mut inner, Event::SlotReleased { directory, holder })?;
                Ok(SlotReleaseResult::Released)
            }
            _ => Ok(SlotReleaseResult::Expired),
        }
    }

    /// Reclaims every lease whose deadline has passed, relative to `now_ms`.
    pub fn slot_expire_sweep(&self, now_ms: u64) -> Result<Vec<PathBuf>, StoreError> {
        let mut inner = self.inner.lock();
        let expired: Vec<(PathBuf, HookInvocationId)> = inner
            .state
            .slot_leases
            .values()
            .filter(|lease| lease.is_expired(now_ms))
            .map(|lease| (lease.directory.clone(), lease.holder))
            .collect();

        for (directory, holder) in &expired {
            self.append(&mut inner, Event::SlotExpired { directory: directory.clone(), holder: *holder })?;
        }
        Ok(expired.into_iter().map(|(dir, _)| dir).collect())
    }

    /// Every lease currently held, expired or not — the caller decides what
    /// "active" means (§6 `ListLeases`).
    pub fn list_leases(&self) -> Vec<SlotLease> {
        self.inner.lock().state.slot_leases.values().cloned().collect()
    }

    /// First-writer-wins latch (§4.7).
    pub fn failure_latch(&self, orchestration_id: OrchestrationId, failed_invocation_id: HookInvocationId) -> Result<FailureToken, StoreError> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.state.failure_tokens.get(&orchestration_id) {
            return Ok(existing.clone());
        }
        self.append(
            &mut inner,
            Event::FailureTokenLatched { orchestration_id, first_failure_at_ms: now_ms(), failed_invocation_id },
        )?;
        Ok(inner.state.failure_tokens[&orchestration_id].clone())
    }

    pub fn failure_observe(&self, orchestration_id: OrchestrationId) -> Option<FailureToken> {
        self.inner.lock().state.failure_tokens.get(&orchestration_id).cloned()
    }

    /// Writes a snapshot of the current state and truncates the WAL up to
    /// the snapshotted sequence. Called on a timer and on graceful
    /// shutdown.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.wal.flush()?;
        let seq = inner.wal.write_seq();
        let snapshot = Snapshot::new(seq, inner.state.clone(), Utc::now());
        snapshot.save(&inner.snapshot_path)?;
        inner.wal.truncate_before(seq + 1)?;
        Ok(())
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store(dir: &Path) -> Store {
        Store::open(&dir.join("events.wal"), &dir.join("snapshot.json")).unwrap()
    }

    #[test]
    fn record_invocation_rejects_duplicate_while_non_terminal() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let orch = store.start_orchestration(None, HookEvent::PreToolUse, "/repo".into()).unwrap();

        store
            .record_invocation(orch, "lint".into(), "check".into(), "/repo".into(), "echo ok".into(), Fingerprint::from_segments([b"a".as_slice()]))
            .unwrap();

        let result = store.record_invocation(
            orch,
            "lint".into(),
            "check".into(),
            "/repo".into(),
            "echo ok".into(),
            Fingerprint::from_segments([b"b".as_slice()]),
        );
        assert!(matches!(result, Err(StoreError::Conflict(..))));
    }

    #[test]
    fn slot_try_acquire_is_exclusive_until_release() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let holder_a = HookInvocationId::new();
        let holder_b = HookInvocationId::new();
        let directory: PathBuf = "/repo".into();

        let first = store.slot_try_acquire(directory.clone(), holder_a, Duration::from_secs(60)).unwrap();
        assert!(matches!(first, SlotAcquireResult::Granted(_)));

        let second = store.slot_try_acquire(directory.clone(), holder_b, Duration::from_secs(60)).unwrap();
        assert!(matches!(second, SlotAcquireResult::Busy { .. }));

        assert_eq!(store.slot_release(directory.clone(), holder_a).unwrap(), SlotReleaseResult::Released);

        let third = store.slot_try_acquire(directory, holder_b, Duration::from_secs(60)).unwrap();
        assert!(matches!(third, SlotAcquireResult::Granted(_)));
    }

    #[test]
    fn failure_latch_keeps_first_writer() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let orch = store.start_orchestration(None, HookEvent::Stop, "/repo".into()).unwrap();
        let inv_a = HookInvocationId::new();
        let inv_b = HookInvocationId::new();

        let first = store.failure_latch(orch, inv_a).unwrap();
        let second = store.failure_latch(orch, inv_b).unwrap();
        assert_eq!(first.failed_invocation_id, inv_a);
        assert_eq!(second.failed_invocation_id, inv_a);
    }

    #[test]
    fn checkpoint_then_reopen_preserves_state() {
        let dir = tempdir().unwrap();
        let orch = {
            let store = open_store(dir.path());
            let orch = store.start_orchestration(None, HookEvent::PreToolUse, "/repo".into()).unwrap();
            store.checkpoint().unwrap();
            orch
        };

        let store = open_store(dir.path());
        assert!(store.get_orchestration(orch).is_some());
    }

    #[test]
    fn reopen_marks_orphaned_running_invocations_killed() {
        let dir = tempdir().unwrap();
        let (orch_id, inv_id) = {
            let store = open_store(dir.path());
            let orch = store.start_orchestration(None, HookEvent::PreToolUse, "/repo".into()).unwrap();
            let inv = store
                .record_invocation(orch, "lint".into(), "check".into(), "/repo".into(), "echo ok".into(), Fingerprint::from_segments([b"a".as_slice()]))
                .unwrap();
            store.start_invocation(inv).unwrap();
            (orch, inv)
        };
        let _ = orch_id;

        let store = open_store(dir.path());
        let inv = store.get_invocation(inv_id).unwrap();
        assert_eq!(inv.status, InvocationStatus::Killed);
        assert_eq!(inv.exit_code, Some(130));
    }
}
