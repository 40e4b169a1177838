// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The central state machine driving one hook invocation from acceptance
//! through fingerprinting, cache lookup, slot acquisition, execution and
//! completion (§4.5).
//!
//! Mutating side effects ([`Effect::CacheStore`], the attempt-counter and
//! failure-token updates) are expressed as data and carried out by
//! [`Executor`], keeping the terminal bookkeeping unit-testable against a
//! fake store. The streaming/blocking steps (cache lookup, slot acquire,
//! spawn) are driven directly since their result shapes don't fit the
//! uniform `Result<Option<Event>, _>` an executed effect returns.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hce_core::{
    attempt_key, CacheEntry, Clock, Event, Fingerprint, HookInvocationId, InvocationStatus,
    OrchestrationId,
};
use hce_storage::{Store, StoreError};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::effect::Effect;
use crate::failure_bus::FailureBus;
use crate::runner::{self, Frame, HookSpec};
use crate::slot_manager::{SlotManager, SlotManagerError};

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Carries out the mutating [`Effect`]s a dispatch decided on.
#[derive(Clone)]
pub struct Executor {
    store: Store,
    failure_bus: Arc<FailureBus>,
}

impl Executor {
    pub fn new(store: Store, failure_bus: Arc<FailureBus>) -> Self {
        Self { store, failure_bus }
    }

    pub async fn execute(&self, effect: Effect) -> Result<Option<Event>, ExecuteError> {
        let fields: String =
            effect.fields().iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(" ");
        tracing::debug!(effect = effect.name(), %fields, "executing effect");

        match effect {
            Effect::Emit { event } => Ok(Some(event)),
            Effect::CacheStore { entry } => {
                self.store.cache_store(entry)?;
                Ok(None)
            }
            Effect::RecordAttemptSuccess { key } => {
                self.store.attempts_reset(key)?;
                Ok(None)
            }
            Effect::RecordAttemptFailure { key } => {
                self.store.attempts_increment(key)?;
                Ok(None)
            }
            Effect::PublishFailureToken { orchestration_id, invocation_id } => {
                self.failure_bus.latch(orchestration_id, invocation_id)?;
                Ok(None)
            }
            Effect::SlotRelease { directory, invocation_id } => {
                self.store.slot_release(directory, invocation_id)?;
                Ok(None)
            }
            // CacheLookup, SlotAcquire, Spawn and CancelInvocation need more
            // than a fire-and-forget result and are driven directly by the
            // coordinator instead of through this uniform dispatch.
            Effect::CacheLookup { .. }
            | Effect::SlotAcquire { .. }
            | Effect::Spawn { .. }
            | Effect::CancelInvocation { .. } => Ok(None),
        }
    }
}

/// The identity an attempt counter is keyed by (§3), kept apart so the
/// completion path can both build the key and re-read the counter after
/// recording a failure.
#[derive(Debug, Clone)]
pub struct AttemptIdentity {
    pub session_or_project: String,
    pub plugin: String,
    pub hook_name: String,
    pub directory: PathBuf,
}

impl AttemptIdentity {
    fn key(&self) -> String {
        attempt_key(&self.session_or_project, &self.plugin, &self.hook_name, &self.directory)
    }
}

#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub orchestration_id: OrchestrationId,
    pub plugin: String,
    pub hook_name: String,
    pub directory: PathBuf,
    pub command: String,
    pub env: HashMap<String, String>,
    pub env_whitelist: Vec<String>,
    pub idle_timeout: Duration,
    pub wall_timeout: Duration,
    pub slot_wait_timeout: Duration,
    pub stdin_payload: Option<Vec<u8>>,
    pub fingerprint: Fingerprint,
    pub deferrable: bool,
    pub session_or_project: String,
}

struct InFlight {
    sender: broadcast::Sender<Frame>,
}

type InFlightMap = Arc<Mutex<HashMap<Fingerprint, InFlight>>>;

pub struct Coordinator<C: Clock> {
    store: Store,
    slots: Arc<SlotManager<C>>,
    failure_bus: Arc<FailureBus>,
    in_flight: InFlightMap,
}

impl<C: Clock + 'static> Coordinator<C> {
    pub fn new(store: Store, slots: Arc<SlotManager<C>>) -> Self {
        let failure_bus = FailureBus::new(store.clone());
        Self { store, slots, failure_bus, in_flight: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Runs every hook in `requests` concurrently under one orchestration.
    /// When `fail_fast`, every sibling is cooperatively cancelled (then hard
    /// killed after grace, via the runner's own escalation) as soon as any
    /// one of them latches the orchestration's `FailureToken` (§4.5 fan-out
    /// group, §8 scenario S5). The group's exit code is the worst
    /// (maximum) child exit code, with a killed-by-failure-token sibling
    /// keeping the exit code its own run actually produced before being
    /// asked to cancel would have been in progress — here, the `130`
    /// cooperative-cancel code the runner already reports for that path.
    pub async fn dispatch_group(
        &self,
        orchestration_id: OrchestrationId,
        requests: Vec<DispatchRequest>,
        fail_fast: bool,
    ) -> Result<Vec<(HookInvocationId, mpsc::Receiver<Frame>)>, ExecuteError> {
        let mut out = Vec::with_capacity(requests.len());
        for request in requests {
            let cancel = CancellationToken::new();
            if fail_fast {
                let sibling_cancel = cancel.clone();
                let mut watch = self.failure_bus.watch(orchestration_id);
                tokio::spawn(async move {
                    if watch.borrow().is_some() {
                        sibling_cancel.cancel();
                        return;
                    }
                    if watch.changed().await.is_ok() {
                        sibling_cancel.cancel();
                    }
                });
            }
            out.push(self.dispatch(request, cancel).await?);
        }
        Ok(out)
    }

    /// Runs one hook invocation to completion, streaming frames to the
    /// returned channel. Identical concurrent requests (same fingerprint,
    /// no cache entry yet) attach to the first caller's stream instead of
    /// spawning again (§4.5 deduplication, §8 property 2).
    pub async fn dispatch(
        &self,
        request: DispatchRequest,
        cancel: CancellationToken,
    ) -> Result<(HookInvocationId, mpsc::Receiver<Frame>), ExecuteError> {
        let invocation_id = self.store.record_invocation(
            request.orchestration_id,
            request.plugin.clone(),
            request.hook_name.clone(),
            request.directory.clone(),
            request.command.clone(),
            request.fingerprint,
        )?;

        if let Some(entry) = self.store.cache_lookup(request.fingerprint) {
            return Ok((invocation_id, self.serve_from_cache(invocation_id, entry)));
        }

        if let Some(sub) = self.subscribe_in_flight(&request.fingerprint) {
            return Ok((invocation_id, self.follow_in_flight(invocation_id, sub)));
        }

        self.spawn_and_own(invocation_id, request, cancel).await
    }

    fn serve_from_cache(
        &self,
        invocation_id: HookInvocationId,
        entry: CacheEntry,
    ) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(4);
        let store = self.store.clone();
        tokio::spawn(async move {
            let _ = store.start_invocation(invocation_id);
            if !entry.stdout_ref.is_empty() {
                for line in entry.stdout_ref.split('\n') {
                    let _ = tx.send(Frame::StdoutLine(line.to_string())).await;
                }
            }
            if !entry.stderr_ref.is_empty() {
                for line in entry.stderr_ref.split('\n') {
                    let _ = tx.send(Frame::StderrLine(line.to_string())).await;
                }
            }
            let _ = store.complete_invocation(invocation_id, InvocationStatus::Cached, entry.exit_code, 0, 0);
            let _ = tx
                .send(Frame::Complete { exit_code: entry.exit_code, duration_ms: 0, error: None })
                .await;
        });
        rx
    }

    fn follow_in_flight(
        &self,
        invocation_id: HookInvocationId,
        mut sub: broadcast::Receiver<Frame>,
    ) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(64);
        let store = self.store.clone();
        tokio::spawn(async move {
            let _ = store.start_invocation(invocation_id);
            while let Ok(frame) = sub.recv().await {
                let terminal = matches!(frame, Frame::Complete { .. });
                if tx.send(frame.clone()).await.is_err() {
                    return;
                }
                if terminal {
                    if let Frame::Complete { exit_code, .. } = frame {
                        let status =
                            if exit_code == 0 { InvocationStatus::Succeeded } else { InvocationStatus::Failed };
                        let _ = store.complete_invocation(invocation_id, status, exit_code, 0, 0);
                    }
                    return;
                }
            }
        });
        rx
    }

    async fn spawn_and_own(
        &self,
        invocation_id: HookInvocationId,
        request: DispatchRequest,
        cancel: CancellationToken,
    ) -> Result<(HookInvocationId, mpsc::Receiver<Frame>), ExecuteError> {
        let (broadcast_tx, _) = broadcast::channel(256);
        self.in_flight.lock().insert(request.fingerprint, InFlight { sender: broadcast_tx.clone() });

        let (out_tx, out_rx) = mpsc::channel(64);
        let fingerprint = request.fingerprint;
        let directory = request.directory.clone();

        let lease = match self
            .slots
            .acquire(
                directory.clone(),
                invocation_id,
                request.idle_timeout + request.wall_timeout,
                request.slot_wait_timeout,
            )
            .await
        {
            Ok(lease) => lease,
            Err(SlotManagerError::WaitTimeout(_)) => {
                let _ = self.store.start_invocation(invocation_id);
                let _ = self.store.complete_invocation(invocation_id, InvocationStatus::Failed, 124, 0, 0);
                self.in_flight.lock().remove(&fingerprint);
                let complete =
                    Frame::Complete { exit_code: 124, duration_ms: 0, error: Some("slot_wait_timeout".to_string()) };
                let _ = broadcast_tx.send(complete.clone());
                let _ = out_tx.send(complete).await;
                return Ok((invocation_id, out_rx));
            }
            Err(SlotManagerError::Store(e)) => return Err(e.into()),
        };

        let _ = self.store.start_invocation(invocation_id);

        let spec = HookSpec {
            command: request.command.clone(),
            working_dir: request.directory.clone(),
            env: request.env.clone(),
            env_whitelist: request.env_whitelist.clone(),
            idle_timeout: request.idle_timeout,
            wall_timeout: request.wall_timeout,
            stdin_payload: request.stdin_payload.clone(),
        };
        let cancel_check = cancel.clone();
        let mut frames = runner::spawn_cancelable(spec, cancel);

        let executor = Executor::new(self.store.clone(), self.failure_bus.clone());
        let store = self.store.clone();
        let slots = self.slots.clone();
        let in_flight = self.in_flight.clone();
        let identity = AttemptIdentity {
            session_or_project: request.session_or_project.clone(),
            plugin: request.plugin.clone(),
            hook_name: request.hook_name.clone(),
            directory: request.directory.clone(),
        };
        let deferrable = request.deferrable;
        let orchestration_id = request.orchestration_id;
        let holder = lease.holder;

        let command = request.command.clone();

        tokio::spawn(async move {
            let mut stdout_lines = Vec::new();
            let mut stderr_lines = Vec::new();

            while let Some(frame) = frames.recv().await {
                match &frame {
                    Frame::StdoutLine(line) => stdout_lines.push(line.clone()),
                    Frame::StderrLine(line) => stderr_lines.push(line.clone()),
                    Frame::Complete { .. } => {}
                }

                let _ = broadcast_tx.send(frame.clone());
                let terminal = matches!(frame, Frame::Complete { .. });
                if out_tx.send(frame.clone()).await.is_err() && !terminal {
                    continue;
                }
                if let Frame::Complete { exit_code, .. } = frame {
                    finish_invocation(
                        &executor,
                        &store,
                        invocation_id,
                        orchestration_id,
                        exit_code,
                        fingerprint,
                        &identity,
                        deferrable,
                        &command,
                        stdout_lines.join("\n"),
                        stderr_lines.join("\n"),
                        cancel_check.is_cancelled(),
                    )
                    .await;
                    let _ = slots.release(directory.clone(), holder);
                    in_flight.lock().remove(&fingerprint);
                    break;
                }
            }
        });

        Ok((invocation_id, out_rx))
    }

    fn subscribe_in_flight(&self, fingerprint: &Fingerprint) -> Option<broadcast::Receiver<Frame>> {
        self.in_flight.lock().get(fingerprint).map(|entry| entry.sender.subscribe())
    }
}

/// Applies the post-run bookkeeping described in §4.5: attempt counter,
/// cache store on success, deferral/failure-token publish on failure, then
/// the terminal invocation status itself.
///
/// `killed_by_cancel` distinguishes a fail-fast sibling the `Coordinator`
/// itself asked to stop from a hook that genuinely exited non-zero: the
/// former never ran to its own conclusion, so it skips attempt tracking and
/// failure-token publication and is recorded as `Killed` rather than
/// `Failed` so its exit code doesn't inflate `worst_exit_code` (§4.5, S5).
#[allow(clippy::too_many_arguments)]
async fn finish_invocation(
    executor: &Executor,
    store: &Store,
    invocation_id: HookInvocationId,
    orchestration_id: OrchestrationId,
    exit_code: i32,
    fingerprint: Fingerprint,
    identity: &AttemptIdentity,
    deferrable: bool,
    command: &str,
    stdout: String,
    stderr: String,
    killed_by_cancel: bool,
) {
    if exit_code == 0 {
        let _ = executor.execute(Effect::RecordAttemptSuccess { key: identity.key() }).await;
        let _ = executor
            .execute(Effect::CacheStore { entry: CacheEntry::new(fingerprint, 0, stdout, stderr, 0, "", "") })
            .await;
        let _ = store.complete_invocation(invocation_id, InvocationStatus::Succeeded, 0, 0, 0);
        return;
    }

    if killed_by_cancel {
        let _ = store.complete_invocation(invocation_id, InvocationStatus::Killed, exit_code, 0, 0);
        return;
    }

    let _ = executor.execute(Effect::RecordAttemptFailure { key: identity.key() }).await;
    let counter = store.attempts_get_or_create(
        &identity.session_or_project,
        &identity.plugin,
        &identity.hook_name,
        &identity.directory,
    );
    let status = if counter.is_stuck() && deferrable { InvocationStatus::Deferred } else { InvocationStatus::Failed };
    let _ = store.complete_invocation(invocation_id, status, exit_code, 0, 0);

    if status == InvocationStatus::Deferred {
        let _ = store.deferred_queue(
            orchestration_id,
            identity.plugin.clone(),
            identity.hook_name.clone(),
            identity.directory.clone(),
            command.to_string(),
        );
    } else {
        let _ = executor.execute(Effect::PublishFailureToken { orchestration_id, invocation_id }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hce_core::{FakeClock, HookEvent};
    use tempfile::tempdir;

    fn coordinator(dir: &std::path::Path) -> Coordinator<FakeClock> {
        let store = Store::open(&dir.join("events.wal"), &dir.join("snapshot.json")).unwrap();
        let slots = Arc::new(SlotManager::new(store.clone(), FakeClock::new()));
        Coordinator::new(store, slots)
    }

    fn request(orchestration_id: OrchestrationId, directory: &str, command: &str) -> DispatchRequest {
        DispatchRequest {
            orchestration_id,
            plugin: "lint".into(),
            hook_name: "check".into(),
            directory: directory.into(),
            command: command.into(),
            env: HashMap::new(),
            env_whitelist: vec!["PATH".into()],
            idle_timeout: Duration::from_secs(5),
            wall_timeout: Duration::from_secs(5),
            slot_wait_timeout: Duration::from_secs(5),
            stdin_payload: None,
            fingerprint: Fingerprint::from_segments([command.as_bytes()]),
            deferrable: false,
            session_or_project: "sess".into(),
        }
    }

    #[tokio::test]
    async fn successful_dispatch_completes_with_exit_zero() {
        let dir = tempdir().unwrap();
        let coordinator = coordinator(dir.path());
        let orch = coordinator.store.start_orchestration(None, HookEvent::PreToolUse, "/repo".into()).unwrap();

        let (_, mut rx) =
            coordinator.dispatch(request(orch, "/repo", "echo ok"), CancellationToken::new()).await.unwrap();
        let mut last = None;
        while let Some(frame) = rx.recv().await {
            last = Some(frame);
        }
        assert!(matches!(last, Some(Frame::Complete { exit_code: 0, .. })));
    }

    #[tokio::test]
    async fn second_identical_dispatch_hits_the_cache_instead_of_spawning() {
        let dir = tempdir().unwrap();
        let coordinator = coordinator(dir.path());
        let orch = coordinator.store.start_orchestration(None, HookEvent::PreToolUse, "/repo".into()).unwrap();

        let (_, mut rx) =
            coordinator.dispatch(request(orch, "/repo", "echo ok"), CancellationToken::new()).await.unwrap();
        while rx.recv().await.is_some() {}

        let (second_id, mut rx2) =
            coordinator.dispatch(request(orch, "/repo", "echo ok"), CancellationToken::new()).await.unwrap();
        let mut last = None;
        while let Some(frame) = rx2.recv().await {
            last = Some(frame);
        }
        assert!(matches!(last, Some(Frame::Complete { exit_code: 0, .. })));
        assert_eq!(coordinator.store.get_invocation(second_id).unwrap().status, InvocationStatus::Cached);
    }

    #[tokio::test]
    async fn repeated_failures_past_max_attempts_defer_instead_of_failing() {
        let dir = tempdir().unwrap();
        let coordinator = coordinator(dir.path());
        let orch = coordinator.store.start_orchestration(None, HookEvent::PreToolUse, "/repo".into()).unwrap();

        let mut last_status = None;
        for i in 0..4 {
            let mut req = request(orch, "/repo", &format!("exit 1 # attempt {i}"));
            req.deferrable = true;
            let (id, mut rx) = coordinator.dispatch(req, CancellationToken::new()).await.unwrap();
            while rx.recv().await.is_some() {}
            last_status = coordinator.store.get_invocation(id).map(|inv| inv.status);
        }

        assert_eq!(last_status, Some(InvocationStatus::Deferred));
    }

    #[tokio::test]
    async fn fail_fast_group_cancels_a_sleeping_sibling_when_another_fails() {
        let dir = tempdir().unwrap();
        let coordinator = coordinator(dir.path());
        let orch = coordinator.store.start_orchestration(None, HookEvent::Stop, "/repo".into()).unwrap();

        let sleeper = request(orch, "/repo/h1", "sleep 2 && exit 0");
        let failing = request(orch, "/repo/h2", "exit 2");

        let results = coordinator.dispatch_group(orch, vec![sleeper, failing], true).await.unwrap();
        let mut exit_codes = Vec::new();
        for (_, mut rx) in results {
            let mut last = None;
            while let Some(frame) = rx.recv().await {
                last = Some(frame);
            }
            if let Some(Frame::Complete { exit_code, .. }) = last {
                exit_codes.push(exit_code);
            }
        }

        assert!(exit_codes.contains(&2));
        assert!(exit_codes.contains(&130));

        let orchestration = coordinator.store.get_orchestration(orch).unwrap();
        assert_eq!(orchestration.worst_exit_code, 2);
    }
}
