// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process first-failure signal for fan-out groups (§4.7).
//!
//! The durable half of the latch (first-writer-wins, survives a coordinator
//! restart within one orchestration's lifetime) lives in `hce_storage::Store`
//! as a `FailureTokenLatched` event. This module adds the in-process
//! notification half: a `tokio::sync::watch` channel per orchestration that
//! lets a fan-out group's siblings wake up the instant the token latches,
//! instead of polling `observe`.

use std::collections::HashMap;
use std::sync::Arc;

use hce_core::{FailureToken, HookInvocationId, OrchestrationId};
use hce_storage::{Store, StoreError};
use parking_lot::Mutex;
use tokio::sync::watch;

pub struct FailureBus {
    store: Store,
    watchers: Mutex<HashMap<OrchestrationId, watch::Sender<Option<FailureToken>>>>,
}

impl FailureBus {
    pub fn new(store: Store) -> Arc<Self> {
        Arc::new(Self { store, watchers: Mutex::new(HashMap::new()) })
    }

    /// First-writer-wins: the first caller's `failed_invocation_id` is the
    /// one recorded, every later call for the same orchestration returns
    /// that same token back.
    pub fn latch(
        &self,
        orchestration_id: OrchestrationId,
        failed_invocation_id: HookInvocationId,
    ) -> Result<FailureToken, StoreError> {
        let token = self.store.failure_latch(orchestration_id, failed_invocation_id)?;
        if let Some(tx) = self.watchers.lock().get(&orchestration_id) {
            let _ = tx.send(Some(token.clone()));
        }
        Ok(token)
    }

    pub fn observe(&self, orchestration_id: OrchestrationId) -> Option<FailureToken> {
        self.store.failure_observe(orchestration_id)
    }

    /// A receiver that resolves as soon as `orchestration_id`'s token
    /// latches, seeded with whatever has already latched so a late
    /// subscriber doesn't miss a failure that happened before it joined.
    pub fn watch(&self, orchestration_id: OrchestrationId) -> watch::Receiver<Option<FailureToken>> {
        let mut watchers = self.watchers.lock();
        let sender = watchers.entry(orchestration_id).or_insert_with(|| {
            let (tx, _) = watch::channel(self.store.failure_observe(orchestration_id));
            tx
        });
        sender.subscribe()
    }

    /// Drops the in-memory watch channel for an ended orchestration. The
    /// durable latch itself is reaped by `Store::end_orchestration`, which
    /// emits `FailureTokenReaped`.
    pub fn reap(&self, orchestration_id: OrchestrationId) {
        self.watchers.lock().remove(&orchestration_id);
    }
}
