// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-directory exclusive mutual exclusion with FIFO fairness (§4.3).
//!
//! The lease itself lives in `hce_storage::Store` (so it survives a
//! restart); this module adds the cooperative-wait layer on top — waiters
//! suspend on a `tokio::sync::Notify` instead of polling, and are woken in
//! strict arrival order, mirroring the register-before-check idiom used
//! elsewhere in this codebase for gate-style coordination.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hce_core::{Clock, HookInvocationId, SlotAcquireResult, SlotLease, SlotReleaseResult};
use hce_storage::{Store, StoreError};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum SlotManagerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("timed out waiting for a lease on {0}")]
    WaitTimeout(PathBuf),
}

#[derive(Default)]
struct Waiters {
    by_directory: HashMap<PathBuf, VecDeque<Arc<Notify>>>,
}

impl Waiters {
    fn register(&mut self, directory: &Path) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.by_directory.entry(directory.to_path_buf()).or_default().push_back(notify.clone());
        notify
    }

    fn remove(&mut self, directory: &Path, notify: &Arc<Notify>) {
        if let Some(queue) = self.by_directory.get_mut(directory) {
            queue.retain(|n| !Arc::ptr_eq(n, notify));
        }
    }

    fn wake_next(&mut self, directory: &Path) {
        if let Some(queue) = self.by_directory.get_mut(directory) {
            if let Some(notify) = queue.pop_front() {
                notify.notify_one();
            }
        }
    }
}

pub struct SlotManager<C: Clock> {
    store: Store,
    clock: C,
    waiters: Mutex<Waiters>,
}

impl<C: Clock> SlotManager<C> {
    pub fn new(store: Store, clock: C) -> Self {
        Self { store, clock, waiters: Mutex::new(Waiters::default()) }
    }

    /// Consults the cache BEFORE calling this — a cache hit must never
    /// enqueue for a slot at all (§4.3 check-before-acquire).
    pub async fn acquire(
        &self,
        directory: PathBuf,
        holder: HookInvocationId,
        lease_ttl: Duration,
        wait_timeout: Duration,
    ) -> Result<SlotLease, SlotManagerError> {
        let deadline = Instant::now() + wait_timeout;
        loop {
            match self.store.slot_try_acquire(directory.clone(), holder, lease_ttl)? {
                SlotAcquireResult::Granted(lease) => return Ok(lease),
                SlotAcquireResult::Busy { .. } => {
                    let notify = self.waiters.lock().register(&directory);
                    let notified = notify.notified();
                    tokio::pin!(notified);

                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        self.waiters.lock().remove(&directory, &notify);
                        return Err(SlotManagerError::WaitTimeout(directory));
                    }

                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep(remaining) => {
                            self.waiters.lock().remove(&directory, &notify);
                            return Err(SlotManagerError::WaitTimeout(directory));
                        }
                    }
                }
            }
        }
    }

    pub fn release(
        &self,
        directory: PathBuf,
        holder: HookInvocationId,
    ) -> Result<SlotReleaseResult, SlotManagerError> {
        let result = self.store.slot_release(directory.clone(), holder)?;
        self.waiters.lock().wake_next(&directory);
        Ok(result)
    }

    /// Number of callers currently waiting on `directory` (§6 `ListLeases`).
    pub fn queue_depth(&self, directory: &Path) -> usize {
        self.waiters.lock().by_directory.get(directory).map_or(0, VecDeque::len)
    }

    /// Every lease currently held.
    pub fn active_leases(&self) -> Vec<SlotLease> {
        self.store.list_leases()
    }

    /// Reclaims every lease past its deadline and wakes the next waiter for
    /// each reclaimed directory. Intended to run on a periodic interval
    /// against the injected clock.
    pub fn sweep(&self) -> Result<Vec<PathBuf>, SlotManagerError> {
        let now_ms = self.clock.epoch_ms();
        let expired = self.store.slot_expire_sweep(now_ms)?;
        let mut waiters = self.waiters.lock();
        for directory in &expired {
            waiters.wake_next(directory);
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hce_core::FakeClock;
    use tempfile::tempdir;

    fn manager(dir: &Path) -> SlotManager<FakeClock> {
        let store = Store::open(&dir.join("events.wal"), &dir.join("snapshot.json")).unwrap();
        SlotManager::new(store, FakeClock::new())
    }

    #[tokio::test]
    async fn second_acquire_waits_until_first_releases() {
        let dir = tempdir().unwrap();
        let manager = Arc::new(manager(dir.path()));
        let directory: PathBuf = "/repo".into();
        let holder_a = HookInvocationId::new();
        let holder_b = HookInvocationId::new();

        let lease_a = manager.acquire(directory.clone(), holder_a, Duration::from_secs(30), Duration::from_secs(5)).await.unwrap();
        assert_eq!(lease_a.holder, holder_a);

        let manager_clone = manager.clone();
        let directory_clone = directory.clone();
        let waiter = tokio::spawn(async move {
            manager_clone.acquire(directory_clone, holder_b, Duration::from_secs(30), Duration::from_secs(5)).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        manager.release(directory, holder_a).unwrap();
        let lease_b = waiter.await.unwrap().unwrap();
        assert_eq!(lease_b.holder, holder_b);
    }

    #[tokio::test]
    async fn acquire_times_out_when_never_released() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path());
        let directory: PathBuf = "/repo".into();
        let holder_a = HookInvocationId::new();
        let holder_b = HookInvocationId::new();

        manager.acquire(directory.clone(), holder_a, Duration::from_secs(30), Duration::from_secs(5)).await.unwrap();
        let result = manager.acquire(directory, holder_b, Duration::from_secs(30), Duration::from_millis(100)).await;
        assert!(matches!(result, Err(SlotManagerError::WaitTimeout(_))));
    }

    #[tokio::test]
    async fn waiters_are_granted_in_fifo_order() {
        let dir = tempdir().unwrap();
        let manager = Arc::new(manager(dir.path()));
        let directory: PathBuf = "/repo".into();
        let holder_first = HookInvocationId::new();
        let holder_second = HookInvocationId::new();
        let holder_third = HookInvocationId::new();

        manager.acquire(directory.clone(), holder_first, Duration::from_secs(30), Duration::from_secs(5)).await.unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));

        let m2 = manager.clone();
        let d2 = directory.clone();
        let o2 = order.clone();
        let second = tokio::spawn(async move {
            m2.acquire(d2, holder_second, Duration::from_secs(30), Duration::from_secs(5)).await.unwrap();
            o2.lock().push(holder_second);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let m3 = manager.clone();
        let d3 = directory.clone();
        let o3 = order.clone();
        let third = tokio::spawn(async move {
            m3.acquire(d3, holder_third, Duration::from_secs(30), Duration::from_secs(5)).await.unwrap();
            o3.lock().push(holder_third);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        manager.release(directory.clone(), holder_first).unwrap();
        second.await.unwrap();
        manager.release(directory, holder_second).unwrap();
        third.await.unwrap();

        assert_eq!(*order.lock(), vec![holder_second, holder_third]);
    }
}
