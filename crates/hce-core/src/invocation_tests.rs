// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn new_invocation_starts_pending() {
    let inv = HookInvocation::builder().build();
    assert_eq!(inv.status, InvocationStatus::Pending);
    assert!(!inv.status.is_terminal());
}

#[test]
fn complete_sets_duration_from_start() {
    let mut inv = HookInvocation::builder().build();
    inv.start(1_000);
    inv.complete(InvocationStatus::Succeeded, 0, 1_500);
    assert_eq!(inv.duration_ms, Some(500));
    assert_eq!(inv.exit_code, Some(0));
    assert!(inv.status.is_terminal());
}

#[test]
fn dedup_key_is_stable_for_same_hook_and_directory() {
    let orch = OrchestrationId::new();
    let a = HookInvocation::builder().orchestration_id(orch).directory("/repo").build();
    let b = HookInvocation::builder().orchestration_id(orch).directory("/repo").build();
    assert_eq!(a.dedup_key(), b.dedup_key());
}
