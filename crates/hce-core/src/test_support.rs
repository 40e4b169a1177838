// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::ids::OrchestrationId;
use crate::orchestration::HookEvent;
use crate::Event;

/// Proptest strategies for entity state machines (§8 determinism/monotonicity
/// properties).
#[cfg(feature = "proptest")]
pub mod strategies {
    use crate::invocation::InvocationStatus;
    use proptest::prelude::*;

    pub fn arb_invocation_status() -> impl Strategy<Value = InvocationStatus> {
        prop_oneof![
            Just(InvocationStatus::Pending),
            Just(InvocationStatus::Running),
            Just(InvocationStatus::Succeeded),
            Just(InvocationStatus::Failed),
            Just(InvocationStatus::Killed),
            Just(InvocationStatus::Cached),
            Just(InvocationStatus::Deferred),
        ]
    }

    pub fn arb_exit_code() -> impl Strategy<Value = i32> {
        prop_oneof![Just(0), Just(1), Just(124), Just(130), Just(137), Just(143)]
    }
}

pub fn orchestration_started_event(id: OrchestrationId, hook_event: HookEvent) -> Event {
    Event::OrchestrationStarted {
        id,
        session_id: None,
        hook_event,
        project_root: "/test/project".into(),
        started_at_ms: 1_000_000,
    }
}

pub fn orchestration_ended_event(id: OrchestrationId) -> Event {
    Event::OrchestrationEnded { id, ended_at_ms: 1_000_500 }
}
