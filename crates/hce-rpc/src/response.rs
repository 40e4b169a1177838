// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Responses and streaming frames the daemon sends back to a client (§6).

use hce_core::{DeferredHookId, HookInvocationId, InvocationStatus, OrchestrationId};
use serde::{Deserialize, Serialize};

/// One chunk of a streaming hook invocation, sent in sequence while
/// `ExecuteHooks`/`DispatchSingleHook` is running. Mirrors
/// `hce_engine::runner::Frame`'s shape; kept as a distinct wire type so
/// `hce-rpc` does not need to depend on `hce-engine`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamFrame {
    Stdout {
        invocation_id: HookInvocationId,
        line: String,
    },
    Stderr {
        invocation_id: HookInvocationId,
        line: String,
    },
    /// Terminal frame for one invocation (§6: `{exitCode, cached,
    /// durationMs, error?}`).
    Complete {
        invocation_id: HookInvocationId,
        exit_code: i32,
        cached: bool,
        duration_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// The invocation was deferred instead of run (attempt counter stuck).
    Deferred {
        invocation_id: HookInvocationId,
        deferred_hook_id: DeferredHookId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationSummary {
    pub orchestration_id: OrchestrationId,
    pub worst_exit_code: i32,
    pub is_terminal: bool,
    pub invocation_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationSummary {
    pub invocation_id: HookInvocationId,
    pub status: InvocationStatus,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseSummary {
    pub directory: String,
    pub holder: HookInvocationId,
    pub acquired_at_ms: u64,
    pub deadline_ms: u64,
    pub queue_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub version: String,
    pub uptime_ms: u64,
    pub active_invocations: usize,
    pub active_orchestrations: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Ok,
    Pong,
    Hello {
        version: String,
    },
    ShuttingDown,
    Error {
        message: String,
    },
    OrchestrationStarted {
        orchestration_id: OrchestrationId,
    },
    OrchestrationEnded {
        orchestration_id: OrchestrationId,
        worst_exit_code: i32,
    },
    OrchestrationState(OrchestrationSummary),
    /// One streaming frame belonging to the invocation currently being
    /// served; the connection carries a sequence of these followed by an
    /// `Ok` once every hook in the request has completed.
    Stream(StreamFrame),
    Invocation(InvocationSummary),
    /// Terminal outcome of a `WaitForDeferred` request: the deferred hook
    /// was re-run and either resolved or failed again.
    DeferredResolved {
        deferred_hook_id: DeferredHookId,
        exit_code: i32,
    },
    Leases(Vec<LeaseSummary>),
    Status(StatusSummary),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_serializes_with_a_type_tag() {
        let json = serde_json::to_string(&Response::Ok).unwrap();
        assert_eq!(json, r#"{"type":"Ok"}"#);
    }

    #[test]
    fn complete_frame_omits_absent_error_field() {
        let frame = StreamFrame::Complete {
            invocation_id: HookInvocationId::new(),
            exit_code: 0,
            cached: false,
            duration_ms: 12,
            error: None,
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(!json.contains("error"), "unexpected error field in {json}");
    }

    #[test]
    fn response_roundtrips_through_json() {
        let response = Response::Error { message: "boom".to_string() };
        let json = serde_json::to_string(&response).unwrap();
        let back: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(response, back);
    }
}
