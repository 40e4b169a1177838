// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HookInvocation: a single execution attempt of one hook within an orchestration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;
use crate::ids::{HookInvocationId, OrchestrationId};

/// Terminal/non-terminal status of one invocation.
///
/// Transitions are monotonic: once terminal, an invocation never returns to
/// `Pending`/`Running`. Retrying a hook always creates a *new* invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvocationStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Killed,
    Cached,
    Deferred,
}

crate::simple_display! {
    InvocationStatus {
        Pending => "pending",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Killed => "killed",
        Cached => "cached",
        Deferred => "deferred",
    }
}

impl InvocationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, InvocationStatus::Pending | InvocationStatus::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookInvocation {
    pub id: HookInvocationId,
    pub orchestration_id: OrchestrationId,
    pub plugin: String,
    pub hook_name: String,
    pub directory: PathBuf,
    pub command: String,
    pub status: InvocationStatus,
    pub exit_code: Option<i32>,
    pub started_at_ms: Option<u64>,
    pub ended_at_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub stdout_bytes: u64,
    pub stderr_bytes: u64,
    pub fingerprint: Fingerprint,
}

impl HookInvocation {
    pub fn new(
        orchestration_id: OrchestrationId,
        plugin: impl Into<String>,
        hook_name: impl Into<String>,
        directory: PathBuf,
        command: impl Into<String>,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            id: HookInvocationId::new(),
            orchestration_id,
            plugin: plugin.into(),
            hook_name: hook_name.into(),
            directory,
            command: command.into(),
            status: InvocationStatus::Pending,
            exit_code: None,
            started_at_ms: None,
            ended_at_ms: None,
            duration_ms: None,
            stdout_bytes: 0,
            stderr_bytes: 0,
            fingerprint,
        }
    }

    /// Idempotency key used by `Store::recordInvocation` (§4.1): two
    /// invocations in the same orchestration for the same hook+directory
    /// conflict while either is non-terminal.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.orchestration_id,
            self.plugin,
            self.hook_name,
            self.directory.display()
        )
    }

    pub fn start(&mut self, started_at_ms: u64) {
        self.status = InvocationStatus::Running;
        self.started_at_ms = Some(started_at_ms);
    }

    pub fn complete(&mut self, status: InvocationStatus, exit_code: i32, ended_at_ms: u64) {
        self.status = status;
        self.exit_code = Some(exit_code);
        self.ended_at_ms = Some(ended_at_ms);
        self.duration_ms = self.started_at_ms.map(|s| ended_at_ms.saturating_sub(s));
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct HookInvocationBuilder => HookInvocation {
        into {
            plugin: String = "lint-plugin",
            hook_name: String = "lint",
            command: String = "echo ok",
            directory: PathBuf = PathBuf::from("/tmp/project"),
        }
        set {
            orchestration_id: OrchestrationId = OrchestrationId::new(),
            fingerprint: Fingerprint = Fingerprint::from_segments([b"test".as_slice()]),
        }
        computed {
            id: HookInvocationId = HookInvocationId::new(),
            status: InvocationStatus = InvocationStatus::Pending,
            exit_code: Option<i32> = None,
            started_at_ms: Option<u64> = None,
            ended_at_ms: Option<u64> = None,
            duration_ms: Option<u64> = None,
            stdout_bytes: u64 = 0,
            stderr_bytes: u64 = 0,
        }
    }
}

#[cfg(test)]
#[path = "invocation_tests.rs"]
mod tests;
