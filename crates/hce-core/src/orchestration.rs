// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestration: the set of hooks activated by one lifecycle event.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ids::OrchestrationId;

/// Assistant lifecycle event that can trigger a group of hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEvent {
    SessionStart,
    UserPromptSubmit,
    PreToolUse,
    PostToolUse,
    Notification,
    Stop,
    SubagentStop,
    SessionEnd,
}

crate::simple_display! {
    HookEvent {
        SessionStart => "SessionStart",
        UserPromptSubmit => "UserPromptSubmit",
        PreToolUse => "PreToolUse",
        PostToolUse => "PostToolUse",
        Notification => "Notification",
        Stop => "Stop",
        SubagentStop => "SubagentStop",
        SessionEnd => "SessionEnd",
    }
}

impl HookEvent {
    /// Whether this event group defaults to fail-fast fan-out (§4.5):
    /// a sibling failure cancels the remaining running hooks unless the
    /// hook opts out.
    pub fn fail_fast_by_default(self) -> bool {
        matches!(self, HookEvent::Stop | HookEvent::SubagentStop)
    }
}

/// One lifecycle event's worth of hook execution, tracked as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orchestration {
    pub id: OrchestrationId,
    pub session_id: Option<String>,
    pub hook_event: HookEvent,
    pub project_root: PathBuf,
    pub started_at_ms: u64,
    pub ended_at_ms: Option<u64>,
    /// Max exit code over every child invocation (§3 invariant).
    pub worst_exit_code: i32,
}

impl Orchestration {
    pub fn new(hook_event: HookEvent, project_root: PathBuf, started_at_ms: u64) -> Self {
        Self {
            id: OrchestrationId::new(),
            session_id: None,
            hook_event,
            project_root,
            started_at_ms,
            ended_at_ms: None,
            worst_exit_code: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.ended_at_ms.is_some()
    }

    /// Fold a child invocation's exit code into `worst_exit_code`.
    ///
    /// Only ever increases — §8 property 6.
    pub fn observe_exit_code(&mut self, exit_code: i32) {
        self.worst_exit_code = self.worst_exit_code.max(exit_code);
    }

    pub fn end(&mut self, ended_at_ms: u64) {
        if self.ended_at_ms.is_none() {
            self.ended_at_ms = Some(ended_at_ms);
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Orchestration {
    pub fn builder() -> OrchestrationBuilder {
        OrchestrationBuilder::default()
    }
}

#[cfg(any(test, feature = "test-support"))]
pub struct OrchestrationBuilder {
    hook_event: HookEvent,
    project_root: PathBuf,
    started_at_ms: u64,
    session_id: Option<String>,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for OrchestrationBuilder {
    fn default() -> Self {
        Self {
            hook_event: HookEvent::PreToolUse,
            project_root: PathBuf::from("/tmp/project"),
            started_at_ms: 0,
            session_id: None,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl OrchestrationBuilder {
    pub fn hook_event(mut self, v: HookEvent) -> Self {
        self.hook_event = v;
        self
    }

    pub fn project_root(mut self, v: impl Into<PathBuf>) -> Self {
        self.project_root = v.into();
        self
    }

    pub fn started_at_ms(mut self, v: u64) -> Self {
        self.started_at_ms = v;
        self
    }

    pub fn session_id(mut self, v: impl Into<String>) -> Self {
        self.session_id = Some(v.into());
        self
    }

    pub fn build(self) -> Orchestration {
        let mut orch = Orchestration::new(self.hook_event, self.project_root, self.started_at_ms);
        orch.session_id = self.session_id;
        orch
    }
}

#[cfg(test)]
#[path = "orchestration_tests.rs"]
mod tests;
