// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DeferredHook: a hook whose attempt counter has saturated, queued for
//! asynchronous resolution.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ids::{DeferredHookId, OrchestrationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeferredStatus {
    Pending,
    Running,
    Failed,
}

crate::simple_display! {
    DeferredStatus {
        Pending => "pending",
        Running => "running",
        Failed => "failed",
    }
}

impl DeferredStatus {
    /// Listing operations (§4.1 `list`) only ever surface these statuses;
    /// a successful completion tombstones the row instead of transitioning
    /// it to a new status (§3).
    pub const OPEN: [DeferredStatus; 3] =
        [DeferredStatus::Pending, DeferredStatus::Running, DeferredStatus::Failed];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeferredHook {
    pub id: DeferredHookId,
    pub orchestration_id: OrchestrationId,
    pub plugin: String,
    pub hook_name: String,
    pub directory: PathBuf,
    pub command: String,
    pub status: DeferredStatus,
    pub queued_at_ms: u64,
    pub last_error: Option<String>,
    /// Set once the hook completes successfully; such rows are tombstoned
    /// and excluded from `list()` regardless of `status`.
    pub resolved: bool,
}

impl DeferredHook {
    pub fn new(
        orchestration_id: OrchestrationId,
        plugin: impl Into<String>,
        hook_name: impl Into<String>,
        directory: PathBuf,
        command: impl Into<String>,
        queued_at_ms: u64,
    ) -> Self {
        Self {
            id: DeferredHookId::new(),
            orchestration_id,
            plugin: plugin.into(),
            hook_name: hook_name.into(),
            directory,
            command: command.into(),
            status: DeferredStatus::Pending,
            queued_at_ms,
            last_error: None,
            resolved: false,
        }
    }

    pub fn resolve(&mut self) {
        self.resolved = true;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = DeferredStatus::Failed;
        self.last_error = Some(error.into());
    }

    pub fn is_open(&self) -> bool {
        !self.resolved
    }
}

#[cfg(test)]
#[path = "deferred_tests.rs"]
mod tests;
