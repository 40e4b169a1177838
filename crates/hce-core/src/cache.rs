// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CacheEntry: a stored result keyed by fingerprint.
//!
//! Validity is content-based, not time-based — an entry is valid as long as
//! the fingerprint still matches the current inputs (§3).

use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub exit_code: i32,
    /// Reference to stored stdout (a path or store-internal blob id; opaque
    /// to this crate).
    pub stdout_ref: String,
    pub stderr_ref: String,
    pub produced_at_ms: u64,
    pub plugin_files_digest: String,
    pub config_digest: String,
}

impl CacheEntry {
    pub fn new(
        fingerprint: Fingerprint,
        exit_code: i32,
        stdout_ref: impl Into<String>,
        stderr_ref: impl Into<String>,
        produced_at_ms: u64,
        plugin_files_digest: impl Into<String>,
        config_digest: impl Into<String>,
    ) -> Self {
        Self {
            fingerprint,
            exit_code,
            stdout_ref: stdout_ref.into(),
            stderr_ref: stderr_ref.into(),
            produced_at_ms,
            plugin_files_digest: plugin_files_digest.into(),
            config_digest: config_digest.into(),
        }
    }
}
