// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error kind tag surfaced at the RPC boundary (§7).
//!
//! Individual crates define their own `thiserror` error enums; each one
//! classifies into exactly one of these kinds when it crosses the RPC
//! boundary, so a client never needs to parse a Rust-specific error type.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Retry locally with backoff, then escalate (cache/store I/O blips).
    Transient,
    /// Surface to the RPC client; no state was mutated.
    Caller,
    /// A hook's own exit/signal/timeout; counted toward attempts.
    ChildProcess,
    /// Logged; the affected row is quarantined but serving continues.
    Fatal,
}

crate::simple_display! {
    ErrorKind {
        Transient => "transient",
        Caller => "caller",
        ChildProcess => "child_process",
        Fatal => "fatal",
    }
}
