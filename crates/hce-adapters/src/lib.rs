// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hce-adapters: sandboxed process construction and signal delivery.
//!
//! Everything here is mechanism, not policy — the hook runner in
//! `hce-engine` owns timeout/streaming/retry policy and calls down into
//! this crate only for "build me a safe command" and "send this signal".

mod subprocess;

pub use subprocess::{
    run_with_timeout, safe_path, sandboxed_command, send_kill, send_terminate, SubprocessError,
};
