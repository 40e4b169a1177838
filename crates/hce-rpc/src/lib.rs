// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hce-rpc: the wire protocol spoken between `hce-cli` and `hce-daemon`.
//!
//! A connection is a sequence of length-prefixed JSON frames. A client
//! opens with `Hello`, then sends [`Request`]s; the daemon answers with
//! [`Response`]s, streaming [`response::StreamFrame`]s inline for
//! long-running hook dispatches.

pub mod request;
pub mod response;
pub mod wire;

pub use request::{HookToRun, Request};
pub use response::{
    InvocationSummary, LeaseSummary, OrchestrationSummary, Response, StatusSummary, StreamFrame,
};
pub use wire::{
    decode, encode, read_message, read_request, read_response, write_message, write_request,
    write_response, ProtocolError,
};
