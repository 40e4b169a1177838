// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hce-core: entity model and ambient primitives for the hook coordination engine.

pub mod macros;

pub mod attempts;
pub mod cache;
pub mod clock;
pub mod config;
pub mod deferred;
pub mod error;
pub mod event;
pub mod failure;
pub mod fingerprint;
pub mod id;
pub mod ids;
pub mod invocation;
pub mod orchestration;
pub mod slot;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use attempts::{attempt_key, AttemptCounter, DEFAULT_MAX_ATTEMPTS};
pub use cache::CacheEntry;
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{Config, ConfigError};
pub use deferred::{DeferredHook, DeferredStatus};
pub use error::ErrorKind;
pub use event::Event;
pub use failure::FailureToken;
pub use fingerprint::{Fingerprint, ParseFingerprintError};
pub use id::short;
pub use ids::{DeferredHookId, HookInvocationId, OrchestrationId};
pub use invocation::{HookInvocation, InvocationStatus};
#[cfg(any(test, feature = "test-support"))]
pub use invocation::HookInvocationBuilder;
pub use orchestration::{HookEvent, Orchestration};
#[cfg(any(test, feature = "test-support"))]
pub use orchestration::OrchestrationBuilder;
pub use slot::{SlotAcquireResult, SlotLease, SlotReleaseResult};
