// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hce-engine: the coordination logic sitting between the RPC surface and
//! the durable store — fingerprinting, slot leasing, hook execution,
//! retry/deferral bookkeeping and cross-process failure signaling.

pub mod coordinator;
pub mod effect;
pub mod failure_bus;
pub mod fingerprint_engine;
pub mod hook_config;
pub mod runner;
pub mod slot_manager;

pub use coordinator::{AttemptIdentity, Coordinator, DispatchRequest, ExecuteError, Executor};
pub use effect::Effect;
pub use failure_bus::FailureBus;
pub use fingerprint_engine::{compute as compute_fingerprint, FingerprintInputs};
pub use hook_config::{
    hooks_disabled_by_env, load_merged, HookConfigError, HookDef, HookGroup, HooksFile,
    SettingsScope, DISABLE_HOOKS_ENV,
};
pub use runner::{spawn, spawn_cancelable, Frame, HookSpec};
pub use slot_manager::{SlotManager, SlotManagerError};
