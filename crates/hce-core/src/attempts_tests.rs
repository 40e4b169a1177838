// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::Path;

#[test]
fn default_counter_is_not_stuck() {
    let c = AttemptCounter::default();
    assert_eq!(c.consecutive_failures, 0);
    assert_eq!(c.max_attempts, DEFAULT_MAX_ATTEMPTS);
    assert!(!c.is_stuck());
}

#[test]
fn becomes_stuck_after_max_attempts_failures() {
    let mut c = AttemptCounter::default();
    for _ in 0..DEFAULT_MAX_ATTEMPTS {
        c.record_failure();
    }
    assert!(c.is_stuck());
}

#[test]
fn success_resets_consecutive_failures() {
    let mut c = AttemptCounter::default();
    c.record_failure();
    c.record_failure();
    c.record_success();
    assert_eq!(c.consecutive_failures, 0);
    assert!(!c.is_stuck());
}

#[test]
fn max_attempts_only_grows() {
    let mut c = AttemptCounter::default();
    c.raise_max(2);
    assert_eq!(c.max_attempts, DEFAULT_MAX_ATTEMPTS + 2);
    c.raise_max(0);
    assert_eq!(c.max_attempts, DEFAULT_MAX_ATTEMPTS + 2);
}

#[test]
fn key_is_stable_for_same_coordinates() {
    let a = attempt_key("sess-1", "lint-plugin", "lint", Path::new("/repo"));
    let b = attempt_key("sess-1", "lint-plugin", "lint", Path::new("/repo"));
    assert_eq!(a, b);
}
