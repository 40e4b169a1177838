// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests for `hce run`, covering the daemon's command dispatch
//! path rather than any single crate's internals.

use crate::prelude::Project;

#[test]
fn run_with_no_configured_hooks_is_a_no_op() {
    let project = Project::empty();
    project
        .hce()
        .args(["run", "PreToolUse"])
        .assert()
        .success()
        .stdout(predicates::str::contains("no hooks configured"));
}

#[test]
fn run_dispatches_a_configured_command_hook_and_streams_its_output() {
    let project = Project::empty();
    project.settings(
        r#"{"hooks":{"PreToolUse":[{"hooks":[{"type":"command","command":"echo from-hce"}]}]}}"#,
    );

    project
        .hce()
        .args(["run", "PreToolUse"])
        .assert()
        .success()
        .stdout(predicates::str::contains("from-hce"));
}

#[test]
fn run_exits_nonzero_when_a_hook_fails() {
    let project = Project::empty();
    project.settings(
        r#"{"hooks":{"PreToolUse":[{"hooks":[{"type":"command","command":"exit 3"}]}]}}"#,
    );

    project.hce().args(["run", "PreToolUse"]).assert().code(3);
}

#[test]
fn identical_dispatches_share_a_cached_result() {
    let project = Project::empty();
    let marker = project.path().join("ran.marker");
    project.settings(&format!(
        r#"{{"hooks":{{"PreToolUse":[{{"hooks":[{{"type":"command","command":"echo hit >> {}"}}]}}]}}}}"#,
        marker.display()
    ));

    project.hce().args(["run", "PreToolUse"]).assert().success();
    project.hce().args(["run", "PreToolUse"]).assert().success();

    let contents = std::fs::read_to_string(&marker).unwrap();
    assert_eq!(contents.lines().count(), 1, "second dispatch should have hit the cache, not re-run");
}
