// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests for daemon lifecycle commands.

use crate::prelude::Project;

#[test]
fn status_reports_not_running_before_the_daemon_starts() {
    let project = Project::empty();
    project.hce().args(["status"]).assert().success().stdout(
        predicates::str::contains("not running"),
    );
}

#[test]
fn daemon_start_then_status_then_stop_round_trips() {
    let project = Project::empty();

    project.hce().args(["daemon", "start"]).assert().success();

    project
        .hce()
        .args(["status"])
        .assert()
        .success()
        .stdout(predicates::str::contains("running"));

    project
        .hce()
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(predicates::str::contains("stopped"));

    project
        .hce()
        .args(["status"])
        .assert()
        .success()
        .stdout(predicates::str::contains("not running"));
}

#[test]
fn stopping_a_daemon_that_is_not_running_is_not_an_error() {
    let project = Project::empty();
    project
        .hce()
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(predicates::str::contains("not running"));
}
