// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the end-to-end test suite: a throwaway project
//! directory with its own daemon state directory, and a command builder
//! wired to the freshly built `hce` binary.

use std::path::Path;

use assert_cmd::Command;
use tempfile::TempDir;

pub struct Project {
    root: TempDir,
    state_dir: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self { root: TempDir::new().unwrap(), state_dir: TempDir::new().unwrap() }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn file(&self, relative: &str, contents: &str) {
        let path = self.root.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    /// Writes a `.claude/settings.json` hook configuration.
    pub fn settings(&self, json: &str) {
        self.file(".claude/settings.json", json);
    }

    /// A fresh `hce` invocation, isolated to this project's own daemon
    /// state directory so parallel tests never share a socket.
    pub fn hce(&self) -> Command {
        let mut cmd = Command::cargo_bin("hce").unwrap();
        cmd.env("HCE_STATE_DIR", self.state_dir.path())
            .env("HOME", self.root.path())
            .current_dir(self.root.path());
        cmd
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        // Best-effort: tests that started a daemon should stop it themselves,
        // but a leaked daemon must not be left running past the test.
        let _ = Command::cargo_bin("hce")
            .unwrap()
            .env("HCE_STATE_DIR", self.state_dir.path())
            .args(["daemon", "stop"])
            .timeout(std::time::Duration::from_secs(5))
            .output();
    }
}
