// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook configuration schema and settings-file precedence (§6).
//!
//! Three settings files can each define a `hooks` section; they are merged
//! per event name with `local > project > user` precedence — whichever
//! file defines a given event's hook groups wins outright for that event,
//! there is no hook-by-hook interleaving across files.

use std::collections::HashMap;
use std::path::Path;

use hce_core::HookEvent;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable that short-circuits every hook execution to a
/// no-op success (§6).
pub const DISABLE_HOOKS_ENV: &str = "HAN_DISABLE_HOOKS";

pub fn hooks_disabled_by_env(env: &HashMap<String, String>) -> bool {
    matches!(env.get(DISABLE_HOOKS_ENV).map(String::as_str), Some("1") | Some("true"))
}

#[derive(Debug, Error)]
pub enum HookConfigError {
    #[error("failed to read {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse { path: String, source: serde_json::Error },
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HooksFile {
    #[serde(default)]
    pub hooks: HashMap<HookEvent, Vec<HookGroup>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HookGroup {
    pub hooks: Vec<HookDef>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HookDef {
    Command {
        command: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
        #[serde(default)]
        idle_timeout_ms: Option<u64>,
        #[serde(default)]
        if_changed: Vec<String>,
        #[serde(default)]
        deferrable: Option<bool>,
    },
    Prompt {
        prompt: String,
    },
}

impl HookDef {
    pub fn is_deferrable(&self) -> bool {
        matches!(self, HookDef::Command { deferrable: Some(true), .. })
    }
}

/// Where a settings file may live, in ascending precedence order
/// (`user` is consulted first, `local` wins last).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsScope {
    User,
    Project,
    Local,
}

pub fn settings_path(scope: SettingsScope, project_root: &Path, home: &Path) -> std::path::PathBuf {
    match scope {
        SettingsScope::User => home.join(".claude").join("settings.json"),
        SettingsScope::Project => project_root.join(".claude").join("settings.json"),
        SettingsScope::Local => project_root.join(".claude").join("settings.local.json"),
    }
}

fn load(path: &Path) -> Result<Option<HooksFile>, HookConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| HookConfigError::Parse { path: path.display().to_string(), source }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(HookConfigError::Io { path: path.display().to_string(), source }),
    }
}

/// Loads and merges `user`, `project` and `local` settings files in
/// precedence order. A file that does not exist contributes nothing; a
/// file that exists but fails to parse is a hard error (it would be
/// surprising to silently ignore a malformed settings file).
pub fn load_merged(project_root: &Path, home: &Path) -> Result<HooksFile, HookConfigError> {
    let mut merged: HashMap<HookEvent, Vec<HookGroup>> = HashMap::new();
    for scope in [SettingsScope::User, SettingsScope::Project, SettingsScope::Local] {
        let path = settings_path(scope, project_root, home);
        if let Some(file) = load(&path)? {
            merged.extend(file.hooks);
        }
    }
    Ok(HooksFile { hooks: merged })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_settings(path: &Path, json: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, json).unwrap();
    }

    #[test]
    fn local_settings_override_project_settings_for_the_same_event() {
        let root = tempdir().unwrap();
        let home = tempdir().unwrap();

        write_settings(
            &settings_path(SettingsScope::Project, root.path(), home.path()),
            r#"{"hooks":{"PreToolUse":[{"hooks":[{"type":"command","command":"project-cmd"}]}]}}"#,
        );
        write_settings(
            &settings_path(SettingsScope::Local, root.path(), home.path()),
            r#"{"hooks":{"PreToolUse":[{"hooks":[{"type":"command","command":"local-cmd"}]}]}}"#,
        );

        let merged = load_merged(root.path(), home.path()).unwrap();
        let groups = &merged.hooks[&HookEvent::PreToolUse];
        match &groups[0].hooks[0] {
            HookDef::Command { command, .. } => assert_eq!(command, "local-cmd"),
            other => panic!("expected a command hook, got {other:?}"),
        }
    }

    #[test]
    fn events_only_defined_in_user_settings_still_survive_the_merge() {
        let root = tempdir().unwrap();
        let home = tempdir().unwrap();

        write_settings(
            &settings_path(SettingsScope::User, root.path(), home.path()),
            r#"{"hooks":{"SessionStart":[{"hooks":[{"type":"command","command":"user-cmd"}]}]}}"#,
        );

        let merged = load_merged(root.path(), home.path()).unwrap();
        assert!(merged.hooks.contains_key(&HookEvent::SessionStart));
    }

    #[test]
    fn missing_settings_files_merge_to_an_empty_set() {
        let root = tempdir().unwrap();
        let home = tempdir().unwrap();
        let merged = load_merged(root.path(), home.path()).unwrap();
        assert!(merged.hooks.is_empty());
    }

    #[test]
    fn han_disable_hooks_env_var_is_recognized_as_truthy_or_falsy() {
        let mut env = HashMap::new();
        assert!(!hooks_disabled_by_env(&env));
        env.insert(DISABLE_HOOKS_ENV.to_string(), "1".to_string());
        assert!(hooks_disabled_by_env(&env));
        env.insert(DISABLE_HOOKS_ENV.to_string(), "true".to_string());
        assert!(hooks_disabled_by_env(&env));
        env.insert(DISABLE_HOOKS_ENV.to_string(), "0".to_string());
        assert!(!hooks_disabled_by_env(&env));
    }
}
