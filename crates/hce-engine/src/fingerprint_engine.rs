// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Computes the content-addressed [`Fingerprint`] a hook invocation is
//! cached under (§4.2).
//!
//! Every component is hashed through [`Fingerprint::from_segments`] in a
//! fixed order with explicit length-prefixed segments, never through
//! `Debug`/`Display` of a `HashMap` — map iteration order must never leak
//! into the digest.

use std::collections::BTreeMap;
use std::path::Path;

use globset::{Glob, GlobSetBuilder};
use hce_core::Fingerprint;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Everything the fingerprint is computed from, already resolved by the
/// caller (the coordinator), so this module stays pure and host-independent.
pub struct FingerprintInputs<'a> {
    pub command: &'a str,
    pub plugin: &'a str,
    pub hook_name: &'a str,
    /// Canonicalized JSON of the effective merged config for this hook.
    pub config_digest_input: &'a serde_json::Value,
    /// `if_changed` glob patterns, resolved relative to `directory`.
    pub if_changed: &'a [String],
    pub directory: &'a Path,
    /// Only variables the hook configuration explicitly whitelists — all
    /// others are ignored regardless of what the daemon process inherited.
    pub env_subset: &'a BTreeMap<String, String>,
}

/// Normalizes a shell command string: collapses runs of whitespace
/// introduced by shell continuation/escaping outside of quotes, and trims
/// leading/trailing whitespace, so cosmetically different but functionally
/// identical commands fingerprint the same way. Whitespace inside a single-
/// or double-quoted argument is preserved verbatim, since `echo "a  b"` and
/// `echo "a b"` are different commands (§4.2).
pub fn normalize_command(command: &str) -> String {
    let mut result = String::with_capacity(command.len());
    let mut in_single_quotes = false;
    let mut in_double_quotes = false;
    let mut pending_space = false;

    for c in command.chars() {
        match c {
            '\'' if !in_double_quotes => {
                if pending_space {
                    result.push(' ');
                    pending_space = false;
                }
                in_single_quotes = !in_single_quotes;
                result.push(c);
            }
            '"' if !in_single_quotes => {
                if pending_space {
                    result.push(' ');
                    pending_space = false;
                }
                in_double_quotes = !in_double_quotes;
                result.push(c);
            }
            c if c.is_whitespace() && !in_single_quotes && !in_double_quotes => {
                if !result.is_empty() {
                    pending_space = true;
                }
            }
            c => {
                if pending_space {
                    result.push(' ');
                    pending_space = false;
                }
                result.push(c);
            }
        }
    }

    result
}

/// Canonicalizes a JSON value into a byte sequence independent of key order:
/// object keys are sorted, then the whole thing is serialized. Any two
/// config values that are "functionally identical after JSON
/// canonicalization" (§4.2) therefore hash identically.
pub fn canonicalize_json(value: &serde_json::Value) -> Vec<u8> {
    let sorted = sort_json(value);
    serde_json::to_vec(&sorted).unwrap_or_default()
}

fn sort_json(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<String, serde_json::Value> =
                map.iter().map(|(k, v)| (k.clone(), sort_json(v))).collect();
            serde_json::to_value(sorted).unwrap_or(serde_json::Value::Null)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sort_json).collect())
        }
        other => other.clone(),
    }
}

/// SHA-256 over the sorted list of `(relpath, content-hash)` pairs for every
/// file matched by `if_changed` under `directory`. A glob that matches
/// nothing contributes no entries; a glob that names a file that does not
/// exist on disk contributes `(path, ∅)` (§4.2 rule 4).
pub fn tracked_file_digest(directory: &Path, if_changed: &[String]) -> String {
    if if_changed.is_empty() {
        return hex_digest(&[]);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in if_changed {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    let Ok(set) = builder.build() else {
        return hex_digest(&[]);
    };

    let mut matches: BTreeMap<String, [u8; 32]> = BTreeMap::new();
    for entry in WalkDir::new(directory).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relpath) = entry.path().strip_prefix(directory) else { continue };
        let relpath_str = relpath.to_string_lossy().replace('\\', "/");
        if !set.is_match(&relpath_str) {
            continue;
        }
        let digest = std::fs::read(entry.path())
            .map(|bytes| Sha256::digest(&bytes).into())
            .unwrap_or([0u8; 32]);
        matches.insert(relpath_str, digest);
    }

    // A literal (non-glob) `if_changed` path that names no file on disk
    // still needs an entry — otherwise deleting a tracked file is
    // indistinguishable from never having declared it, and the fingerprint
    // doesn't change (§4.2 rule 4).
    for pattern in if_changed {
        if is_literal_path(pattern) && !matches.contains_key(pattern) && !directory.join(pattern).is_file() {
            matches.insert(pattern.clone(), MISSING_FILE_MARKER);
        }
    }

    let mut hasher = Sha256::new();
    for (path, digest) in &matches {
        hasher.update((path.len() as u64).to_be_bytes());
        hasher.update(path.as_bytes());
        hasher.update(digest);
    }
    hex::encode(hasher.finalize())
}

/// Sentinel digest for a literal `if_changed` path that names no file on
/// disk — distinct from any real SHA-256 output, and from the zeroed
/// fallback used when a matched file exists but can't be read.
const MISSING_FILE_MARKER: [u8; 32] = [0xffu8; 32];

/// A glob pattern with no wildcard metacharacters names exactly one path,
/// so it can be checked for existence directly rather than only through
/// `WalkDir` enumeration.
fn is_literal_path(pattern: &str) -> bool {
    !pattern.contains(['*', '?', '[', ']', '{', '}', '!'])
}

fn hex_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Builds the final [`Fingerprint`] from every component, in the fixed
/// order §4.2 specifies.
pub fn compute(inputs: &FingerprintInputs<'_>) -> Fingerprint {
    let command = normalize_command(inputs.command);
    let config_digest = canonicalize_json(inputs.config_digest_input);
    let tracked = tracked_file_digest(inputs.directory, inputs.if_changed);

    let mut env_bytes = Vec::new();
    for (k, v) in inputs.env_subset {
        env_bytes.extend_from_slice((k.len() as u64).to_be_bytes().as_slice());
        env_bytes.extend_from_slice(k.as_bytes());
        env_bytes.extend_from_slice((v.len() as u64).to_be_bytes().as_slice());
        env_bytes.extend_from_slice(v.as_bytes());
    }

    Fingerprint::from_segments([
        command.as_bytes(),
        inputs.plugin.as_bytes(),
        inputs.hook_name.as_bytes(),
        config_digest.as_slice(),
        tracked.as_bytes(),
        env_bytes.as_slice(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn inputs<'a>(
        command: &'a str,
        config: &'a serde_json::Value,
        directory: &'a Path,
        env: &'a BTreeMap<String, String>,
    ) -> FingerprintInputs<'a> {
        FingerprintInputs {
            command,
            plugin: "lint-plugin",
            hook_name: "lint",
            config_digest_input: config,
            if_changed: &[],
            directory,
            env_subset: env,
        }
    }

    #[test]
    fn identical_inputs_produce_identical_fingerprints() {
        let dir = tempfile::tempdir().unwrap();
        let config = serde_json::json!({"a": 1, "b": 2});
        let env = BTreeMap::new();
        let a = compute(&inputs("echo ok", &config, dir.path(), &env));
        let b = compute(&inputs("echo   ok", &config, dir.path(), &env));
        assert_eq!(a, b);
    }

    #[test]
    fn whitespace_inside_quotes_is_not_collapsed() {
        assert_eq!(normalize_command("echo ok"), normalize_command("echo   ok"));
        assert_ne!(normalize_command(r#"echo "a  b""#), normalize_command(r#"echo "a b""#));
        assert_eq!(normalize_command(r#"echo "a  b""#), r#"echo "a  b""#);
    }

    #[test]
    fn config_key_order_does_not_affect_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let config_a = serde_json::json!({"a": 1, "b": 2});
        let config_b = serde_json::json!({"b": 2, "a": 1});
        let env = BTreeMap::new();
        let a = compute(&inputs("echo ok", &config_a, dir.path(), &env));
        let b = compute(&inputs("echo ok", &config_b, dir.path(), &env));
        assert_eq!(a, b);
    }

    #[test]
    fn different_commands_produce_different_fingerprints() {
        let dir = tempfile::tempdir().unwrap();
        let config = serde_json::json!({});
        let env = BTreeMap::new();
        let a = compute(&inputs("echo ok", &config, dir.path(), &env));
        let b = compute(&inputs("echo nope", &config, dir.path(), &env));
        assert_ne!(a, b);
    }

    #[test]
    fn tracked_file_digest_changes_with_file_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "v1").unwrap();
        let before = tracked_file_digest(dir.path(), &["*.txt".to_string()]);
        std::fs::write(dir.path().join("a.txt"), "v2").unwrap();
        let after = tracked_file_digest(dir.path(), &["*.txt".to_string()]);
        assert_ne!(before, after);
    }

    #[test]
    fn deleting_a_tracked_file_changes_the_digest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "v1").unwrap();
        let present = tracked_file_digest(dir.path(), &["a.txt".to_string()]);
        std::fs::remove_file(dir.path().join("a.txt")).unwrap();
        let missing = tracked_file_digest(dir.path(), &["a.txt".to_string()]);
        assert_ne!(present, missing);
    }

    #[test]
    fn never_declared_is_different_from_never_existed_is_not_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let never_declared = tracked_file_digest(dir.path(), &[]);
        let declared_but_missing = tracked_file_digest(dir.path(), &["a.txt".to_string()]);
        assert_ne!(never_declared, declared_but_missing);
    }

    #[test]
    fn tracked_file_digest_is_independent_of_filesystem_enumeration_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("z.txt"), "z").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        let digest = tracked_file_digest(dir.path(), &["*.txt".to_string()]);
        let digest_again = tracked_file_digest(dir.path(), &["*.txt".to_string()]);
        assert_eq!(digest, digest_again);
    }
}
