// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence for crash recovery.
//!
//! Snapshots store the complete materialized state at a point in time,
//! identified by the WAL sequence number. Recovery loads the snapshot and
//! replays WAL entries after that sequence.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::migration::{MigrationError, MigrationRegistry};
use crate::state::MaterializedState;

/// Current snapshot schema version.
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),
}

/// A snapshot of the materialized state at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema version, for migrations.
    #[serde(rename = "v")]
    pub version: u32,
    /// WAL sequence number at the time of snapshot.
    pub seq: u64,
    pub state: MaterializedState,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(seq: u64, state: MaterializedState, created_at: DateTime<Utc>) -> Self {
        Self { version: CURRENT_SNAPSHOT_VERSION, seq, state, created_at }
    }

    /// Reads and migrates a snapshot from `path`. Returns `Ok(None)` if no
    /// snapshot file exists yet (a cold start), or if the file is present
    /// but corrupt — in which case it is rotated to `.bak` and recovery
    /// falls back to replaying the WAL from the beginning.
    pub fn load(path: &Path, registry: &MigrationRegistry) -> Result<Option<Self>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        let parsed: Result<Self, SnapshotError> = (|| {
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            let migrated = registry.migrate_to(value, CURRENT_SNAPSHOT_VERSION)?;
            Ok(serde_json::from_value(migrated)?)
        })();

        match parsed {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(SnapshotError::Migration(err)) => Err(SnapshotError::Migration(err)),
            Err(err) => {
                tracing::warn!(error = %err, path = %path.display(), "snapshot corrupt, rotating to backup");
                let bak = rotate_bak_path(path);
                fs::rename(path, bak)?;
                Ok(None)
            }
        }
    }

    /// Atomically writes the snapshot: serialize to a sibling `.tmp` file,
    /// then rename over `path`, so a crash mid-write never leaves a
    /// truncated snapshot in place.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp");
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`. The
/// oldest backup is removed when the limit is reached.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_returns_none_for_missing_file() {
        let dir = tempdir().unwrap();
        let registry = MigrationRegistry::new();
        let result = Snapshot::load(&dir.path().join("snapshot.json"), &registry).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let snapshot = Snapshot::new(42, MaterializedState::default(), Utc::now());
        snapshot.save(&path).unwrap();

        let registry = MigrationRegistry::new();
        let loaded = Snapshot::load(&path, &registry).unwrap().unwrap();
        assert_eq!(loaded.seq, 42);
        assert_eq!(loaded.version, CURRENT_SNAPSHOT_VERSION);
    }

    #[test]
    fn rotate_bak_path_evicts_oldest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(path.with_extension("bak"), b"one").unwrap();
        fs::write(path.with_extension("bak.2"), b"two").unwrap();
        fs::write(path.with_extension("bak.3"), b"three").unwrap();

        let target = rotate_bak_path(&path);
        assert_eq!(target, path.with_extension("bak"));
        assert_eq!(fs::read(path.with_extension("bak.2")).unwrap(), b"one");
        assert_eq!(fs::read(path.with_extension("bak.3")).unwrap(), b"two");
    }
}
