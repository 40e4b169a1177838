// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only write-ahead log of [`Event`]s, one JSON object per line.
//!
//! Every mutation to the Store is durable the moment it lands here (after a
//! flush). A [`Snapshot`](crate::snapshot::Snapshot) lets the daemon discard
//! a prefix of the log once its effects are folded into the snapshot, but the
//! WAL itself never loses an entry once it has been fsynced — a line that
//! fails to parse on reopen is quarantined by rotating the whole file to a
//! `.bak`, not patched in place.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use hce_core::Event;
use serde::{Deserialize, Serialize};

const FLUSH_INTERVAL_SECS: u64 = 1;
const MAX_BAK_FILES: u8 = 3;
const DEFAULT_FLUSH_THRESHOLD: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum WalError {
    #[error("wal io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wal serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
}

/// An append-only log backed by a single file, read sequentially and
/// line-buffered so a partially written trailing line never poisons the
/// entries before it.
pub struct Wal {
    path: PathBuf,
    file: File,
    write_seq: u64,
    processed_seq: u64,
    unflushed_count: usize,
    last_flush: Instant,
    read_offset: u64,
    flush_threshold: usize,
}

impl Wal {
    /// Opens (creating if absent) the WAL at `path`. `processed_seq` is the
    /// sequence number already folded into the last snapshot; entries at or
    /// below it are skipped by [`Self::next_unprocessed`] on this handle.
    ///
    /// If the tail of the file is corrupt (invalid JSON, binary garbage, or a
    /// truncated final line), the valid prefix is preserved and the original
    /// file is rotated out to `<path>.bak` (see [`rotate_bak`]) before a
    /// clean file containing only the valid entries is written back.
    pub fn open(path: impl AsRef<Path>, processed_seq: u64) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            let file = OpenOptions::new().create(true).append(true).read(true).open(&path)?;
            return Ok(Self {
                path,
                file,
                write_seq: processed_seq,
                processed_seq,
                unflushed_count: 0,
                last_flush: Instant::now(),
                read_offset: 0,
                flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            });
        }

        let (valid_entries, had_corruption) = Self::read_valid_prefix(&path)?;
        let write_seq = valid_entries.last().map(|e| e.seq).unwrap_or(0).max(processed_seq);

        if had_corruption {
            rotate_bak(&path)?;
            let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(&path)?;
            for entry in &valid_entries {
                let line = serde_json::to_string(entry)?;
                writeln!(file, "{line}")?;
            }
            file.flush()?;
        }

        let file = OpenOptions::new().append(true).read(true).open(&path)?;
        Ok(Self {
            path,
            file,
            write_seq,
            processed_seq,
            unflushed_count: 0,
            last_flush: Instant::now(),
            read_offset: 0,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        })
    }

    /// Overrides the entry-count flush threshold (default
    /// [`DEFAULT_FLUSH_THRESHOLD`]), used by the daemon to apply
    /// `Config::wal_flush_threshold`.
    pub fn set_flush_threshold(&mut self, threshold: usize) {
        self.flush_threshold = threshold;
    }

    /// Reads every line that parses as a well-formed [`WalEntry`] from the
    /// front of the file, stopping at the first line that doesn't (malformed
    /// JSON, non-UTF-8 bytes, or an unterminated trailing line).
    fn read_valid_prefix(path: &Path) -> Result<(Vec<WalEntry>, bool), WalError> {
        let raw = std::fs::read(path)?;
        let mut entries = Vec::new();
        let mut had_corruption = false;
        let mut offset = 0usize;

        while offset < raw.len() {
            let rest = &raw[offset..];
            let newline_pos = rest.iter().position(|&b| b == b'\n');
            let (line_bytes, consumed) = match newline_pos {
                Some(pos) => (&rest[..pos], pos + 1),
                None => {
                    // Trailing partial line: never valid, never consumed.
                    had_corruption = true;
                    break;
                }
            };

            match std::str::from_utf8(line_bytes) {
                Ok(line) if !line.trim().is_empty() => match serde_json::from_str::<WalEntry>(line) {
                    Ok(entry) => {
                        entries.push(entry);
                        offset += consumed;
                    }
                    Err(_) => {
                        had_corruption = true;
                        break;
                    }
                },
                Ok(_) => offset += consumed,
                Err(_) => {
                    had_corruption = true;
                    break;
                }
            }
        }

        Ok((entries, had_corruption))
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    pub fn append(&mut self, event: &Event) -> Result<u64, WalError> {
        self.write_seq += 1;
        let entry = WalEntry { seq: self.write_seq, event: event.clone() };
        let line = serde_json::to_string(&entry)?;
        self.file.seek(SeekFrom::End(0))?;
        writeln!(self.file, "{line}")?;
        self.unflushed_count += 1;
        Ok(self.write_seq)
    }

    pub fn flush(&mut self) -> Result<(), WalError> {
        self.file.flush()?;
        self.file.sync_data()?;
        self.unflushed_count = 0;
        self.last_flush = Instant::now();
        Ok(())
    }

    /// True once either the unflushed-entry count or the flush interval has
    /// been exceeded; the daemon's event loop polls this to batch fsyncs.
    pub fn needs_flush(&self) -> bool {
        self.unflushed_count >= self.flush_threshold
            || (self.unflushed_count > 0 && self.last_flush.elapsed().as_secs() >= FLUSH_INTERVAL_SECS)
    }

    /// Reads the next entry past `processed_seq`, advancing an internal read
    /// cursor but not `processed_seq` itself — the caller commits progress
    /// explicitly via [`Self::mark_processed`] once the entry's effect is
    /// durable elsewhere (the materialized state, a snapshot).
    ///
    /// Returns `Ok(None)` — never an error — when the next line is corrupt,
    /// binary, or simply absent; callers cannot distinguish "caught up" from
    /// "stuck behind garbage" from this call alone, which is intentional:
    /// either way there is nothing more this handle can hand back right now.
    pub fn next_unprocessed(&mut self) -> Result<Option<WalEntry>, WalError> {
        self.file.seek(SeekFrom::Start(self.read_offset))?;
        let mut reader = BufReader::new(&self.file);
        let mut line = String::new();
        loop {
            line.clear();
            let mut raw_line = Vec::new();
            let bytes_read = read_raw_line(&mut reader, &mut raw_line)?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.read_offset += bytes_read as u64;

            let parsed = std::str::from_utf8(&raw_line)
                .ok()
                .filter(|s| !s.trim().is_empty())
                .and_then(|s| serde_json::from_str::<WalEntry>(s.trim_end()).ok());

            match parsed {
                Some(entry) if entry.seq > self.processed_seq => return Ok(Some(entry)),
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }

    pub fn mark_processed(&mut self, seq: u64) {
        self.processed_seq = self.processed_seq.max(seq);
    }

    /// All entries with `seq > after`, stopping (not erroring) at the first
    /// corrupt or binary line.
    pub fn entries_after(&self, after: u64) -> Result<Vec<WalEntry>, WalError> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut out = Vec::new();
        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => break,
            };
            if line.trim().is_empty() {
                continue;
            }
            let entry: WalEntry = match serde_json::from_str(&line) {
                Ok(e) => e,
                Err(_) => break,
            };
            if entry.seq > after {
                out.push(entry);
            }
        }
        Ok(out)
    }

    /// Rewrites the file keeping only entries with `seq >= floor`, used after
    /// a snapshot to bound WAL growth.
    pub fn truncate_before(&mut self, floor: u64) -> Result<(), WalError> {
        let kept = self.entries_after(floor.saturating_sub(1))?;
        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
        for entry in &kept {
            let line = serde_json::to_string(entry)?;
            writeln!(file, "{line}")?;
        }
        file.flush()?;
        file.sync_data()?;
        self.file = OpenOptions::new().append(true).read(true).open(&self.path)?;
        self.read_offset = 0;
        Ok(())
    }
}

fn read_raw_line<R: Read>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<usize> {
    let mut byte = [0u8; 1];
    let mut count = 0usize;
    loop {
        let n = reader.read(&mut byte)?;
        if n == 0 {
            return Ok(0);
        }
        count += 1;
        if byte[0] == b'\n' {
            return Ok(count);
        }
        buf.push(byte[0]);
    }
}

/// Rotates `path` to `path.bak`, pushing any existing `.bak`/`.bak.2` chain
/// down by one and dropping whatever falls off the end past
/// [`MAX_BAK_FILES`].
fn rotate_bak(path: &Path) -> Result<(), WalError> {
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak_path(path, n);
        let dst = bak_path(path, n + 1);
        if src.exists() {
            std::fs::rename(src, dst)?;
        }
    }
    std::fs::rename(path, bak_path(path, 1))?;
    Ok(())
}

fn bak_path(path: &Path, n: u8) -> PathBuf {
    if n == 1 {
        path.with_extension("bak")
    } else {
        path.with_extension(format!("bak.{n}"))
    }
}

#[path = "wal_tests.rs"]
#[cfg(test)]
mod tests;
