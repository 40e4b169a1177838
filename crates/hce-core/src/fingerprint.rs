// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content-addressed fingerprint type.
//!
//! A [`Fingerprint`] is the cache key produced by the fingerprint engine: a
//! stable 256-bit digest over a hook's normalized command, plugin identity,
//! effective config, tracked-file contents, and whitelisted environment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A 256-bit content-addressed digest, serialized as a lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Build a fingerprint by hashing a fixed-order sequence of
    /// length-prefixed byte segments.
    ///
    /// Length-prefixing (rather than joining with a separator byte) keeps
    /// the digest independent of any delimiter appearing inside a segment.
    pub fn from_segments<'a, I: IntoIterator<Item = &'a [u8]>>(segments: I) -> Self {
        let mut hasher = Sha256::new();
        for segment in segments {
            hasher.update((segment.len() as u64).to_be_bytes());
            hasher.update(segment);
        }
        let digest: [u8; 32] = hasher.finalize().into();
        Self(digest)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// First `n` hex characters, used for cache directory sharding
    /// (`cache/<prefix>/<fingerprint>`).
    pub fn prefix(&self, n: usize) -> String {
        let hex = self.to_hex();
        hex.chars().take(n).collect()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid fingerprint hex string: {0}")]
pub struct ParseFingerprintError(String);

impl FromStr for Fingerprint {
    type Err = ParseFingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(ParseFingerprintError(s.to_string()));
        }
        let mut out = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let pair =
                std::str::from_utf8(chunk).map_err(|_| ParseFingerprintError(s.to_string()))?;
            out[i] = u8::from_str_radix(pair, 16).map_err(|_| ParseFingerprintError(s.to_string()))?;
        }
        Ok(Self(out))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
