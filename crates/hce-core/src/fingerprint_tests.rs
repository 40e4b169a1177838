// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn same_segments_yield_same_fingerprint() {
    let a = Fingerprint::from_segments([b"echo ok".as_slice(), b"lint-plugin".as_slice()]);
    let b = Fingerprint::from_segments([b"echo ok".as_slice(), b"lint-plugin".as_slice()]);
    assert_eq!(a, b);
    assert_eq!(a.to_hex(), b.to_hex());
}

#[test]
fn segment_boundaries_are_not_confusable() {
    // Without length-prefixing, ("ab","c") and ("a","bc") would collide.
    let a = Fingerprint::from_segments([b"ab".as_slice(), b"c".as_slice()]);
    let b = Fingerprint::from_segments([b"a".as_slice(), b"bc".as_slice()]);
    assert_ne!(a, b);
}

#[test]
fn hex_roundtrips_through_display_and_parse() {
    let fp = Fingerprint::from_segments([b"hello".as_slice()]);
    let hex = fp.to_hex();
    let parsed: Fingerprint = hex.parse().unwrap();
    assert_eq!(fp, parsed);
}

#[test]
fn prefix_is_a_hex_substring() {
    let fp = Fingerprint::from_segments([b"dir".as_slice()]);
    assert_eq!(fp.prefix(4), &fp.to_hex()[..4]);
}

#[test]
fn serde_roundtrip() {
    let fp = Fingerprint::from_segments([b"x".as_slice()]);
    let json = serde_json::to_string(&fp).unwrap();
    let back: Fingerprint = serde_json::from_str(&json).unwrap();
    assert_eq!(fp, back);
}
