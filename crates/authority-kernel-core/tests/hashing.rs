// crates/authority-kernel-core/tests/hashing.rs
// ============================================================================
// Module: Canonical Hashing Tests
// Description: Verifies RFC 8785 canonical JSON hashing behavior.
// ============================================================================
//! ## Overview
//! Ensures canonical JSON hashing is deterministic across key ordering and
//! re-parsing, produces known digests, and that digest parsing rejects
//! malformed values.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use authority_kernel_core::ContentHash;
use authority_kernel_core::HashError;
use authority_kernel_core::canonical_json_bytes;
use authority_kernel_core::hash_bytes;
use authority_kernel_core::hash_canonical_json;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

#[test]
fn canonical_hash_is_order_independent_for_maps() {
    let mut map_a = Map::new();
    map_a.insert("b".to_string(), json!(2));
    map_a.insert("a".to_string(), json!(1));

    let mut map_b = Map::new();
    map_b.insert("a".to_string(), json!(1));
    map_b.insert("b".to_string(), json!(2));

    let hash_a = hash_canonical_json(&Value::Object(map_a)).expect("hash a");
    let hash_b = hash_canonical_json(&Value::Object(map_b)).expect("hash b");

    assert_eq!(hash_a, hash_b);
}

#[test]
fn canonical_bytes_survive_reparse() {
    let value = json!({"z": [1, 2, {"k": "v"}], "a": true, "m": "text"});
    let first = canonical_json_bytes(&value).expect("canonical bytes");
    let reparsed: Value = serde_json::from_slice(&first).expect("reparse");
    let second = canonical_json_bytes(&reparsed).expect("canonical bytes again");
    assert_eq!(first, second, "canonicalize must be a fixed point");
}

#[test]
fn canonical_hash_consistency_across_calls() {
    let value = json!({"a": 1, "b": [1, 2, 3], "c": {"nested": true}});
    let hash1 = hash_canonical_json(&value).expect("hash1");
    let hash2 = hash_canonical_json(&value).expect("hash2");
    assert_eq!(hash1, hash2, "hash must be deterministic");
}

// ============================================================================
// SECTION: Golden SHA-256 Digests
// ============================================================================

#[test]
fn golden_hash_empty_object() {
    // SHA-256 of "{}"
    let digest = hash_canonical_json(&json!({})).expect("hash");
    assert_eq!(
        digest.as_str(),
        "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
    );
}

#[test]
fn golden_hash_empty_array() {
    // SHA-256 of "[]"
    let digest = hash_canonical_json(&json!([])).expect("hash");
    assert_eq!(
        digest.as_str(),
        "4f53cda18c2baa0c0354bb5f9a3ecbe5ed12ab4d8e11ba873c2f11161202b945"
    );
}

#[test]
fn golden_hash_bytes_direct() {
    // SHA-256 of "test"
    let digest = hash_bytes(b"test");
    assert_eq!(
        digest.as_str(),
        "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
    );
}

#[test]
fn golden_hash_empty_bytes() {
    // SHA-256 of empty input
    let digest = hash_bytes(b"");
    assert_eq!(
        digest.as_str(),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

// ============================================================================
// SECTION: Digest Parsing
// ============================================================================

#[test]
fn digest_renders_lowercase_hex() {
    let digest = hash_bytes(b"abc");
    assert_eq!(digest.as_str().len(), 64);
    assert!(!digest.as_str().chars().any(char::is_uppercase), "no uppercase chars allowed");
}

#[test]
fn parse_accepts_valid_digest() {
    let digest = hash_bytes(b"payload");
    let parsed = ContentHash::parse(digest.as_str()).expect("parse digest");
    assert_eq!(parsed, digest);
}

#[test]
fn parse_rejects_uppercase() {
    let err = ContentHash::parse(&"A".repeat(64)).unwrap_err();
    assert!(matches!(err, HashError::MalformedDigest(_)));
}

#[test]
fn parse_rejects_wrong_length() {
    let err = ContentHash::parse("abc123").unwrap_err();
    assert!(matches!(err, HashError::MalformedDigest(_)));
}

#[test]
fn parse_rejects_non_hex() {
    let err = ContentHash::parse(&"g".repeat(64)).unwrap_err();
    assert!(matches!(err, HashError::MalformedDigest(_)));
}
