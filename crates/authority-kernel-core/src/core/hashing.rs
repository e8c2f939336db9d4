// crates/authority-kernel-core/src/core/hashing.rs
// ============================================================================
// Module: Authority Kernel Canonical Hashing
// Description: RFC 8785 JSON canonicalization and SHA-256 content addressing.
// Purpose: Provide the deterministic digests that key envelopes and manifests.
// Dependencies: serde, serde_jcs, sha2, thiserror
// ============================================================================

//! ## Overview
//! Envelopes, scenario manifests, and replay diffs are addressed by SHA-256
//! over RFC 8785 (JCS) canonical JSON: keys sorted ASCII, no insignificant
//! whitespace, UTF-8 bytes. Digests render as lowercase hex and are the only
//! identity the replay engine trusts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing or parsing canonical hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
    /// A stored digest string is not 64 lowercase hex characters.
    #[error("malformed sha-256 digest: {0}")]
    MalformedDigest(String),
}

// ============================================================================
// SECTION: Content Hash
// ============================================================================

/// Lowercase-hex SHA-256 digest of canonical content.
///
/// # Invariants
/// - Always exactly 64 lowercase hexadecimal characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Builds a digest from raw hash bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex_encode(bytes))
    }

    /// Parses a stored digest string, validating shape and case.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::MalformedDigest`] when the input is not 64
    /// lowercase hex characters.
    pub fn parse(value: &str) -> Result<Self, HashError> {
        let well_formed = value.len() == 64
            && value.bytes().all(|b| b.is_ascii_digit() || (b'a' ..= b'f').contains(&b));
        if well_formed {
            Ok(Self(value.to_string()))
        } else {
            Err(HashError::MalformedDigest(value.to_string()))
        }
    }

    /// Returns the digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes the canonical JSON form of a serializable value.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn hash_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<ContentHash, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(&bytes))
}

/// Hashes raw bytes with SHA-256.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    ContentHash::from_bytes(&digest)
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
