// crates/authority-kernel-core/src/core/signature.rs
// ============================================================================
// Module: Authority Kernel Trace Signatures
// Description: HMAC-SHA256 signing for immutable interaction records.
// Purpose: Make per-call traces tamper-evident under an operator-held secret.
// Dependencies: hmac, sha2, subtle, thiserror
// ============================================================================

//! ## Overview
//! Every interaction record is signed with
//! `HMAC-SHA256(secret, interaction_id ":" envelope_hash ":" outcome)`.
//! Signatures render as lowercase hex and are compared in constant time so
//! verification leaks no timing information about the stored value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::core::hashing::ContentHash;
use crate::core::identifiers::InteractionId;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when handling trace signing material.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The signing secret is empty or unusable as HMAC key material.
    #[error("trace signing secret must be non-empty key material")]
    InvalidSecret,
}

// ============================================================================
// SECTION: Signing Secret
// ============================================================================

/// HMAC-SHA256 keyed by the trace signing secret.
type HmacSha256 = Hmac<Sha256>;

/// Operator-provided secret for trace signing.
///
/// # Invariants
/// - Never empty; required in production profiles.
/// - The raw bytes never appear in logs or error messages.
#[derive(Clone)]
pub struct SigningSecret {
    /// Keyed MAC prototype cloned for each signing operation.
    mac: HmacSha256,
}

impl SigningSecret {
    /// Wraps raw secret bytes, keying the MAC once at construction.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::InvalidSecret`] when the secret is empty.
    pub fn new(bytes: impl AsRef<[u8]>) -> Result<Self, SignatureError> {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return Err(SignatureError::InvalidSecret);
        }
        let mac = HmacSha256::new_from_slice(bytes).map_err(|_| SignatureError::InvalidSecret)?;
        Ok(Self {
            mac,
        })
    }
}

// ============================================================================
// SECTION: Signing
// ============================================================================

/// Signs an interaction, returning the lowercase-hex signature.
#[must_use]
pub fn sign_interaction(
    secret: &SigningSecret,
    interaction_id: &InteractionId,
    envelope_hash: &ContentHash,
    outcome: &str,
) -> String {
    let message = format!("{interaction_id}:{envelope_hash}:{outcome}");
    let mut mac = secret.mac.clone();
    mac.update(message.as_bytes());
    let digest = mac.finalize().into_bytes();
    ContentHash::from_bytes(&digest).as_str().to_string()
}

/// Verifies a stored signature in constant time.
#[must_use]
pub fn verify_interaction_signature(
    secret: &SigningSecret,
    interaction_id: &InteractionId,
    envelope_hash: &ContentHash,
    outcome: &str,
    stored_signature: &str,
) -> bool {
    let expected = sign_interaction(secret, interaction_id, envelope_hash, outcome);
    constant_time_eq(expected.as_bytes(), stored_signature.as_bytes())
}

// ============================================================================
// SECTION: Constant-Time Comparison
// ============================================================================

/// Compares two byte slices in constant time.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
