// crates/authority-kernel-core/src/core/envelope.rs
// ============================================================================
// Module: Authority Kernel Envelope Model
// Description: Canonical envelope payload, sealed record, and status machine.
// Purpose: Bind every reasoning call to an immutable, hash-addressed context.
// Dependencies: serde, serde_json, crate::core::{hashing, identifiers, time}
// ============================================================================

//! ## Overview
//! An envelope is the immutable bundle of context a reasoning call must
//! quote: tenant, persona, policy, territory, and content. The payload has a
//! fixed field vocabulary; its SHA-256 over RFC 8785 canonical JSON is the
//! envelope's identity. Once sealed, the only transitions are to the
//! terminal `EXPIRED` and `REVOKED` states.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::authority::PersonaScope;
use crate::core::hashing::ContentHash;
use crate::core::hashing::HashError;
use crate::core::hashing::canonical_json_bytes;
use crate::core::hashing::hash_bytes;
use crate::core::identifiers::EnterpriseId;
use crate::core::identifiers::EnvelopeId;
use crate::core::identifiers::IdentityId;
use crate::core::identifiers::PersonaId;
use crate::core::identifiers::PolicyId;
use crate::core::identifiers::TerritoryId;
use crate::core::identifiers::WorkspaceId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Canonicalization contract version accepted by this kernel build.
///
/// Changing canonicalization requires a new version tag and a migration
/// plan; sealing rejects any other tag.
pub const CANONICAL_ENVELOPE_VERSION: &str = "1.0";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when building or validating envelope payloads.
#[derive(Debug, Error)]
pub enum EnvelopeBodyError {
    /// The envelope version tag is not supported by this kernel build.
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(String),
    /// Envelope content must be a JSON object.
    #[error("envelope content must be a json object")]
    ContentNotObject,
    /// Canonicalization failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

// ============================================================================
// SECTION: Envelope Body
// ============================================================================

/// Canonical envelope payload.
///
/// # Invariants
/// - Field vocabulary and presence are part of the wire contract; the
///   content hash is SHA-256 over the RFC 8785 canonical JSON of this value.
/// - Optional fields are omitted (not null) when absent.
/// - Unknown fields are rejected at parse time, so sealing refuses payloads
///   outside the fixed schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvelopeBody {
    /// Canonicalization contract version tag.
    pub envelope_version: String,
    /// Tenant (enterprise) identifier.
    pub tenant_id: EnterpriseId,
    /// Workspace identifier.
    pub workspace_id: WorkspaceId,
    /// Optional execution identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<IdentityId>,
    /// Resolved persona.
    pub persona_id: PersonaId,
    /// Resolved policy.
    pub policy_id: PolicyId,
    /// Resolved policy version.
    pub policy_version: u32,
    /// Resolved territory, when a region was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub territory_id: Option<TerritoryId>,
    /// Audit path recorded by persona resolution.
    pub persona_resolution_path: String,
    /// Scope at which persona resolution matched.
    pub persona_resolution_scope: PersonaScope,
    /// Audit path recorded by territory resolution.
    pub territory_resolution_path: String,
    /// Opaque context payload (JSON object).
    pub content: Value,
    /// Sealing instant.
    pub sealed_at: Timestamp,
    /// Actor that sealed the envelope.
    pub sealed_by: String,
    /// Optional expiry instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

impl EnvelopeBody {
    /// Validates the version tag and content shape.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeBodyError`] when the version is unknown or the
    /// content is not a JSON object.
    pub fn validate(&self) -> Result<(), EnvelopeBodyError> {
        if self.envelope_version != CANONICAL_ENVELOPE_VERSION {
            return Err(EnvelopeBodyError::UnsupportedVersion(self.envelope_version.clone()));
        }
        if !self.content.is_object() {
            return Err(EnvelopeBodyError::ContentNotObject);
        }
        Ok(())
    }

    /// Returns the canonical JSON bytes of this payload.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeBodyError::Hash`] when canonicalization fails.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, EnvelopeBodyError> {
        Ok(canonical_json_bytes(self)?)
    }

    /// Computes the content hash over the canonical payload.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeBodyError::Hash`] when canonicalization fails.
    pub fn compute_hash(&self) -> Result<ContentHash, EnvelopeBodyError> {
        Ok(hash_bytes(&self.canonical_bytes()?))
    }
}

// ============================================================================
// SECTION: Envelope Status
// ============================================================================

/// Envelope lifecycle status.
///
/// # Invariants
/// - `Sealed` is the only non-terminal state; transitions are one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvelopeStatus {
    /// Sealed and admissible at the runtime gate.
    Sealed,
    /// Expired past `expires_at`; terminal.
    Expired,
    /// Revoked by an operator; terminal.
    Revoked,
}

impl EnvelopeStatus {
    /// Returns true for terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Expired | Self::Revoked)
    }

    /// Returns true when the transition to `target` is allowed.
    #[must_use]
    pub const fn may_transition_to(self, target: Self) -> bool {
        matches!((self, target), (Self::Sealed, Self::Expired | Self::Revoked))
    }
}

// ============================================================================
// SECTION: Sealed Envelope
// ============================================================================

/// Sealed envelope record held by the envelope store.
///
/// # Invariants
/// - `sha256_hash` equals the hash of the canonical body and is unique.
/// - Body content never changes after sealing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Envelope identifier.
    pub envelope_id: EnvelopeId,
    /// Content hash identity.
    pub sha256_hash: ContentHash,
    /// Canonical payload.
    pub body: EnvelopeBody,
    /// Lifecycle status.
    pub status: EnvelopeStatus,
    /// Instant of transition to `Revoked`, when revoked.
    pub revoked_at: Option<Timestamp>,
    /// Actor that revoked the envelope, when revoked.
    pub revoked_by: Option<String>,
    /// Instant of transition to `Expired`, when expired.
    pub expired_at: Option<Timestamp>,
}

impl Envelope {
    /// Returns true when the envelope is past its expiry at `now`.
    ///
    /// A `SEALED` envelope whose `expires_at` already passed fails the gate
    /// even before the expiry sweeper transitions it.
    #[must_use]
    pub fn is_past_expiry(&self, now: Timestamp) -> bool {
        self.body.expires_at.is_some_and(|expires_at| expires_at.is_before(now))
    }
}

// ============================================================================
// SECTION: Seal Outcome
// ============================================================================

/// Result of an idempotent seal operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealOutcome {
    /// Envelope identifier (existing on idempotent re-seal).
    pub envelope_id: EnvelopeId,
    /// Content hash identity.
    pub sha256_hash: ContentHash,
    /// True when this call created the envelope.
    pub is_new: bool,
    /// Sealing instant of the stored envelope.
    pub sealed_at: Timestamp,
}

// ============================================================================
// SECTION: Envelope Locator
// ============================================================================

/// Claimed envelope identifiers supplied by callers.
///
/// # Invariants
/// - At least one identifier must be present for lookups; both absent is the
///   runtime gate's `NO_ENVELOPE` misuse case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeLocator {
    /// Claimed envelope identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envelope_id: Option<EnvelopeId>,
    /// Claimed content hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256_hash: Option<ContentHash>,
}

impl EnvelopeLocator {
    /// Builds a locator from an envelope identifier.
    #[must_use]
    pub const fn by_id(envelope_id: EnvelopeId) -> Self {
        Self {
            envelope_id: Some(envelope_id),
            sha256_hash: None,
        }
    }

    /// Builds a locator from a content hash.
    #[must_use]
    pub const fn by_hash(sha256_hash: ContentHash) -> Self {
        Self {
            envelope_id: None,
            sha256_hash: Some(sha256_hash),
        }
    }

    /// Returns true when no identifier is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.envelope_id.is_none() && self.sha256_hash.is_none()
    }
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Verification status of a claimed envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerifyStatus {
    /// Sealed and within its validity window.
    Valid,
    /// No envelope exists for the claimed identifier.
    NotSealed,
    /// Envelope was revoked.
    Revoked,
    /// Envelope expired (by status or past `expires_at`).
    Expired,
}

/// Verification outcome with identifying details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOutcome {
    /// Verification status.
    pub status: VerifyStatus,
    /// Envelope identifier when the envelope exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envelope_id: Option<EnvelopeId>,
    /// Content hash when the envelope exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256_hash: Option<ContentHash>,
    /// Instant the verification was performed.
    pub checked_at: Timestamp,
}

impl VerifyOutcome {
    /// Classifies a looked-up envelope at `now`.
    #[must_use]
    pub fn classify(envelope: Option<&Envelope>, now: Timestamp) -> Self {
        match envelope {
            None => Self {
                status: VerifyStatus::NotSealed,
                envelope_id: None,
                sha256_hash: None,
                checked_at: now,
            },
            Some(envelope) => {
                let status = match envelope.status {
                    EnvelopeStatus::Revoked => VerifyStatus::Revoked,
                    EnvelopeStatus::Expired => VerifyStatus::Expired,
                    EnvelopeStatus::Sealed if envelope.is_past_expiry(now) => VerifyStatus::Expired,
                    EnvelopeStatus::Sealed => VerifyStatus::Valid,
                };
                Self {
                    status,
                    envelope_id: Some(envelope.envelope_id),
                    sha256_hash: Some(envelope.sha256_hash.clone()),
                    checked_at: now,
                }
            }
        }
    }
}
