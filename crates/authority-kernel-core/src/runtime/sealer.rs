// crates/authority-kernel-core/src/runtime/sealer.rs
// ============================================================================
// Module: Authority Kernel Envelope Sealer
// Description: Resolution-backed envelope sealing pipeline.
// Purpose: Turn a seal request into an idempotently sealed, hash-addressed
// envelope bound to one persona, policy, and territory.
// Dependencies: crate::{core, interfaces, runtime::resolver}
// ============================================================================

//! ## Overview
//! Sealing is the production caller of the resolver: it resolves the
//! persona, its single active policy, and (when a region is supplied) the
//! territory, assembles the canonical payload, hashes it, and commits it
//! through the envelope store's idempotent seal. Resolution failures refuse
//! the seal; nothing is written.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::codes::ErrorCode;
use crate::core::entropy::IdSource;
use crate::core::envelope::CANONICAL_ENVELOPE_VERSION;
use crate::core::envelope::Envelope;
use crate::core::envelope::EnvelopeBody;
use crate::core::envelope::EnvelopeBodyError;
use crate::core::envelope::EnvelopeStatus;
use crate::core::envelope::SealOutcome;
use crate::core::identifiers::EnterpriseId;
use crate::core::identifiers::EnvelopeId;
use crate::core::identifiers::IdentityId;
use crate::core::identifiers::RegionCode;
use crate::core::identifiers::SubVerticalId;
use crate::core::identifiers::WorkspaceId;
use crate::core::time::Clock;
use crate::core::time::Timestamp;
use crate::interfaces::AuthorityStore;
use crate::interfaces::EnvelopeError;
use crate::interfaces::EnvelopeStore;
use crate::runtime::resolver::ResolveError;
use crate::runtime::resolver::Resolver;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the sealing pipeline.
#[derive(Debug, Error)]
pub enum SealError {
    /// Persona, policy, or territory resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// The payload failed canonical validation.
    #[error(transparent)]
    Body(#[from] EnvelopeBodyError),
    /// The envelope store rejected the seal.
    #[error(transparent)]
    Store(#[from] EnvelopeError),
}

impl SealError {
    /// Returns the stable error code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Resolve(err) => err.code(),
            Self::Body(_) => ErrorCode::ValidationFailed,
            Self::Store(_) => ErrorCode::EnvelopeNotSealed,
        }
    }
}

// ============================================================================
// SECTION: Seal Request
// ============================================================================

/// Inputs to the sealing pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealRequest {
    /// Tenant (enterprise) scope.
    pub tenant_id: EnterpriseId,
    /// Workspace scope.
    pub workspace_id: WorkspaceId,
    /// Optional execution identity.
    pub user_id: Option<IdentityId>,
    /// Sub-vertical driving persona resolution.
    pub sub_vertical_id: SubVerticalId,
    /// Optional region driving LOCAL/REGIONAL persona probes and territory
    /// resolution.
    pub region_code: Option<RegionCode>,
    /// Opaque context payload (JSON object).
    pub content: Value,
    /// Actor sealing the envelope.
    pub sealed_by: String,
    /// Optional expiry instant.
    pub expires_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Sealer
// ============================================================================

/// Envelope sealer binding resolution to the envelope store.
pub struct EnvelopeSealer<'a, A: AuthorityStore, E: EnvelopeStore> {
    /// Authority store read by the resolver.
    authority: &'a A,
    /// Envelope registry receiving seals.
    envelopes: &'a E,
    /// Identifier source for new envelopes.
    ids: &'a dyn IdSource,
    /// Injected clock stamping `sealed_at`.
    clock: &'a dyn Clock,
}

impl<'a, A: AuthorityStore, E: EnvelopeStore> EnvelopeSealer<'a, A, E> {
    /// Creates a sealer.
    #[must_use]
    pub const fn new(
        authority: &'a A,
        envelopes: &'a E,
        ids: &'a dyn IdSource,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            authority,
            envelopes,
            ids,
            clock,
        }
    }

    /// Resolves, canonicalizes, hashes, and seals an envelope.
    ///
    /// Re-sealing a payload that hashes identically returns the existing
    /// envelope with `is_new = false`.
    ///
    /// # Errors
    ///
    /// Returns [`SealError::Resolve`] when resolution fails (nothing is
    /// written), [`SealError::Body`] for invalid payloads, and
    /// [`SealError::Store`] when the envelope store rejects the seal.
    pub fn seal(&self, request: SealRequest) -> Result<SealOutcome, SealError> {
        let resolver = Resolver::new(self.authority);
        let persona =
            resolver.resolve_persona(&request.sub_vertical_id, request.region_code.as_ref())?;
        let policy = resolver.active_policy(persona.persona_id)?;
        let territory = match request.region_code.as_ref() {
            Some(region_code) => {
                Some(resolver.resolve_territory(region_code, Some(&request.sub_vertical_id))?)
            }
            None => None,
        };

        let body = EnvelopeBody {
            envelope_version: CANONICAL_ENVELOPE_VERSION.to_string(),
            tenant_id: request.tenant_id,
            workspace_id: request.workspace_id,
            user_id: request.user_id,
            persona_id: persona.persona_id,
            policy_id: policy.policy_id,
            policy_version: policy.policy_version,
            territory_id: territory.as_ref().map(|resolution| resolution.territory_id),
            persona_resolution_path: persona.resolution_path,
            persona_resolution_scope: persona.scope,
            territory_resolution_path: territory
                .map_or_else(|| "none".to_string(), |resolution| resolution.resolution_path),
            content: request.content,
            sealed_at: self.clock.now(),
            sealed_by: request.sealed_by,
            expires_at: request.expires_at,
        };
        body.validate()?;
        let sha256_hash = body.compute_hash()?;

        let envelope = Envelope {
            envelope_id: EnvelopeId::new(self.ids.next_id()),
            sha256_hash,
            body,
            status: EnvelopeStatus::Sealed,
            revoked_at: None,
            revoked_by: None,
            expired_at: None,
        };
        Ok(self.envelopes.seal(envelope)?)
    }
}
