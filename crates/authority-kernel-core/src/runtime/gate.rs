// crates/authority-kernel-core/src/runtime/gate.rs
// ============================================================================
// Module: Authority Kernel Runtime Gate
// Description: Single admission point for reasoning calls.
// Purpose: Admit calls bound to a valid sealed envelope; record everything else.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The runtime gate is the only place a reasoning call may be blocked for
//! policy reasons. No envelope means no execution: the gate classifies every
//! claim against the envelope store and records a typed violation with full
//! request context for each block. The gate itself never errors for policy
//! reasons; only infrastructure failures propagate to the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::entropy::IdSource;
use crate::core::envelope::Envelope;
use crate::core::envelope::EnvelopeStatus;
use crate::core::gate::GateRequest;
use crate::core::gate::RuntimeGateViolation;
use crate::core::gate::ViolationCode;
use crate::core::gate::ViolationResolution;
use crate::core::identifiers::ViolationId;
use crate::core::time::Clock;
use crate::core::time::Timestamp;
use crate::interfaces::EnvelopeError;
use crate::interfaces::EnvelopeStore;
use crate::interfaces::ViolationLog;

// ============================================================================
// SECTION: Gate Decision
// ============================================================================

/// Outcome of one gate check.
///
/// # Invariants
/// - Exactly one of `envelope` and `violation` is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    /// True when the call was admitted.
    pub admitted: bool,
    /// The bound envelope for admitted calls.
    pub envelope: Option<Envelope>,
    /// The recorded violation for blocked calls.
    pub violation: Option<RuntimeGateViolation>,
}

// ============================================================================
// SECTION: Pure Classification
// ============================================================================

/// Classifies a claimed envelope against the decision table.
///
/// Returns `None` when the call should be admitted.
#[must_use]
pub fn classify_claim(
    claimed_empty: bool,
    envelope: Option<&Envelope>,
    now: Timestamp,
) -> Option<ViolationCode> {
    if claimed_empty {
        return Some(ViolationCode::NoEnvelope);
    }
    match envelope {
        None => Some(ViolationCode::InvalidEnvelope),
        Some(envelope) => match envelope.status {
            EnvelopeStatus::Revoked => Some(ViolationCode::RevokedEnvelope),
            EnvelopeStatus::Expired => Some(ViolationCode::ExpiredEnvelope),
            EnvelopeStatus::Sealed if envelope.is_past_expiry(now) => {
                Some(ViolationCode::ExpiredEnvelope)
            }
            EnvelopeStatus::Sealed => None,
        },
    }
}

// ============================================================================
// SECTION: Runtime Gate
// ============================================================================

/// Runtime gate bound to an envelope store and violation log.
pub struct RuntimeGate<'a, E: EnvelopeStore, V: ViolationLog> {
    /// Envelope registry consulted for claims.
    envelopes: &'a E,
    /// Violation log receiving blocked calls.
    violations: &'a V,
    /// Identifier source for violation records.
    ids: &'a dyn IdSource,
    /// Injected clock.
    clock: &'a dyn Clock,
}

impl<'a, E: EnvelopeStore, V: ViolationLog> RuntimeGate<'a, E, V> {
    /// Creates a runtime gate.
    #[must_use]
    pub const fn new(
        envelopes: &'a E,
        violations: &'a V,
        ids: &'a dyn IdSource,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            envelopes,
            violations,
            ids,
            clock,
        }
    }

    /// Checks one reasoning call against the decision table.
    ///
    /// Admission returns the envelope so the caller can use its bound
    /// persona and policy; blocks are recorded and returned, never thrown.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] only for infrastructure failures, which
    /// callers may retry.
    pub fn check(&self, request: GateRequest) -> Result<GateDecision, EnvelopeError> {
        let now = self.clock.now();
        let envelope = if request.claimed.is_empty() {
            None
        } else {
            match self.envelopes.find(&request.claimed) {
                Ok(envelope) => envelope,
                // A malformed or contradictory claim is a policy block, not
                // an infrastructure failure.
                Err(EnvelopeError::Invalid(_)) => None,
                Err(err) => return Err(err),
            }
        };
        match classify_claim(request.claimed.is_empty(), envelope.as_ref(), now) {
            None => Ok(GateDecision {
                admitted: true,
                envelope,
                violation: None,
            }),
            Some(code) => {
                let violation = RuntimeGateViolation {
                    violation_id: ViolationId::new(self.ids.next_id()),
                    violation_code: code,
                    request,
                    resolution_status: ViolationResolution::Open,
                    resolution_note: None,
                    occurred_at: now,
                };
                self.violations.record(violation.clone())?;
                Ok(GateDecision {
                    admitted: false,
                    envelope: None,
                    violation: Some(violation),
                })
            }
        }
    }
}
