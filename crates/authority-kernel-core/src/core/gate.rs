// crates/authority-kernel-core/src/core/gate.rs
// ============================================================================
// Module: Authority Kernel Gate Model
// Description: Runtime gate requests, violation codes, and violation records.
// Purpose: Define the vocabulary of the single admission point for reasoning calls.
// Dependencies: serde, serde_json, crate::core::{envelope, identifiers, time}
// ============================================================================

//! ## Overview
//! Every reasoning call passes the runtime gate with a claimed envelope
//! identifier. Blocked calls are captured as append-only violation records
//! carrying the full request context for compliance review; resolution of a
//! violation is human-driven and metadata-only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::envelope::EnvelopeLocator;
use crate::core::identifiers::EnterpriseId;
use crate::core::identifiers::IdentityId;
use crate::core::identifiers::ViolationId;
use crate::core::identifiers::WorkspaceId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Origin of a gated reasoning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateSource {
    /// Benchmark harness traffic.
    SalesBench,
    /// External API traffic.
    Api,
    /// Kernel-internal traffic.
    Internal,
}

/// Full request context presented at the gate.
///
/// # Invariants
/// - `claimed` may be empty; that is the `NO_ENVELOPE` misuse case, not an
///   input error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateRequest {
    /// Request origin.
    pub source: GateSource,
    /// Endpoint being invoked.
    pub endpoint: String,
    /// HTTP-style method label.
    pub method: String,
    /// Tenant (enterprise) on whose behalf the call runs.
    pub tenant_id: EnterpriseId,
    /// Workspace scope, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<WorkspaceId>,
    /// Execution identity, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<IdentityId>,
    /// Claimed envelope identifiers.
    pub claimed: EnvelopeLocator,
}

// ============================================================================
// SECTION: Violations
// ============================================================================

/// Gate violation classification.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    /// No envelope identifier was claimed.
    NoEnvelope,
    /// The claimed identifier matches no sealed envelope.
    InvalidEnvelope,
    /// The claimed envelope expired.
    ExpiredEnvelope,
    /// The claimed envelope was revoked.
    RevokedEnvelope,
}

/// Human-driven resolution state of a recorded violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationResolution {
    /// Recorded and awaiting review.
    #[default]
    Open,
    /// Reviewed and acknowledged.
    Acknowledged,
    /// Review finished.
    Resolved,
}

/// Append-only record of a blocked reasoning call.
///
/// # Invariants
/// - The record itself is never deleted; only `resolution_status` and
///   `resolution_note` change, through the violation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeGateViolation {
    /// Violation identifier.
    pub violation_id: ViolationId,
    /// Violation classification.
    pub violation_code: ViolationCode,
    /// Full request context at the time of the block.
    pub request: GateRequest,
    /// Human-driven resolution state.
    pub resolution_status: ViolationResolution,
    /// Optional reviewer note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_note: Option<String>,
    /// Instant the call was blocked.
    pub occurred_at: Timestamp,
}
