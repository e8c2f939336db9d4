// crates/authority-kernel-core/src/core/codes.rs
// ============================================================================
// Module: Authority Kernel Error Codes
// Description: Stable machine-readable error vocabulary and wire envelopes.
// Purpose: Give external transports one taxonomy to map onto HTTP statuses.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The kernel surfaces every failure under a stable code. The HTTP adapter
//! is an external collaborator; this module provides the serializable
//! success/failure envelopes and a status hint per code so adapters need no
//! kernel knowledge beyond this vocabulary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// Stable kernel error code vocabulary.
///
/// # Invariants
/// - Serialized forms never change; clients match on them programmatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No persona matched the requested sub-vertical and region.
    PersonaNotResolved,
    /// The resolved persona has no active policy.
    PolicyNotFound,
    /// The resolved persona has more than one active policy.
    MultipleActivePolicies,
    /// No territory matched the requested region.
    TerritoryNotConfigured,
    /// The matched territory does not cover the requested sub-vertical.
    TerritoryNotConfiguredForSubVertical,
    /// No envelope exists for the claimed identifier.
    EnvelopeNotSealed,
    /// The claimed envelope expired.
    EnvelopeExpired,
    /// The claimed envelope was revoked.
    EnvelopeRevoked,
    /// The runtime gate blocked the call.
    RuntimeGateViolation,
    /// Replay re-derived a different content hash.
    ReplayDriftDetected,
    /// A store-level authority invariant rejected the mutation.
    AuthorityInvarianceViolation,
    /// A child record may never move to a different enterprise.
    CrossEnterpriseForbidden,
    /// A workspace or identity may never move to a different workspace.
    WorkspaceReassignmentForbidden,
    /// Direct promotion to `SUPER_ADMIN` is forbidden.
    RoleEscalationForbidden,
    /// The suite must be frozen before this command.
    SuiteNotFrozen,
    /// The suite is not in a status that permits this command.
    InvalidStatus,
    /// Inter-rater correlation fell below the calibration gate.
    CorrelationTooLow,
    /// A scenario identifier already exists in the suite.
    DuplicateScenario,
    /// An invite token expired.
    TokenExpired,
    /// A request or config value failed validation.
    ValidationFailed,
}

impl ErrorCode {
    /// Returns the stable wire string for the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PersonaNotResolved => "PERSONA_NOT_RESOLVED",
            Self::PolicyNotFound => "POLICY_NOT_FOUND",
            Self::MultipleActivePolicies => "MULTIPLE_ACTIVE_POLICIES",
            Self::TerritoryNotConfigured => "TERRITORY_NOT_CONFIGURED",
            Self::TerritoryNotConfiguredForSubVertical => {
                "TERRITORY_NOT_CONFIGURED_FOR_SUB_VERTICAL"
            }
            Self::EnvelopeNotSealed => "ENVELOPE_NOT_SEALED",
            Self::EnvelopeExpired => "ENVELOPE_EXPIRED",
            Self::EnvelopeRevoked => "ENVELOPE_REVOKED",
            Self::RuntimeGateViolation => "RUNTIME_GATE_VIOLATION",
            Self::ReplayDriftDetected => "REPLAY_DRIFT_DETECTED",
            Self::AuthorityInvarianceViolation => "AUTHORITY_INVARIANCE_VIOLATION",
            Self::CrossEnterpriseForbidden => "CROSS_ENTERPRISE_FORBIDDEN",
            Self::WorkspaceReassignmentForbidden => "WORKSPACE_REASSIGNMENT_FORBIDDEN",
            Self::RoleEscalationForbidden => "ROLE_ESCALATION_FORBIDDEN",
            Self::SuiteNotFrozen => "SUITE_NOT_FROZEN",
            Self::InvalidStatus => "INVALID_STATUS",
            Self::CorrelationTooLow => "CORRELATION_TOO_LOW",
            Self::DuplicateScenario => "DUPLICATE_SCENARIO",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::ValidationFailed => "VALIDATION_FAILED",
        }
    }

    /// Returns the HTTP status hint for external adapters.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::ValidationFailed => 400,
            Self::AuthorityInvarianceViolation
            | Self::CrossEnterpriseForbidden
            | Self::WorkspaceReassignmentForbidden
            | Self::RoleEscalationForbidden
            | Self::RuntimeGateViolation => 403,
            Self::PersonaNotResolved
            | Self::PolicyNotFound
            | Self::TerritoryNotConfigured
            | Self::TerritoryNotConfiguredForSubVertical
            | Self::EnvelopeNotSealed => 404,
            Self::MultipleActivePolicies
            | Self::EnvelopeExpired
            | Self::EnvelopeRevoked
            | Self::ReplayDriftDetected
            | Self::SuiteNotFrozen
            | Self::InvalidStatus
            | Self::CorrelationTooLow
            | Self::DuplicateScenario => 409,
            Self::TokenExpired => 410,
        }
    }
}

// ============================================================================
// SECTION: Wire Envelopes
// ============================================================================

/// Failure body rendered by external transports.
///
/// # Invariants
/// - `success` is always `false`; extra details flatten into the object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiFailure {
    /// Always `false`.
    pub success: bool,
    /// Stable error code.
    pub error: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Code-specific detail fields.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl ApiFailure {
    /// Builds a failure body without extra details.
    #[must_use]
    pub fn new(error: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error,
            message: message.into(),
            details: Map::new(),
        }
    }

    /// Builds a failure body with extra detail fields.
    #[must_use]
    pub fn with_details(
        error: ErrorCode,
        message: impl Into<String>,
        details: Map<String, Value>,
    ) -> Self {
        Self {
            success: false,
            error,
            message: message.into(),
            details,
        }
    }
}

/// Success body rendered by external transports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSuccess<T> {
    /// Always `true`.
    pub success: bool,
    /// Operation payload.
    pub data: T,
}

impl<T> ApiSuccess<T> {
    /// Wraps a payload in the success envelope.
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
