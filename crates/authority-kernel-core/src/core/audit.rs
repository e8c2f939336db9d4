// crates/authority-kernel-core/src/core/audit.rs
// ============================================================================
// Module: Authority Kernel Audit Model
// Description: Append-only audit entries for authority mutations and gate events.
// Purpose: Record who changed what, when, and whether it succeeded.
// Dependencies: serde, serde_json, crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! Every mutation of authority state writes an audit entry in the same
//! transaction as the mutation, including rejected attempts. The log is
//! append-only and exposed read-only; indexes support actor, target, and
//! enterprise lookups over time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::EnterpriseId;
use crate::core::identifiers::IdentityId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Actor
// ============================================================================

/// Role attached to an audit actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    /// Platform-wide administrator.
    SuperAdmin,
    /// Enterprise-scoped administrator.
    EnterpriseAdmin,
    /// Regular execution identity.
    User,
    /// Kernel-internal actor (sweepers, governance runs).
    System,
}

/// Actor responsible for an audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditActor {
    /// Execution identity, absent for system actors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<IdentityId>,
    /// Role held when acting.
    pub role: ActorRole,
}

impl AuditActor {
    /// Returns the kernel-internal system actor.
    #[must_use]
    pub const fn system() -> Self {
        Self {
            actor_id: None,
            role: ActorRole::System,
        }
    }

    /// Returns an identity-backed actor.
    #[must_use]
    pub const fn identity(actor_id: IdentityId, role: ActorRole) -> Self {
        Self {
            actor_id: Some(actor_id),
            role,
        }
    }
}

// ============================================================================
// SECTION: Audit Entry
// ============================================================================

/// Append-only audit log entry.
///
/// # Invariants
/// - Entries are never updated or deleted.
/// - Each entry corresponds to exactly one committed mutation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Acting identity and role.
    pub actor: AuditActor,
    /// Action label (for example `envelope.revoke`).
    pub action: String,
    /// Target record kind (for example `envelope`).
    pub target_type: String,
    /// Target record identifier.
    pub target_id: String,
    /// Enterprise scope of the action, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_id: Option<EnterpriseId>,
    /// Whether the mutation was applied.
    pub success: bool,
    /// Failure or context reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Structured metadata payload.
    pub metadata: Value,
    /// Instant the action was attempted.
    pub occurred_at: Timestamp,
}

/// Inputs required to construct an audit entry.
pub struct AuditEntryParams {
    /// Acting identity and role.
    pub actor: AuditActor,
    /// Action label.
    pub action: String,
    /// Target record kind.
    pub target_type: String,
    /// Target record identifier.
    pub target_id: String,
    /// Enterprise scope of the action, when applicable.
    pub enterprise_id: Option<EnterpriseId>,
    /// Whether the mutation was applied.
    pub success: bool,
    /// Failure or context reason.
    pub reason: Option<String>,
    /// Structured metadata payload.
    pub metadata: Value,
}

impl AuditEntry {
    /// Creates an audit entry at the provided instant.
    #[must_use]
    pub fn new(params: AuditEntryParams, occurred_at: Timestamp) -> Self {
        Self {
            actor: params.actor,
            action: params.action,
            target_type: params.target_type,
            target_id: params.target_id,
            enterprise_id: params.enterprise_id,
            success: params.success,
            reason: params.reason,
            metadata: params.metadata,
            occurred_at,
        }
    }
}
