// crates/authority-kernel-core/src/core/authority.rs
// ============================================================================
// Module: Authority Kernel Authority Model
// Description: Enterprises, workspaces, execution identities, personas,
// policies, and territories with their invariant vocabularies.
// Purpose: Define the authoritative records every reasoning call resolves against.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The authority model pins every execution to exactly one enterprise,
//! workspace, persona/policy, and territory. Records carry status
//! vocabularies that are part of the wire contract; guard helpers in this
//! module are pure so every store backend enforces identical invariants.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::EnterpriseId;
use crate::core::identifiers::IdentityId;
use crate::core::identifiers::PersonaId;
use crate::core::identifiers::PolicyId;
use crate::core::identifiers::RegionCode;
use crate::core::identifiers::SubVerticalId;
use crate::core::identifiers::TerritoryId;
use crate::core::identifiers::WorkspaceId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Enterprise
// ============================================================================

/// Enterprise classification.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnterpriseType {
    /// Production enterprise.
    Real,
    /// Demonstration enterprise.
    Demo,
}

/// Enterprise lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnterpriseStatus {
    /// Enterprise is active.
    Active,
    /// Enterprise is suspended; children remain readable.
    Suspended,
    /// Enterprise is soft-deleted.
    Deleted,
}

/// Tenant root record.
///
/// # Invariants
/// - `enterprise_id` is immutable for the record's lifetime.
/// - `name` and `region` are non-empty.
/// - No child record is ever reassigned to a different enterprise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enterprise {
    /// Enterprise identifier.
    pub enterprise_id: EnterpriseId,
    /// Display name (non-empty).
    pub name: String,
    /// Enterprise classification.
    pub enterprise_type: EnterpriseType,
    /// Home region label (non-empty).
    pub region: String,
    /// Lifecycle status.
    pub status: EnterpriseStatus,
    /// Creation instant.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Workspace
// ============================================================================

/// Workspace lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkspaceStatus {
    /// Workspace is active.
    Active,
    /// Workspace is suspended.
    Suspended,
}

/// Workspace record pinned to one enterprise forever.
///
/// # Invariants
/// - `enterprise_id` never changes after creation.
/// - Deletion is soft: `deleted_at` is set, the row is never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    /// Workspace identifier.
    pub workspace_id: WorkspaceId,
    /// Owning enterprise (immutable).
    pub enterprise_id: EnterpriseId,
    /// Sub-vertical this workspace operates in.
    pub sub_vertical_id: SubVerticalId,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: WorkspaceStatus,
    /// Creation instant.
    pub created_at: Timestamp,
    /// Soft-delete instant, when deleted.
    pub deleted_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Execution Identity
// ============================================================================

/// Role held by an execution identity.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityRole {
    /// Platform-wide administrator.
    SuperAdmin,
    /// Enterprise-scoped administrator.
    EnterpriseAdmin,
    /// Regular execution identity.
    User,
}

impl IdentityRole {
    /// Returns true when a direct transition to `target` is permitted.
    ///
    /// Direct jumps from `USER` or `ENTERPRISE_ADMIN` to `SUPER_ADMIN` are
    /// forbidden; the approval flow for that promotion lives outside the
    /// kernel.
    #[must_use]
    pub const fn may_transition_to(self, target: Self) -> bool {
        !matches!(
            (self, target),
            (Self::User | Self::EnterpriseAdmin, Self::SuperAdmin)
        )
    }
}

/// Execution mode for an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityMode {
    /// Production traffic.
    Real,
    /// Demonstration traffic.
    Demo,
}

/// Identity lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityStatus {
    /// Identity is active.
    Active,
    /// Identity is suspended.
    Suspended,
}

/// Execution identity pinning a request to an enterprise and workspace.
///
/// # Invariants
/// - `enterprise_id` and `workspace_id` never change after creation.
/// - `enterprise_id` always equals the workspace's enterprise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionIdentity {
    /// Identity identifier.
    pub user_id: IdentityId,
    /// Owning enterprise (immutable).
    pub enterprise_id: EnterpriseId,
    /// Owning workspace (immutable).
    pub workspace_id: WorkspaceId,
    /// Sub-vertical this identity operates in.
    pub sub_vertical_id: SubVerticalId,
    /// Role held by the identity.
    pub role: IdentityRole,
    /// Execution mode.
    pub mode: IdentityMode,
    /// Lifecycle status.
    pub status: IdentityStatus,
    /// Creation instant.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Persona and Policy
// ============================================================================

/// Scope at which a persona applies.
///
/// # Invariants
/// - Variants are stable; resolution probes them in LOCAL, REGIONAL, GLOBAL
///   order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonaScope {
    /// Applies everywhere within the sub-vertical.
    Global,
    /// Applies within one region subtree.
    Regional,
    /// Applies to one exact region code.
    Local,
}

/// Addressable reasoning configuration.
///
/// # Invariants
/// - At most one policy with `PolicyStatus::Active` exists per persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Persona identifier.
    pub persona_id: PersonaId,
    /// Scope at which the persona applies.
    pub scope: PersonaScope,
    /// Sub-vertical the persona serves.
    pub sub_vertical_id: SubVerticalId,
    /// Region code for REGIONAL and LOCAL scopes.
    pub region_code: Option<RegionCode>,
    /// Whether the persona participates in resolution.
    pub is_active: bool,
    /// Creation instant (tie-break order for equal probes).
    pub created_at: Timestamp,
}

/// Policy lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyStatus {
    /// Draft under edit.
    Draft,
    /// Staged for activation.
    Staged,
    /// The single active policy for its persona.
    Active,
    /// Retired version.
    Deprecated,
}

/// Versioned behavioral specification owned by a persona.
///
/// # Invariants
/// - `(persona_id)` has at most one row with `status = Active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy identifier.
    pub policy_id: PolicyId,
    /// Owning persona.
    pub persona_id: PersonaId,
    /// Monotonic version within the persona.
    pub policy_version: u32,
    /// Lifecycle status.
    pub status: PolicyStatus,
    /// Creation instant.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Territory
// ============================================================================

/// Hierarchical level of a territory.
///
/// # Invariants
/// - Serialized forms are lowercase and part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerritoryLevel {
    /// Whole-world scope.
    Global,
    /// Multi-country region.
    Region,
    /// Single country.
    Country,
    /// State or emirate.
    State,
    /// District or city.
    District,
}

impl TerritoryLevel {
    /// Returns the default coverage type implied by the level.
    #[must_use]
    pub const fn default_coverage(self) -> CoverageType {
        match self {
            Self::Global => CoverageType::Global,
            Self::Region | Self::Country => CoverageType::Multi,
            Self::State | Self::District => CoverageType::Single,
        }
    }

    /// Returns a specificity rank; smaller is more specific.
    #[must_use]
    pub const fn specificity(self) -> u8 {
        match self {
            Self::District => 0,
            Self::State => 1,
            Self::Country => 2,
            Self::Region => 3,
            Self::Global => 4,
        }
    }
}

/// Sub-vertical coverage type of a territory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverageType {
    /// Covers only explicitly bound sub-verticals.
    Single,
    /// Covers multiple sub-verticals without explicit bindings.
    Multi,
    /// Covers every sub-vertical.
    Global,
}

/// Territory lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerritoryStatus {
    /// Territory participates in resolution.
    Active,
    /// Territory is excluded from resolution.
    Inactive,
}

/// Hierarchical geographic or organizational scope.
///
/// # Invariants
/// - `level` implies the default `coverage_type` at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Territory {
    /// Territory identifier.
    pub territory_id: TerritoryId,
    /// URL-safe slug.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Hierarchical level.
    pub level: TerritoryLevel,
    /// Region code addressed by this territory.
    pub region_code: Option<RegionCode>,
    /// ISO-style country code for country-level territories.
    pub country_code: Option<String>,
    /// Sub-vertical coverage type.
    pub coverage_type: CoverageType,
    /// Lifecycle status.
    pub status: TerritoryStatus,
    /// Creation instant (tie-break order for equal probes).
    pub created_at: Timestamp,
}

/// Explicit binding of a territory to a sub-vertical.
///
/// # Invariants
/// - Required for `CoverageType::Single` territories to serve a sub-vertical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritorySubVertical {
    /// Bound territory.
    pub territory_id: TerritoryId,
    /// Bound sub-vertical.
    pub sub_vertical_id: SubVerticalId,
}

// ============================================================================
// SECTION: Coverage Gate
// ============================================================================

/// Returns true when a territory may serve a sub-vertical.
///
/// Validation succeeds when an explicit binding exists or the territory's
/// coverage type is `GLOBAL` or `MULTI`.
#[must_use]
pub fn territory_covers_sub_vertical(territory: &Territory, has_explicit_binding: bool) -> bool {
    has_explicit_binding
        || matches!(territory.coverage_type, CoverageType::Global | CoverageType::Multi)
}

// ============================================================================
// SECTION: Identity Guards
// ============================================================================

/// Returns true when an identity is consistent with its workspace.
///
/// The identity's enterprise must equal the workspace's enterprise; this is
/// the cross-enterprise invariant every store backend enforces.
#[must_use]
pub fn identity_consistent_with_workspace(
    identity_enterprise: EnterpriseId,
    workspace: &Workspace,
) -> bool {
    identity_enterprise == workspace.enterprise_id
}
