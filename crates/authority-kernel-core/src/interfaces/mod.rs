// crates/authority-kernel-core/src/interfaces/mod.rs
// ============================================================================
// Module: Authority Kernel Interfaces
// Description: Backend-agnostic store contracts for authority, envelopes,
// violations, replays, traces, and audit.
// Purpose: Define the seams the kernel runtime and durable backends share.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the kernel integrates with storage backends without
//! embedding backend details. Implementations must enforce the authority
//! invariants themselves so a buggy caller cannot violate them, and must
//! fail closed on missing or corrupt data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::audit::AuditActor;
use crate::core::audit::AuditEntry;
use crate::core::authority::Enterprise;
use crate::core::authority::ExecutionIdentity;
use crate::core::authority::IdentityRole;
use crate::core::authority::Persona;
use crate::core::authority::Policy;
use crate::core::authority::PolicyStatus;
use crate::core::authority::Territory;
use crate::core::authority::TerritorySubVertical;
use crate::core::authority::Workspace;
use crate::core::codes::ErrorCode;
use crate::core::envelope::Envelope;
use crate::core::envelope::EnvelopeLocator;
use crate::core::envelope::EnvelopeStatus;
use crate::core::envelope::SealOutcome;
use crate::core::envelope::VerifyOutcome;
use crate::core::gate::RuntimeGateViolation;
use crate::core::gate::ViolationCode;
use crate::core::gate::ViolationResolution;
use crate::core::hashing::ContentHash;
use crate::core::identifiers::EnterpriseId;
use crate::core::identifiers::EnvelopeId;
use crate::core::identifiers::IdentityId;
use crate::core::identifiers::InteractionId;
use crate::core::identifiers::PersonaId;
use crate::core::identifiers::PolicyId;
use crate::core::identifiers::ReplayId;
use crate::core::identifiers::SubVerticalId;
use crate::core::identifiers::TerritoryId;
use crate::core::identifiers::ViolationId;
use crate::core::identifiers::WorkspaceId;
use crate::core::replay::ReplayAttempt;
use crate::core::replay::ReplayCompletion;
use crate::core::time::Timestamp;
use crate::core::trace::Interaction;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Infrastructure-level store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling; `Backend` failures are
///   retryable by callers, the rest are not.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Backend engine error (retryable).
    #[error("store backend error: {0}")]
    Backend(String),
    /// Stored data failed an integrity check.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Stored or supplied data is invalid.
    #[error("store invalid data: {0}")]
    Invalid(String),
}

/// Authority-store errors, including invariant rejections.
///
/// # Invariants
/// - Invariant rejections are final; callers must not retry them.
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// A child record may never move to a different enterprise.
    #[error("cross-enterprise reassignment forbidden: {0}")]
    CrossEnterpriseForbidden(String),
    /// A workspace or identity may never move to a different workspace.
    #[error("workspace reassignment forbidden: {0}")]
    WorkspaceReassignmentForbidden(String),
    /// Direct promotion to `SUPER_ADMIN` is forbidden.
    #[error("role escalation forbidden: {from:?} -> {to:?}")]
    RoleEscalationForbidden {
        /// Role held before the attempted change.
        from: IdentityRole,
        /// Role the change attempted to grant.
        to: IdentityRole,
    },
    /// A persona would end up with more than one active policy.
    #[error("persona {0} already has an active policy")]
    MultipleActivePolicies(PersonaId),
    /// The targeted record kind is append-only.
    #[error("record kind is append-only: {0}")]
    ImmutableRecord(String),
    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind label.
        kind: &'static str,
        /// Identifier that missed.
        id: String,
    },
    /// Supplied record data failed validation.
    #[error("invalid authority record: {0}")]
    Invalid(String),
    /// Infrastructure failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthorityError {
    /// Returns the stable error code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::CrossEnterpriseForbidden(_) => ErrorCode::CrossEnterpriseForbidden,
            Self::WorkspaceReassignmentForbidden(_) => ErrorCode::WorkspaceReassignmentForbidden,
            Self::RoleEscalationForbidden {
                ..
            } => ErrorCode::RoleEscalationForbidden,
            Self::MultipleActivePolicies(_) => ErrorCode::MultipleActivePolicies,
            Self::ImmutableRecord(_) | Self::Store(_) => ErrorCode::AuthorityInvarianceViolation,
            Self::NotFound {
                ..
            }
            | Self::Invalid(_) => ErrorCode::ValidationFailed,
        }
    }
}

/// Envelope-store errors.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// No envelope exists for the identifier.
    #[error("envelope not found: {0}")]
    NotFound(String),
    /// The envelope already reached a terminal status.
    #[error("envelope already terminal: {status:?}")]
    AlreadyTerminal {
        /// Current terminal status.
        status: EnvelopeStatus,
    },
    /// Supplied envelope data failed validation.
    #[error("invalid envelope: {0}")]
    Invalid(String),
    /// Infrastructure failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Replay-store errors.
#[derive(Debug, Error)]
pub enum ReplayStoreError {
    /// No attempt exists for the identifier.
    #[error("replay attempt not found: {0}")]
    NotFound(String),
    /// The attempt already reached a terminal status.
    #[error("replay attempt already completed")]
    AlreadyCompleted,
    /// Infrastructure failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Authority Store
// ============================================================================

/// Persistent record of enterprises, workspaces, identities, personas,
/// policies, and territories.
///
/// # Invariants
/// - Implementations enforce the cross-enterprise, workspace-pinning,
///   role-escalation, and one-active-policy invariants regardless of caller.
/// - Every mutation attempt, applied or rejected, writes an audit entry in
///   the same transaction.
pub trait AuthorityStore {
    /// Creates an enterprise.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] when validation or the backend fails.
    fn create_enterprise(
        &self,
        enterprise: Enterprise,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError>;

    /// Loads an enterprise.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn enterprise(&self, enterprise_id: EnterpriseId) -> Result<Option<Enterprise>, StoreError>;

    /// Creates a workspace pinned to its enterprise.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] when the enterprise is missing or the
    /// backend fails.
    fn create_workspace(
        &self,
        workspace: Workspace,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError>;

    /// Loads a workspace (soft-deleted rows are filtered).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn workspace(&self, workspace_id: WorkspaceId) -> Result<Option<Workspace>, StoreError>;

    /// Soft-deletes a workspace.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::NotFound`] when the workspace is missing.
    fn soft_delete_workspace(
        &self,
        workspace_id: WorkspaceId,
        actor: &AuditActor,
        now: Timestamp,
    ) -> Result<(), AuthorityError>;

    /// Creates an execution identity; rejects enterprise mismatches.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::CrossEnterpriseForbidden`] when the
    /// identity's enterprise differs from the workspace's enterprise.
    fn create_identity(
        &self,
        identity: ExecutionIdentity,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError>;

    /// Loads an execution identity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn identity(&self, user_id: IdentityId) -> Result<Option<ExecutionIdentity>, StoreError>;

    /// Changes an identity's role; rejects direct jumps to `SUPER_ADMIN`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::RoleEscalationForbidden`] on forbidden
    /// transitions.
    fn change_identity_role(
        &self,
        user_id: IdentityId,
        new_role: IdentityRole,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError>;

    /// Attempts to move an identity to another enterprise or workspace.
    ///
    /// Always rejected; the rejection is audited with `success = false` and
    /// no row is mutated.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::CrossEnterpriseForbidden`] or
    /// [`AuthorityError::WorkspaceReassignmentForbidden`].
    fn reassign_identity(
        &self,
        user_id: IdentityId,
        new_enterprise: Option<EnterpriseId>,
        new_workspace: Option<WorkspaceId>,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError>;

    /// Attempts to move a workspace to another enterprise.
    ///
    /// Always rejected; the rejection is audited with `success = false` and
    /// no row is mutated.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::WorkspaceReassignmentForbidden`].
    fn reassign_workspace(
        &self,
        workspace_id: WorkspaceId,
        new_enterprise: EnterpriseId,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError>;

    /// Creates a persona.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] when validation or the backend fails.
    fn create_persona(&self, persona: Persona, actor: &AuditActor) -> Result<(), AuthorityError>;

    /// Loads a persona.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn persona(&self, persona_id: PersonaId) -> Result<Option<Persona>, StoreError>;

    /// Lists personas for a sub-vertical ordered by ascending creation time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn personas_for(&self, sub_vertical_id: &SubVerticalId) -> Result<Vec<Persona>, StoreError>;

    /// Creates a policy; enforces one active policy per persona.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::MultipleActivePolicies`] when an active
    /// policy already exists for the persona.
    fn create_policy(&self, policy: Policy, actor: &AuditActor) -> Result<(), AuthorityError>;

    /// Changes a policy's status; enforces one active policy per persona.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::MultipleActivePolicies`] when activation
    /// would create a second active policy.
    fn set_policy_status(
        &self,
        policy_id: PolicyId,
        status: PolicyStatus,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError>;

    /// Lists policies for a persona ordered by ascending version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn policies_for(&self, persona_id: PersonaId) -> Result<Vec<Policy>, StoreError>;

    /// Creates a territory.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] when validation or the backend fails.
    fn create_territory(
        &self,
        territory: Territory,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError>;

    /// Lists territories ordered by ascending creation time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn territories(&self) -> Result<Vec<Territory>, StoreError>;

    /// Binds a territory to a sub-vertical.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::NotFound`] when the territory is missing.
    fn bind_territory_sub_vertical(
        &self,
        binding: TerritorySubVertical,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError>;

    /// Returns true when an explicit territory/sub-vertical binding exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn has_territory_binding(
        &self,
        territory_id: TerritoryId,
        sub_vertical_id: &SubVerticalId,
    ) -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Envelope Store
// ============================================================================

/// Content-addressed registry of sealed envelopes.
///
/// # Invariants
/// - One envelope hash maps to exactly one envelope.
/// - Sealing is idempotent on the content hash.
/// - Status transitions are one-way: `SEALED` to `EXPIRED` or `REVOKED`.
pub trait EnvelopeStore {
    /// Seals an envelope, returning the existing record on hash collision.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] when validation or the backend fails.
    fn seal(&self, envelope: Envelope) -> Result<SealOutcome, EnvelopeError>;

    /// Looks up an envelope by identifier or hash.
    ///
    /// When both identifiers are present, they must address the same record.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Invalid`] when the locator is empty or the
    /// identifiers disagree.
    fn find(&self, locator: &EnvelopeLocator) -> Result<Option<Envelope>, EnvelopeError>;

    /// Classifies a claimed envelope at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Invalid`] when the locator is empty.
    fn verify(
        &self,
        locator: &EnvelopeLocator,
        now: Timestamp,
    ) -> Result<VerifyOutcome, EnvelopeError> {
        if locator.is_empty() {
            return Err(EnvelopeError::Invalid(
                "verification requires an envelope id or hash".to_string(),
            ));
        }
        let envelope = self.find(locator)?;
        Ok(VerifyOutcome::classify(envelope.as_ref(), now))
    }

    /// Returns the canonical content bytes of a sealed envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::NotFound`] when no envelope matches.
    fn content(&self, locator: &EnvelopeLocator) -> Result<Vec<u8>, EnvelopeError> {
        let envelope = self
            .find(locator)?
            .ok_or_else(|| EnvelopeError::NotFound("no envelope for locator".to_string()))?;
        envelope
            .body
            .canonical_bytes()
            .map_err(|err| EnvelopeError::Invalid(err.to_string()))
    }

    /// Revokes a sealed envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::AlreadyTerminal`] when the envelope already
    /// left the `SEALED` state.
    fn revoke(
        &self,
        envelope_id: EnvelopeId,
        revoked_by: &str,
        now: Timestamp,
    ) -> Result<Envelope, EnvelopeError>;

    /// Transitions sealed envelopes past `expires_at` to `EXPIRED`.
    ///
    /// Returns the number of envelopes transitioned.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] on infrastructure failure.
    fn sweep_expired(&self, now: Timestamp) -> Result<u64, EnvelopeError>;
}

// ============================================================================
// SECTION: Violation Log
// ============================================================================

/// Append-only log of runtime gate violations.
pub trait ViolationLog {
    /// Records a violation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn record(&self, violation: RuntimeGateViolation) -> Result<(), StoreError>;

    /// Lists violations, optionally filtered by code, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn violations(
        &self,
        code: Option<ViolationCode>,
    ) -> Result<Vec<RuntimeGateViolation>, StoreError>;

    /// Updates the human-driven resolution metadata of a violation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the violation does not exist.
    fn set_resolution(
        &self,
        violation_id: ViolationId,
        resolution: ViolationResolution,
        note: Option<String>,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Replay Store
// ============================================================================

/// Store of replay attempts with single-completion semantics.
pub trait ReplayStore {
    /// Inserts a new attempt (pending or created-terminal).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn insert(&self, attempt: ReplayAttempt) -> Result<(), StoreError>;

    /// Loads an attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn attempt(&self, replay_id: ReplayId) -> Result<Option<ReplayAttempt>, StoreError>;

    /// Applies a terminal completion to a pending attempt (compare-and-set).
    ///
    /// # Errors
    ///
    /// Returns [`ReplayStoreError::AlreadyCompleted`] when the attempt is no
    /// longer pending.
    fn complete(
        &self,
        replay_id: ReplayId,
        completion: ReplayCompletion,
    ) -> Result<ReplayAttempt, ReplayStoreError>;

    /// Lists attempts for an envelope hash, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn history_for(&self, envelope_hash: &ContentHash) -> Result<Vec<ReplayAttempt>, StoreError>;

    /// Fails pending attempts started at or before `cutoff`.
    ///
    /// Returns the number of attempts transitioned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn sweep_stale(&self, cutoff: Timestamp, now: Timestamp) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Trace Store
// ============================================================================

/// Append-only store of interaction records.
///
/// # Invariants
/// - The trait exposes no update or delete; records are immutable evidence.
pub trait TraceStore {
    /// Appends an interaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn append(&self, interaction: Interaction) -> Result<(), StoreError>;

    /// Loads an interaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn interaction(
        &self,
        interaction_id: InteractionId,
    ) -> Result<Option<Interaction>, StoreError>;

    /// Lists interactions bound to an envelope hash, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn interactions_for(
        &self,
        envelope_hash: &ContentHash,
    ) -> Result<Vec<Interaction>, StoreError>;
}

// ============================================================================
// SECTION: Audit Log
// ============================================================================

/// Filter for audit log reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    /// Match entries by acting identity.
    pub actor_id: Option<IdentityId>,
    /// Match entries by target kind and identifier.
    pub target: Option<(String, String)>,
    /// Match entries by enterprise scope.
    pub enterprise_id: Option<EnterpriseId>,
    /// Inclusive lower time bound.
    pub from: Option<Timestamp>,
    /// Inclusive upper time bound.
    pub until: Option<Timestamp>,
}

/// Append-only audit log exposed read-only.
pub trait AuditLog {
    /// Appends an entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn append(&self, entry: AuditEntry) -> Result<(), StoreError>;

    /// Lists entries matching a filter, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError>;
}
