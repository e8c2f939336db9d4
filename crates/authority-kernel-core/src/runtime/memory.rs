// crates/authority-kernel-core/src/runtime/memory.rs
// ============================================================================
// Module: Authority Kernel In-Memory Store
// Description: In-memory implementation of every kernel store interface.
// Purpose: Provide a deterministic reference backend for tests and demos.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! One mutex-guarded state block backs all kernel store interfaces so each
//! mutation and its audit entry commit atomically, mirroring the
//! same-transaction guarantee of durable backends. The implementation
//! enforces the authority invariants itself; it is the executable reference
//! for what every backend must reject.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use serde_json::json;

use crate::core::audit::AuditActor;
use crate::core::audit::AuditEntry;
use crate::core::audit::AuditEntryParams;
use crate::core::authority::Enterprise;
use crate::core::authority::ExecutionIdentity;
use crate::core::authority::IdentityRole;
use crate::core::authority::Persona;
use crate::core::authority::Policy;
use crate::core::authority::PolicyStatus;
use crate::core::authority::Territory;
use crate::core::authority::TerritorySubVertical;
use crate::core::authority::Workspace;
use crate::core::authority::identity_consistent_with_workspace;
use crate::core::envelope::Envelope;
use crate::core::envelope::EnvelopeLocator;
use crate::core::envelope::EnvelopeStatus;
use crate::core::envelope::SealOutcome;
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
use crate::core::replay::ReplayStatus;
use crate::core::time::Clock;
use crate::core::time::SystemClock;
use crate::core::time::Timestamp;
use crate::core::trace::Interaction;
use crate::interfaces::AuditFilter;
use crate::interfaces::AuditLog;
use crate::interfaces::AuthorityError;
use crate::interfaces::AuthorityStore;
use crate::interfaces::EnvelopeError;
use crate::interfaces::EnvelopeStore;
use crate::interfaces::ReplayStore;
use crate::interfaces::ReplayStoreError;
use crate::interfaces::StoreError;
use crate::interfaces::TraceStore;
use crate::interfaces::ViolationLog;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Failure reason recorded when the stale sweeper fails a pending replay.
const STALE_REPLAY_REASON: &str = "REPLAY_TIMEOUT";

// ============================================================================
// SECTION: State
// ============================================================================

/// Mutable state behind the in-memory store.
#[derive(Debug, Default)]
struct State {
    /// Enterprises keyed by identifier.
    enterprises: BTreeMap<EnterpriseId, Enterprise>,
    /// Workspaces keyed by identifier.
    workspaces: BTreeMap<WorkspaceId, Workspace>,
    /// Execution identities keyed by identifier.
    identities: BTreeMap<IdentityId, ExecutionIdentity>,
    /// Personas keyed by identifier.
    personas: BTreeMap<PersonaId, Persona>,
    /// Policies keyed by identifier.
    policies: BTreeMap<PolicyId, Policy>,
    /// Territories keyed by identifier.
    territories: BTreeMap<TerritoryId, Territory>,
    /// Explicit territory/sub-vertical bindings.
    bindings: BTreeSet<(TerritoryId, String)>,
    /// Envelopes keyed by identifier.
    envelopes: BTreeMap<EnvelopeId, Envelope>,
    /// Content-hash index over envelopes.
    envelopes_by_hash: BTreeMap<ContentHash, EnvelopeId>,
    /// Runtime gate violations in record order.
    violations: Vec<RuntimeGateViolation>,
    /// Replay attempts keyed by identifier.
    replays: BTreeMap<ReplayId, ReplayAttempt>,
    /// Interaction records in append order.
    interactions: Vec<Interaction>,
    /// Audit entries in append order.
    audit: Vec<AuditEntry>,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// In-memory kernel store implementing every store interface.
///
/// # Invariants
/// - All state lives behind one mutex so a mutation and its audit entry
///   commit atomically.
/// - Authority invariants are enforced here, not trusted from callers.
#[derive(Clone)]
pub struct InMemoryStore {
    /// Guarded store state.
    state: Arc<Mutex<State>>,
    /// Clock stamping audit entries.
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a store stamped by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a store stamped by an injected clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            clock,
        }
    }

    /// Locks the state, mapping poisoning onto a backend error.
    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Backend("memory store mutex poisoned".to_string()))
    }

    /// Appends an audit entry for a mutation attempt under the held lock.
    fn push_audit(
        &self,
        state: &mut State,
        actor: &AuditActor,
        action: &str,
        target_type: &str,
        target_id: String,
        enterprise_id: Option<EnterpriseId>,
        success: bool,
        reason: Option<String>,
    ) {
        state.audit.push(AuditEntry::new(
            AuditEntryParams {
                actor: actor.clone(),
                action: action.to_string(),
                target_type: target_type.to_string(),
                target_id,
                enterprise_id,
                success,
                reason,
                metadata: json!({}),
            },
            self.clock.now(),
        ));
    }
}

// ============================================================================
// SECTION: Authority Store Implementation
// ============================================================================

impl AuthorityStore for InMemoryStore {
    fn create_enterprise(
        &self,
        enterprise: Enterprise,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let mut state = self.lock()?;
        let enterprise_id = enterprise.enterprise_id;
        if enterprise.name.trim().is_empty() || enterprise.region.trim().is_empty() {
            self.push_audit(
                &mut state,
                actor,
                "enterprise.create",
                "enterprise",
                enterprise_id.to_string(),
                Some(enterprise_id),
                false,
                Some("name and region must be non-empty".to_string()),
            );
            return Err(AuthorityError::Invalid(
                "enterprise name and region must be non-empty".to_string(),
            ));
        }
        state.enterprises.insert(enterprise_id, enterprise);
        self.push_audit(
            &mut state,
            actor,
            "enterprise.create",
            "enterprise",
            enterprise_id.to_string(),
            Some(enterprise_id),
            true,
            None,
        );
        Ok(())
    }

    fn enterprise(&self, enterprise_id: EnterpriseId) -> Result<Option<Enterprise>, StoreError> {
        Ok(self.lock()?.enterprises.get(&enterprise_id).cloned())
    }

    fn create_workspace(
        &self,
        workspace: Workspace,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let mut state = self.lock()?;
        let workspace_id = workspace.workspace_id;
        let enterprise_id = workspace.enterprise_id;
        if !state.enterprises.contains_key(&enterprise_id) {
            self.push_audit(
                &mut state,
                actor,
                "workspace.create",
                "workspace",
                workspace_id.to_string(),
                Some(enterprise_id),
                false,
                Some("enterprise not found".to_string()),
            );
            return Err(AuthorityError::NotFound {
                kind: "enterprise",
                id: enterprise_id.to_string(),
            });
        }
        state.workspaces.insert(workspace_id, workspace);
        self.push_audit(
            &mut state,
            actor,
            "workspace.create",
            "workspace",
            workspace_id.to_string(),
            Some(enterprise_id),
            true,
            None,
        );
        Ok(())
    }

    fn workspace(&self, workspace_id: WorkspaceId) -> Result<Option<Workspace>, StoreError> {
        Ok(self
            .lock()?
            .workspaces
            .get(&workspace_id)
            .filter(|workspace| workspace.deleted_at.is_none())
            .cloned())
    }

    fn soft_delete_workspace(
        &self,
        workspace_id: WorkspaceId,
        actor: &AuditActor,
        now: Timestamp,
    ) -> Result<(), AuthorityError> {
        let mut state = self.lock()?;
        let Some(workspace) = state.workspaces.get_mut(&workspace_id) else {
            self.push_audit(
                &mut state,
                actor,
                "workspace.soft_delete",
                "workspace",
                workspace_id.to_string(),
                None,
                false,
                Some("workspace not found".to_string()),
            );
            return Err(AuthorityError::NotFound {
                kind: "workspace",
                id: workspace_id.to_string(),
            });
        };
        workspace.deleted_at = Some(now);
        let enterprise_id = workspace.enterprise_id;
        self.push_audit(
            &mut state,
            actor,
            "workspace.soft_delete",
            "workspace",
            workspace_id.to_string(),
            Some(enterprise_id),
            true,
            None,
        );
        Ok(())
    }

    fn create_identity(
        &self,
        identity: ExecutionIdentity,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let mut state = self.lock()?;
        let user_id = identity.user_id;
        let enterprise_id = identity.enterprise_id;
        let Some(workspace) = state.workspaces.get(&identity.workspace_id).cloned() else {
            self.push_audit(
                &mut state,
                actor,
                "identity.create",
                "execution_identity",
                user_id.to_string(),
                Some(enterprise_id),
                false,
                Some("workspace not found".to_string()),
            );
            return Err(AuthorityError::NotFound {
                kind: "workspace",
                id: identity.workspace_id.to_string(),
            });
        };
        if !identity_consistent_with_workspace(identity.enterprise_id, &workspace) {
            self.push_audit(
                &mut state,
                actor,
                "identity.create",
                "execution_identity",
                user_id.to_string(),
                Some(enterprise_id),
                false,
                Some("identity enterprise differs from workspace enterprise".to_string()),
            );
            return Err(AuthorityError::CrossEnterpriseForbidden(format!(
                "identity {user_id} does not belong to enterprise of workspace {}",
                identity.workspace_id
            )));
        }
        state.identities.insert(user_id, identity);
        self.push_audit(
            &mut state,
            actor,
            "identity.create",
            "execution_identity",
            user_id.to_string(),
            Some(enterprise_id),
            true,
            None,
        );
        Ok(())
    }

    fn identity(&self, user_id: IdentityId) -> Result<Option<ExecutionIdentity>, StoreError> {
        Ok(self.lock()?.identities.get(&user_id).cloned())
    }

    fn change_identity_role(
        &self,
        user_id: IdentityId,
        new_role: IdentityRole,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let mut state = self.lock()?;
        let Some(identity) = state.identities.get(&user_id).cloned() else {
            self.push_audit(
                &mut state,
                actor,
                "identity.change_role",
                "execution_identity",
                user_id.to_string(),
                None,
                false,
                Some("identity not found".to_string()),
            );
            return Err(AuthorityError::NotFound {
                kind: "execution_identity",
                id: user_id.to_string(),
            });
        };
        if !identity.role.may_transition_to(new_role) {
            self.push_audit(
                &mut state,
                actor,
                "identity.change_role",
                "execution_identity",
                user_id.to_string(),
                Some(identity.enterprise_id),
                false,
                Some("direct promotion to SUPER_ADMIN is forbidden".to_string()),
            );
            return Err(AuthorityError::RoleEscalationForbidden {
                from: identity.role,
                to: new_role,
            });
        }
        if let Some(stored) = state.identities.get_mut(&user_id) {
            stored.role = new_role;
        }
        self.push_audit(
            &mut state,
            actor,
            "identity.change_role",
            "execution_identity",
            user_id.to_string(),
            Some(identity.enterprise_id),
            true,
            None,
        );
        Ok(())
    }

    fn reassign_identity(
        &self,
        user_id: IdentityId,
        new_enterprise: Option<EnterpriseId>,
        new_workspace: Option<WorkspaceId>,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let mut state = self.lock()?;
        let enterprise_id = state.identities.get(&user_id).map(|identity| identity.enterprise_id);
        self.push_audit(
            &mut state,
            actor,
            "identity.reassign",
            "execution_identity",
            user_id.to_string(),
            enterprise_id,
            false,
            Some("enterprise and workspace pins are immutable".to_string()),
        );
        if new_enterprise.is_some() {
            return Err(AuthorityError::CrossEnterpriseForbidden(format!(
                "identity {user_id} is pinned to its enterprise for life"
            )));
        }
        if new_workspace.is_some() {
            return Err(AuthorityError::WorkspaceReassignmentForbidden(format!(
                "identity {user_id} is pinned to its workspace for life"
            )));
        }
        Err(AuthorityError::Invalid("no reassignment target provided".to_string()))
    }

    fn reassign_workspace(
        &self,
        workspace_id: WorkspaceId,
        new_enterprise: EnterpriseId,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let mut state = self.lock()?;
        let enterprise_id = state.workspaces.get(&workspace_id).map(|workspace| workspace.enterprise_id);
        self.push_audit(
            &mut state,
            actor,
            "workspace.reassign",
            "workspace",
            workspace_id.to_string(),
            enterprise_id,
            false,
            Some(format!("workspace may not move to enterprise {new_enterprise}")),
        );
        Err(AuthorityError::WorkspaceReassignmentForbidden(format!(
            "workspace {workspace_id} is pinned to its enterprise for life"
        )))
    }

    fn create_persona(&self, persona: Persona, actor: &AuditActor) -> Result<(), AuthorityError> {
        let mut state = self.lock()?;
        let persona_id = persona.persona_id;
        state.personas.insert(persona_id, persona);
        self.push_audit(
            &mut state,
            actor,
            "persona.create",
            "persona",
            persona_id.to_string(),
            None,
            true,
            None,
        );
        Ok(())
    }

    fn persona(&self, persona_id: PersonaId) -> Result<Option<Persona>, StoreError> {
        Ok(self.lock()?.personas.get(&persona_id).cloned())
    }

    fn personas_for(&self, sub_vertical_id: &SubVerticalId) -> Result<Vec<Persona>, StoreError> {
        let state = self.lock()?;
        let mut personas: Vec<Persona> = state
            .personas
            .values()
            .filter(|persona| &persona.sub_vertical_id == sub_vertical_id)
            .cloned()
            .collect();
        personas.sort_by_key(|persona| (persona.created_at, persona.persona_id));
        Ok(personas)
    }

    fn create_policy(&self, policy: Policy, actor: &AuditActor) -> Result<(), AuthorityError> {
        let mut state = self.lock()?;
        let policy_id = policy.policy_id;
        let persona_id = policy.persona_id;
        if policy.status == PolicyStatus::Active
            && state.policies.values().any(|existing| {
                existing.persona_id == persona_id && existing.status == PolicyStatus::Active
            })
        {
            self.push_audit(
                &mut state,
                actor,
                "policy.create",
                "persona_policy",
                policy_id.to_string(),
                None,
                false,
                Some("persona already has an active policy".to_string()),
            );
            return Err(AuthorityError::MultipleActivePolicies(persona_id));
        }
        state.policies.insert(policy_id, policy);
        self.push_audit(
            &mut state,
            actor,
            "policy.create",
            "persona_policy",
            policy_id.to_string(),
            None,
            true,
            None,
        );
        Ok(())
    }

    fn set_policy_status(
        &self,
        policy_id: PolicyId,
        status: PolicyStatus,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let mut state = self.lock()?;
        let Some(policy) = state.policies.get(&policy_id).cloned() else {
            self.push_audit(
                &mut state,
                actor,
                "policy.set_status",
                "persona_policy",
                policy_id.to_string(),
                None,
                false,
                Some("policy not found".to_string()),
            );
            return Err(AuthorityError::NotFound {
                kind: "persona_policy",
                id: policy_id.to_string(),
            });
        };
        if status == PolicyStatus::Active
            && state.policies.values().any(|existing| {
                existing.policy_id != policy_id
                    && existing.persona_id == policy.persona_id
                    && existing.status == PolicyStatus::Active
            })
        {
            self.push_audit(
                &mut state,
                actor,
                "policy.set_status",
                "persona_policy",
                policy_id.to_string(),
                None,
                false,
                Some("persona already has an active policy".to_string()),
            );
            return Err(AuthorityError::MultipleActivePolicies(policy.persona_id));
        }
        if let Some(stored) = state.policies.get_mut(&policy_id) {
            stored.status = status;
        }
        self.push_audit(
            &mut state,
            actor,
            "policy.set_status",
            "persona_policy",
            policy_id.to_string(),
            None,
            true,
            None,
        );
        Ok(())
    }

    fn policies_for(&self, persona_id: PersonaId) -> Result<Vec<Policy>, StoreError> {
        let state = self.lock()?;
        let mut policies: Vec<Policy> = state
            .policies
            .values()
            .filter(|policy| policy.persona_id == persona_id)
            .cloned()
            .collect();
        policies.sort_by_key(|policy| policy.policy_version);
        Ok(policies)
    }

    fn create_territory(
        &self,
        territory: Territory,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let mut state = self.lock()?;
        let territory_id = territory.territory_id;
        state.territories.insert(territory_id, territory);
        self.push_audit(
            &mut state,
            actor,
            "territory.create",
            "territory",
            territory_id.to_string(),
            None,
            true,
            None,
        );
        Ok(())
    }

    fn territories(&self) -> Result<Vec<Territory>, StoreError> {
        let state = self.lock()?;
        let mut territories: Vec<Territory> = state.territories.values().cloned().collect();
        territories.sort_by_key(|territory| (territory.created_at, territory.territory_id));
        Ok(territories)
    }

    fn bind_territory_sub_vertical(
        &self,
        binding: TerritorySubVertical,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let mut state = self.lock()?;
        let territory_id = binding.territory_id;
        if !state.territories.contains_key(&territory_id) {
            self.push_audit(
                &mut state,
                actor,
                "territory.bind_sub_vertical",
                "territory",
                territory_id.to_string(),
                None,
                false,
                Some("territory not found".to_string()),
            );
            return Err(AuthorityError::NotFound {
                kind: "territory",
                id: territory_id.to_string(),
            });
        }
        state.bindings.insert((territory_id, binding.sub_vertical_id.as_str().to_string()));
        self.push_audit(
            &mut state,
            actor,
            "territory.bind_sub_vertical",
            "territory",
            territory_id.to_string(),
            None,
            true,
            None,
        );
        Ok(())
    }

    fn has_territory_binding(
        &self,
        territory_id: TerritoryId,
        sub_vertical_id: &SubVerticalId,
    ) -> Result<bool, StoreError> {
        let state = self.lock()?;
        Ok(state.bindings.contains(&(territory_id, sub_vertical_id.as_str().to_string())))
    }
}

// ============================================================================
// SECTION: Envelope Store Implementation
// ============================================================================

impl EnvelopeStore for InMemoryStore {
    fn seal(&self, envelope: Envelope) -> Result<SealOutcome, EnvelopeError> {
        let computed = envelope
            .body
            .compute_hash()
            .map_err(|err| EnvelopeError::Invalid(err.to_string()))?;
        if computed != envelope.sha256_hash {
            return Err(EnvelopeError::Invalid(
                "sha256_hash does not match canonical body".to_string(),
            ));
        }
        let mut state = self.lock().map_err(EnvelopeError::Store)?;
        if let Some(existing_id) = state.envelopes_by_hash.get(&envelope.sha256_hash)
            && let Some(existing) = state.envelopes.get(existing_id)
        {
            return Ok(SealOutcome {
                envelope_id: existing.envelope_id,
                sha256_hash: existing.sha256_hash.clone(),
                is_new: false,
                sealed_at: existing.body.sealed_at,
            });
        }
        let outcome = SealOutcome {
            envelope_id: envelope.envelope_id,
            sha256_hash: envelope.sha256_hash.clone(),
            is_new: true,
            sealed_at: envelope.body.sealed_at,
        };
        state.envelopes_by_hash.insert(envelope.sha256_hash.clone(), envelope.envelope_id);
        state.envelopes.insert(envelope.envelope_id, envelope);
        Ok(outcome)
    }

    fn find(&self, locator: &EnvelopeLocator) -> Result<Option<Envelope>, EnvelopeError> {
        if locator.is_empty() {
            return Err(EnvelopeError::Invalid(
                "locator requires an envelope id or hash".to_string(),
            ));
        }
        let state = self.lock().map_err(EnvelopeError::Store)?;
        let by_id = locator.envelope_id.and_then(|id| state.envelopes.get(&id));
        let by_hash = locator
            .sha256_hash
            .as_ref()
            .and_then(|hash| state.envelopes_by_hash.get(hash))
            .and_then(|id| state.envelopes.get(id));
        match (locator.envelope_id, locator.sha256_hash.as_ref()) {
            (Some(_), Some(_)) => match (by_id, by_hash) {
                (Some(a), Some(b)) if a.envelope_id == b.envelope_id => Ok(Some(a.clone())),
                (None, None) => Ok(None),
                _ => Err(EnvelopeError::Invalid(
                    "envelope id and hash address different envelopes".to_string(),
                )),
            },
            (Some(_), None) => Ok(by_id.cloned()),
            (None, Some(_)) => Ok(by_hash.cloned()),
            (None, None) => Ok(None),
        }
    }

    fn revoke(
        &self,
        envelope_id: EnvelopeId,
        revoked_by: &str,
        now: Timestamp,
    ) -> Result<Envelope, EnvelopeError> {
        let mut state = self.lock().map_err(EnvelopeError::Store)?;
        let Some(envelope) = state.envelopes.get_mut(&envelope_id) else {
            return Err(EnvelopeError::NotFound(envelope_id.to_string()));
        };
        if !envelope.status.may_transition_to(EnvelopeStatus::Revoked) {
            return Err(EnvelopeError::AlreadyTerminal {
                status: envelope.status,
            });
        }
        envelope.status = EnvelopeStatus::Revoked;
        envelope.revoked_at = Some(now);
        envelope.revoked_by = Some(revoked_by.to_string());
        Ok(envelope.clone())
    }

    fn sweep_expired(&self, now: Timestamp) -> Result<u64, EnvelopeError> {
        let mut state = self.lock().map_err(EnvelopeError::Store)?;
        let mut transitioned = 0u64;
        for envelope in state.envelopes.values_mut() {
            if envelope.status == EnvelopeStatus::Sealed && envelope.is_past_expiry(now) {
                envelope.status = EnvelopeStatus::Expired;
                envelope.expired_at = Some(now);
                transitioned = transitioned.saturating_add(1);
            }
        }
        Ok(transitioned)
    }
}

// ============================================================================
// SECTION: Violation Log Implementation
// ============================================================================

impl ViolationLog for InMemoryStore {
    fn record(&self, violation: RuntimeGateViolation) -> Result<(), StoreError> {
        self.lock()?.violations.push(violation);
        Ok(())
    }

    fn violations(
        &self,
        code: Option<ViolationCode>,
    ) -> Result<Vec<RuntimeGateViolation>, StoreError> {
        let state = self.lock()?;
        let mut matching: Vec<RuntimeGateViolation> = state
            .violations
            .iter()
            .filter(|violation| code.is_none_or(|code| violation.violation_code == code))
            .cloned()
            .collect();
        matching.sort_by_key(|violation| std::cmp::Reverse(violation.occurred_at));
        Ok(matching)
    }

    fn set_resolution(
        &self,
        violation_id: ViolationId,
        resolution: ViolationResolution,
        note: Option<String>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let Some(violation) =
            state.violations.iter_mut().find(|violation| violation.violation_id == violation_id)
        else {
            return Err(StoreError::Invalid(format!("violation not found: {violation_id}")));
        };
        violation.resolution_status = resolution;
        violation.resolution_note = note;
        Ok(())
    }
}

// ============================================================================
// SECTION: Replay Store Implementation
// ============================================================================

impl ReplayStore for InMemoryStore {
    fn insert(&self, attempt: ReplayAttempt) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.replays.contains_key(&attempt.replay_id) {
            return Err(StoreError::Invalid(format!(
                "replay attempt already exists: {}",
                attempt.replay_id
            )));
        }
        state.replays.insert(attempt.replay_id, attempt);
        Ok(())
    }

    fn attempt(&self, replay_id: ReplayId) -> Result<Option<ReplayAttempt>, StoreError> {
        Ok(self.lock()?.replays.get(&replay_id).cloned())
    }

    fn complete(
        &self,
        replay_id: ReplayId,
        completion: ReplayCompletion,
    ) -> Result<ReplayAttempt, ReplayStoreError> {
        let mut state = self.lock().map_err(ReplayStoreError::Store)?;
        let Some(attempt) = state.replays.get_mut(&replay_id) else {
            return Err(ReplayStoreError::NotFound(replay_id.to_string()));
        };
        if attempt.replay_status != ReplayStatus::Pending {
            return Err(ReplayStoreError::AlreadyCompleted);
        }
        attempt.replay_status = completion.replay_status;
        attempt.drift_details = completion.drift_details;
        attempt.failure_reason = completion.failure_reason;
        attempt.ended_at = Some(completion.ended_at);
        Ok(attempt.clone())
    }

    fn history_for(&self, envelope_hash: &ContentHash) -> Result<Vec<ReplayAttempt>, StoreError> {
        let state = self.lock()?;
        let mut attempts: Vec<ReplayAttempt> = state
            .replays
            .values()
            .filter(|attempt| &attempt.envelope_hash == envelope_hash)
            .cloned()
            .collect();
        attempts.sort_by_key(|attempt| (attempt.started_at, attempt.replay_id));
        Ok(attempts)
    }

    fn sweep_stale(&self, cutoff: Timestamp, now: Timestamp) -> Result<u64, StoreError> {
        let mut state = self.lock()?;
        let mut transitioned = 0u64;
        for attempt in state.replays.values_mut() {
            if attempt.replay_status == ReplayStatus::Pending
                && !cutoff.is_before(attempt.started_at)
            {
                attempt.replay_status = ReplayStatus::Failed;
                attempt.failure_reason = Some(STALE_REPLAY_REASON.to_string());
                attempt.ended_at = Some(now);
                transitioned = transitioned.saturating_add(1);
            }
        }
        Ok(transitioned)
    }
}

// ============================================================================
// SECTION: Trace Store Implementation
// ============================================================================

impl TraceStore for InMemoryStore {
    fn append(&self, interaction: Interaction) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state
            .interactions
            .iter()
            .any(|existing| existing.interaction_id == interaction.interaction_id)
        {
            return Err(StoreError::Invalid(format!(
                "interaction already recorded: {}",
                interaction.interaction_id
            )));
        }
        state.interactions.push(interaction);
        Ok(())
    }

    fn interaction(
        &self,
        interaction_id: InteractionId,
    ) -> Result<Option<Interaction>, StoreError> {
        Ok(self
            .lock()?
            .interactions
            .iter()
            .find(|interaction| interaction.interaction_id == interaction_id)
            .cloned())
    }

    fn interactions_for(
        &self,
        envelope_hash: &ContentHash,
    ) -> Result<Vec<Interaction>, StoreError> {
        Ok(self
            .lock()?
            .interactions
            .iter()
            .filter(|interaction| &interaction.envelope_sha256 == envelope_hash)
            .cloned()
            .collect())
    }
}

// ============================================================================
// SECTION: Audit Log Implementation
// ============================================================================

impl AuditLog for InMemoryStore {
    fn append(&self, entry: AuditEntry) -> Result<(), StoreError> {
        self.lock()?.audit.push(entry);
        Ok(())
    }

    fn entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .audit
            .iter()
            .filter(|entry| {
                filter.actor_id.is_none_or(|actor_id| entry.actor.actor_id == Some(actor_id))
                    && filter.target.as_ref().is_none_or(|(target_type, target_id)| {
                        &entry.target_type == target_type && &entry.target_id == target_id
                    })
                    && filter
                        .enterprise_id
                        .is_none_or(|enterprise_id| entry.enterprise_id == Some(enterprise_id))
                    && filter.from.is_none_or(|from| !entry.occurred_at.is_before(from))
                    && filter.until.is_none_or(|until| !until.is_before(entry.occurred_at))
            })
            .cloned()
            .collect())
    }
}
