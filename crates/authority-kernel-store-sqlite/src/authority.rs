// crates/authority-kernel-store-sqlite/src/authority.rs
// ============================================================================
// Module: SQLite Authority Store
// Description: Durable authority records with invariant enforcement.
// Purpose: Reject invariant violations inside the transaction that audits them.
// Dependencies: authority-kernel-core, rusqlite, crate::store
// ============================================================================

//! ## Overview
//! Every mutation runs in one transaction that also writes its audit row,
//! including rejected mutations (audited with `success = false`, no row
//! changed). Cross-enterprise, workspace-pinning, role-escalation, and
//! one-active-policy invariants are checked here so no caller can bypass
//! them; the one-active-policy rule is additionally backed by a partial
//! unique index.

// ============================================================================
// SECTION: Imports
// ============================================================================

use authority_kernel_core::AuditActor;
use authority_kernel_core::AuditEntry;
use authority_kernel_core::AuditEntryParams;
use authority_kernel_core::AuthorityError;
use authority_kernel_core::AuthorityStore;
use authority_kernel_core::Enterprise;
use authority_kernel_core::EnterpriseId;
use authority_kernel_core::ExecutionIdentity;
use authority_kernel_core::IdentityId;
use authority_kernel_core::IdentityRole;
use authority_kernel_core::Persona;
use authority_kernel_core::PersonaId;
use authority_kernel_core::Policy;
use authority_kernel_core::PolicyId;
use authority_kernel_core::PolicyStatus;
use authority_kernel_core::StoreError;
use authority_kernel_core::SubVerticalId;
use authority_kernel_core::Territory;
use authority_kernel_core::TerritoryId;
use authority_kernel_core::TerritorySubVertical;
use authority_kernel_core::Timestamp;
use authority_kernel_core::Workspace;
use authority_kernel_core::WorkspaceId;
use authority_kernel_core::authority::identity_consistent_with_workspace;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use serde_json::json;
use uuid::Uuid;

use crate::store::SqliteKernelStore;
use crate::store::SqliteStoreError;
use crate::store::from_record_json;
use crate::store::to_record_json;

// ============================================================================
// SECTION: Audit Helpers
// ============================================================================

/// Inserts an audit row inside the caller's transaction.
pub(crate) fn insert_audit_tx(
    tx: &Transaction<'_>,
    entry: &AuditEntry,
) -> Result<(), SqliteStoreError> {
    tx.execute(
        "INSERT INTO audit_log (actor_id, actor_role, action, target_type, target_id, \
         enterprise_id, success, occurred_at, record_json) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry.actor.actor_id.map(|id| id.to_string()),
            serde_json::to_string(&entry.actor.role)
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?,
            entry.action,
            entry.target_type,
            entry.target_id,
            entry.enterprise_id.map(|id| id.to_string()),
            i64::from(entry.success),
            entry.occurred_at.as_unix_micros(),
            to_record_json(entry)?,
        ],
    )?;
    Ok(())
}

/// Builds an audit entry for an authority mutation attempt.
fn mutation_audit(
    actor: &AuditActor,
    action: &str,
    target_type: &str,
    target_id: String,
    enterprise_id: Option<EnterpriseId>,
    success: bool,
    reason: Option<String>,
    occurred_at: Timestamp,
) -> AuditEntry {
    AuditEntry::new(
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
        occurred_at,
    )
}

/// Maps a SQLite error onto the authority error channel.
fn db_err(error: SqliteStoreError) -> AuthorityError {
    AuthorityError::Store(StoreError::from(error))
}

// ============================================================================
// SECTION: Rejection Helper
// ============================================================================

impl SqliteKernelStore {
    /// Commits a `success = false` audit row for a rejected mutation.
    fn reject(
        &self,
        tx: Transaction<'_>,
        entry: AuditEntry,
        error: AuthorityError,
    ) -> AuthorityError {
        if let Err(audit_error) = insert_audit_tx(&tx, &entry).and_then(|()| {
            tx.commit().map_err(SqliteStoreError::from)
        }) {
            return db_err(audit_error);
        }
        error
    }
}

// ============================================================================
// SECTION: Authority Store Implementation
// ============================================================================

impl AuthorityStore for SqliteKernelStore {
    fn create_enterprise(
        &self,
        enterprise: Enterprise,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let now = self.clock.now();
        let mut guard = self.lock().map_err(db_err)?;
        let tx = guard.transaction().map_err(|err| db_err(err.into()))?;
        let enterprise_id = enterprise.enterprise_id;
        if enterprise.name.trim().is_empty() || enterprise.region.trim().is_empty() {
            let entry = mutation_audit(
                actor,
                "enterprise.create",
                "enterprise",
                enterprise_id.to_string(),
                Some(enterprise_id),
                false,
                Some("name and region must be non-empty".to_string()),
                now,
            );
            return Err(self.reject(
                tx,
                entry,
                AuthorityError::Invalid(
                    "enterprise name and region must be non-empty".to_string(),
                ),
            ));
        }
        tx.execute(
            "INSERT INTO enterprises (enterprise_id, record_json) VALUES (?1, ?2)",
            params![
                enterprise_id.to_string(),
                to_record_json(&enterprise).map_err(db_err)?
            ],
        )
        .map_err(|err| db_err(err.into()))?;
        insert_audit_tx(
            &tx,
            &mutation_audit(
                actor,
                "enterprise.create",
                "enterprise",
                enterprise_id.to_string(),
                Some(enterprise_id),
                true,
                None,
                now,
            ),
        )
        .map_err(db_err)?;
        tx.commit().map_err(|err| db_err(err.into()))?;
        Ok(())
    }

    fn enterprise(&self, enterprise_id: EnterpriseId) -> Result<Option<Enterprise>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT record_json FROM enterprises WHERE enterprise_id = ?1",
                params![enterprise_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        payload
            .map(|payload| from_record_json(&payload).map_err(StoreError::from))
            .transpose()
    }

    fn create_workspace(
        &self,
        workspace: Workspace,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let now = self.clock.now();
        let mut guard = self.lock().map_err(db_err)?;
        let tx = guard.transaction().map_err(|err| db_err(err.into()))?;
        let workspace_id = workspace.workspace_id;
        let enterprise_id = workspace.enterprise_id;
        let enterprise_exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM enterprises WHERE enterprise_id = ?1",
                params![enterprise_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(err.into()))?;
        if enterprise_exists.is_none() {
            let entry = mutation_audit(
                actor,
                "workspace.create",
                "workspace",
                workspace_id.to_string(),
                Some(enterprise_id),
                false,
                Some("enterprise not found".to_string()),
                now,
            );
            return Err(self.reject(
                tx,
                entry,
                AuthorityError::NotFound {
                    kind: "enterprise",
                    id: enterprise_id.to_string(),
                },
            ));
        }
        tx.execute(
            "INSERT INTO workspaces (workspace_id, enterprise_id, deleted_at, record_json) \
             VALUES (?1, ?2, NULL, ?3)",
            params![
                workspace_id.to_string(),
                enterprise_id.to_string(),
                to_record_json(&workspace).map_err(db_err)?
            ],
        )
        .map_err(|err| db_err(err.into()))?;
        insert_audit_tx(
            &tx,
            &mutation_audit(
                actor,
                "workspace.create",
                "workspace",
                workspace_id.to_string(),
                Some(enterprise_id),
                true,
                None,
                now,
            ),
        )
        .map_err(db_err)?;
        tx.commit().map_err(|err| db_err(err.into()))?;
        Ok(())
    }

    fn workspace(&self, workspace_id: WorkspaceId) -> Result<Option<Workspace>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT record_json FROM workspaces \
                 WHERE workspace_id = ?1 AND deleted_at IS NULL",
                params![workspace_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        payload
            .map(|payload| from_record_json(&payload).map_err(StoreError::from))
            .transpose()
    }

    fn soft_delete_workspace(
        &self,
        workspace_id: WorkspaceId,
        actor: &AuditActor,
        now: Timestamp,
    ) -> Result<(), AuthorityError> {
        let mut guard = self.lock().map_err(db_err)?;
        let tx = guard.transaction().map_err(|err| db_err(err.into()))?;
        let payload: Option<String> = tx
            .query_row(
                "SELECT record_json FROM workspaces \
                 WHERE workspace_id = ?1 AND deleted_at IS NULL",
                params![workspace_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(err.into()))?;
        let Some(payload) = payload else {
            let entry = mutation_audit(
                actor,
                "workspace.soft_delete",
                "workspace",
                workspace_id.to_string(),
                None,
                false,
                Some("workspace not found".to_string()),
                now,
            );
            return Err(self.reject(
                tx,
                entry,
                AuthorityError::NotFound {
                    kind: "workspace",
                    id: workspace_id.to_string(),
                },
            ));
        };
        let mut workspace: Workspace = from_record_json(&payload).map_err(db_err)?;
        workspace.deleted_at = Some(now);
        tx.execute(
            "UPDATE workspaces SET deleted_at = ?1, record_json = ?2 WHERE workspace_id = ?3",
            params![
                now.as_unix_micros(),
                to_record_json(&workspace).map_err(db_err)?,
                workspace_id.to_string()
            ],
        )
        .map_err(|err| db_err(err.into()))?;
        insert_audit_tx(
            &tx,
            &mutation_audit(
                actor,
                "workspace.soft_delete",
                "workspace",
                workspace_id.to_string(),
                Some(workspace.enterprise_id),
                true,
                None,
                now,
            ),
        )
        .map_err(db_err)?;
        tx.commit().map_err(|err| db_err(err.into()))?;
        Ok(())
    }

    fn create_identity(
        &self,
        identity: ExecutionIdentity,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let now = self.clock.now();
        let mut guard = self.lock().map_err(db_err)?;
        let tx = guard.transaction().map_err(|err| db_err(err.into()))?;
        let user_id = identity.user_id;
        let workspace_payload: Option<String> = tx
            .query_row(
                "SELECT record_json FROM workspaces \
                 WHERE workspace_id = ?1 AND deleted_at IS NULL",
                params![identity.workspace_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(err.into()))?;
        let Some(workspace_payload) = workspace_payload else {
            let entry = mutation_audit(
                actor,
                "identity.create",
                "execution_identity",
                user_id.to_string(),
                Some(identity.enterprise_id),
                false,
                Some("workspace not found".to_string()),
                now,
            );
            return Err(self.reject(
                tx,
                entry,
                AuthorityError::NotFound {
                    kind: "workspace",
                    id: identity.workspace_id.to_string(),
                },
            ));
        };
        let workspace: Workspace = from_record_json(&workspace_payload).map_err(db_err)?;
        if !identity_consistent_with_workspace(identity.enterprise_id, &workspace) {
            let entry = mutation_audit(
                actor,
                "identity.create",
                "execution_identity",
                user_id.to_string(),
                Some(identity.enterprise_id),
                false,
                Some("identity enterprise differs from workspace enterprise".to_string()),
                now,
            );
            return Err(self.reject(
                tx,
                entry,
                AuthorityError::CrossEnterpriseForbidden(format!(
                    "identity {user_id} does not belong to enterprise of workspace {}",
                    identity.workspace_id
                )),
            ));
        }
        tx.execute(
            "INSERT INTO execution_identities (user_id, enterprise_id, workspace_id, \
             record_json) VALUES (?1, ?2, ?3, ?4)",
            params![
                user_id.to_string(),
                identity.enterprise_id.to_string(),
                identity.workspace_id.to_string(),
                to_record_json(&identity).map_err(db_err)?
            ],
        )
        .map_err(|err| db_err(err.into()))?;
        insert_audit_tx(
            &tx,
            &mutation_audit(
                actor,
                "identity.create",
                "execution_identity",
                user_id.to_string(),
                Some(identity.enterprise_id),
                true,
                None,
                now,
            ),
        )
        .map_err(db_err)?;
        tx.commit().map_err(|err| db_err(err.into()))?;
        Ok(())
    }

    fn identity(&self, user_id: IdentityId) -> Result<Option<ExecutionIdentity>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT record_json FROM execution_identities WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        payload
            .map(|payload| from_record_json(&payload).map_err(StoreError::from))
            .transpose()
    }

    fn change_identity_role(
        &self,
        user_id: IdentityId,
        new_role: IdentityRole,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let now = self.clock.now();
        let mut guard = self.lock().map_err(db_err)?;
        let tx = guard.transaction().map_err(|err| db_err(err.into()))?;
        let payload: Option<String> = tx
            .query_row(
                "SELECT record_json FROM execution_identities WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(err.into()))?;
        let Some(payload) = payload else {
            let entry = mutation_audit(
                actor,
                "identity.change_role",
                "execution_identity",
                user_id.to_string(),
                None,
                false,
                Some("identity not found".to_string()),
                now,
            );
            return Err(self.reject(
                tx,
                entry,
                AuthorityError::NotFound {
                    kind: "execution_identity",
                    id: user_id.to_string(),
                },
            ));
        };
        let mut identity: ExecutionIdentity = from_record_json(&payload).map_err(db_err)?;
        if !identity.role.may_transition_to(new_role) {
            let entry = mutation_audit(
                actor,
                "identity.change_role",
                "execution_identity",
                user_id.to_string(),
                Some(identity.enterprise_id),
                false,
                Some("direct promotion to SUPER_ADMIN is forbidden".to_string()),
                now,
            );
            return Err(self.reject(
                tx,
                entry,
                AuthorityError::RoleEscalationForbidden {
                    from: identity.role,
                    to: new_role,
                },
            ));
        }
        identity.role = new_role;
        tx.execute(
            "UPDATE execution_identities SET record_json = ?1 WHERE user_id = ?2",
            params![to_record_json(&identity).map_err(db_err)?, user_id.to_string()],
        )
        .map_err(|err| db_err(err.into()))?;
        insert_audit_tx(
            &tx,
            &mutation_audit(
                actor,
                "identity.change_role",
                "execution_identity",
                user_id.to_string(),
                Some(identity.enterprise_id),
                true,
                None,
                now,
            ),
        )
        .map_err(db_err)?;
        tx.commit().map_err(|err| db_err(err.into()))?;
        Ok(())
    }

    fn reassign_identity(
        &self,
        user_id: IdentityId,
        new_enterprise: Option<EnterpriseId>,
        new_workspace: Option<WorkspaceId>,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let now = self.clock.now();
        let mut guard = self.lock().map_err(db_err)?;
        let tx = guard.transaction().map_err(|err| db_err(err.into()))?;
        let enterprise_id: Option<String> = tx
            .query_row(
                "SELECT enterprise_id FROM execution_identities WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(err.into()))?;
        let entry = mutation_audit(
            actor,
            "identity.reassign",
            "execution_identity",
            user_id.to_string(),
            enterprise_id
                .as_deref()
                .and_then(|raw| Uuid::parse_str(raw).ok())
                .map(EnterpriseId::new),
            false,
            Some("enterprise and workspace pins are immutable".to_string()),
            now,
        );
        let error = if new_enterprise.is_some() {
            AuthorityError::CrossEnterpriseForbidden(format!(
                "identity {user_id} is pinned to its enterprise for life"
            ))
        } else if new_workspace.is_some() {
            AuthorityError::WorkspaceReassignmentForbidden(format!(
                "identity {user_id} is pinned to its workspace for life"
            ))
        } else {
            AuthorityError::Invalid("no reassignment target provided".to_string())
        };
        Err(self.reject(tx, entry, error))
    }

    fn reassign_workspace(
        &self,
        workspace_id: WorkspaceId,
        new_enterprise: EnterpriseId,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let now = self.clock.now();
        let mut guard = self.lock().map_err(db_err)?;
        let tx = guard.transaction().map_err(|err| db_err(err.into()))?;
        let entry = mutation_audit(
            actor,
            "workspace.reassign",
            "workspace",
            workspace_id.to_string(),
            None,
            false,
            Some(format!("workspace may not move to enterprise {new_enterprise}")),
            now,
        );
        Err(self.reject(
            tx,
            entry,
            AuthorityError::WorkspaceReassignmentForbidden(format!(
                "workspace {workspace_id} is pinned to its enterprise for life"
            )),
        ))
    }

    fn create_persona(&self, persona: Persona, actor: &AuditActor) -> Result<(), AuthorityError> {
        let now = self.clock.now();
        let mut guard = self.lock().map_err(db_err)?;
        let tx = guard.transaction().map_err(|err| db_err(err.into()))?;
        let persona_id = persona.persona_id;
        tx.execute(
            "INSERT INTO personas (persona_id, sub_vertical_id, created_at, record_json) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                persona_id.to_string(),
                persona.sub_vertical_id.as_str(),
                persona.created_at.as_unix_micros(),
                to_record_json(&persona).map_err(db_err)?
            ],
        )
        .map_err(|err| db_err(err.into()))?;
        insert_audit_tx(
            &tx,
            &mutation_audit(
                actor,
                "persona.create",
                "persona",
                persona_id.to_string(),
                None,
                true,
                None,
                now,
            ),
        )
        .map_err(db_err)?;
        tx.commit().map_err(|err| db_err(err.into()))?;
        Ok(())
    }

    fn persona(&self, persona_id: PersonaId) -> Result<Option<Persona>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT record_json FROM personas WHERE persona_id = ?1",
                params![persona_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        payload
            .map(|payload| from_record_json(&payload).map_err(StoreError::from))
            .transpose()
    }

    fn personas_for(&self, sub_vertical_id: &SubVerticalId) -> Result<Vec<Persona>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let mut stmt = guard
            .prepare(
                "SELECT record_json FROM personas WHERE sub_vertical_id = ?1 \
                 ORDER BY created_at ASC, persona_id ASC",
            )
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        let rows = stmt
            .query_map(params![sub_vertical_id.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        let mut personas = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
            personas.push(from_record_json(&payload).map_err(StoreError::from)?);
        }
        Ok(personas)
    }

    fn create_policy(&self, policy: Policy, actor: &AuditActor) -> Result<(), AuthorityError> {
        let now = self.clock.now();
        let mut guard = self.lock().map_err(db_err)?;
        let tx = guard.transaction().map_err(|err| db_err(err.into()))?;
        let policy_id = policy.policy_id;
        let persona_id = policy.persona_id;
        if policy.status == PolicyStatus::Active {
            let active_exists: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM persona_policies WHERE persona_id = ?1 AND status = 'ACTIVE'",
                    params![persona_id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| db_err(err.into()))?;
            if active_exists.is_some() {
                let entry = mutation_audit(
                    actor,
                    "policy.create",
                    "persona_policy",
                    policy_id.to_string(),
                    None,
                    false,
                    Some("persona already has an active policy".to_string()),
                    now,
                );
                return Err(self.reject(
                    tx,
                    entry,
                    AuthorityError::MultipleActivePolicies(persona_id),
                ));
            }
        }
        tx.execute(
            "INSERT INTO persona_policies (policy_id, persona_id, policy_version, status, \
             record_json) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                policy_id.to_string(),
                persona_id.to_string(),
                policy.policy_version,
                status_label(policy.status),
                to_record_json(&policy).map_err(db_err)?
            ],
        )
        .map_err(|err| db_err(err.into()))?;
        insert_audit_tx(
            &tx,
            &mutation_audit(
                actor,
                "policy.create",
                "persona_policy",
                policy_id.to_string(),
                None,
                true,
                None,
                now,
            ),
        )
        .map_err(db_err)?;
        tx.commit().map_err(|err| db_err(err.into()))?;
        Ok(())
    }

    fn set_policy_status(
        &self,
        policy_id: PolicyId,
        status: PolicyStatus,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let now = self.clock.now();
        let mut guard = self.lock().map_err(db_err)?;
        let tx = guard.transaction().map_err(|err| db_err(err.into()))?;
        let payload: Option<String> = tx
            .query_row(
                "SELECT record_json FROM persona_policies WHERE policy_id = ?1",
                params![policy_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(err.into()))?;
        let Some(payload) = payload else {
            let entry = mutation_audit(
                actor,
                "policy.set_status",
                "persona_policy",
                policy_id.to_string(),
                None,
                false,
                Some("policy not found".to_string()),
                now,
            );
            return Err(self.reject(
                tx,
                entry,
                AuthorityError::NotFound {
                    kind: "persona_policy",
                    id: policy_id.to_string(),
                },
            ));
        };
        let mut policy: Policy = from_record_json(&payload).map_err(db_err)?;
        if status == PolicyStatus::Active {
            let other_active: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM persona_policies \
                     WHERE persona_id = ?1 AND status = 'ACTIVE' AND policy_id <> ?2",
                    params![policy.persona_id.to_string(), policy_id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| db_err(err.into()))?;
            if other_active.is_some() {
                let entry = mutation_audit(
                    actor,
                    "policy.set_status",
                    "persona_policy",
                    policy_id.to_string(),
                    None,
                    false,
                    Some("persona already has an active policy".to_string()),
                    now,
                );
                return Err(self.reject(
                    tx,
                    entry,
                    AuthorityError::MultipleActivePolicies(policy.persona_id),
                ));
            }
        }
        policy.status = status;
        tx.execute(
            "UPDATE persona_policies SET status = ?1, record_json = ?2 WHERE policy_id = ?3",
            params![
                status_label(status),
                to_record_json(&policy).map_err(db_err)?,
                policy_id.to_string()
            ],
        )
        .map_err(|err| db_err(err.into()))?;
        insert_audit_tx(
            &tx,
            &mutation_audit(
                actor,
                "policy.set_status",
                "persona_policy",
                policy_id.to_string(),
                None,
                true,
                None,
                now,
            ),
        )
        .map_err(db_err)?;
        tx.commit().map_err(|err| db_err(err.into()))?;
        Ok(())
    }

    fn policies_for(&self, persona_id: PersonaId) -> Result<Vec<Policy>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let mut stmt = guard
            .prepare(
                "SELECT record_json FROM persona_policies WHERE persona_id = ?1 \
                 ORDER BY policy_version ASC",
            )
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        let rows = stmt
            .query_map(params![persona_id.to_string()], |row| row.get::<_, String>(0))
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        let mut policies = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
            policies.push(from_record_json(&payload).map_err(StoreError::from)?);
        }
        Ok(policies)
    }

    fn create_territory(
        &self,
        territory: Territory,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let now = self.clock.now();
        let mut guard = self.lock().map_err(db_err)?;
        let tx = guard.transaction().map_err(|err| db_err(err.into()))?;
        let territory_id = territory.territory_id;
        tx.execute(
            "INSERT INTO territories (territory_id, created_at, record_json) \
             VALUES (?1, ?2, ?3)",
            params![
                territory_id.to_string(),
                territory.created_at.as_unix_micros(),
                to_record_json(&territory).map_err(db_err)?
            ],
        )
        .map_err(|err| db_err(err.into()))?;
        insert_audit_tx(
            &tx,
            &mutation_audit(
                actor,
                "territory.create",
                "territory",
                territory_id.to_string(),
                None,
                true,
                None,
                now,
            ),
        )
        .map_err(db_err)?;
        tx.commit().map_err(|err| db_err(err.into()))?;
        Ok(())
    }

    fn territories(&self) -> Result<Vec<Territory>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let mut stmt = guard
            .prepare(
                "SELECT record_json FROM territories ORDER BY created_at ASC, territory_id ASC",
            )
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        let mut territories = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
            territories.push(from_record_json(&payload).map_err(StoreError::from)?);
        }
        Ok(territories)
    }

    fn bind_territory_sub_vertical(
        &self,
        binding: TerritorySubVertical,
        actor: &AuditActor,
    ) -> Result<(), AuthorityError> {
        let now = self.clock.now();
        let mut guard = self.lock().map_err(db_err)?;
        let tx = guard.transaction().map_err(|err| db_err(err.into()))?;
        let territory_id = binding.territory_id;
        let territory_exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM territories WHERE territory_id = ?1",
                params![territory_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(err.into()))?;
        if territory_exists.is_none() {
            let entry = mutation_audit(
                actor,
                "territory.bind_sub_vertical",
                "territory",
                territory_id.to_string(),
                None,
                false,
                Some("territory not found".to_string()),
                now,
            );
            return Err(self.reject(
                tx,
                entry,
                AuthorityError::NotFound {
                    kind: "territory",
                    id: territory_id.to_string(),
                },
            ));
        }
        tx.execute(
            "INSERT OR IGNORE INTO territory_sub_verticals (territory_id, sub_vertical_id) \
             VALUES (?1, ?2)",
            params![territory_id.to_string(), binding.sub_vertical_id.as_str()],
        )
        .map_err(|err| db_err(err.into()))?;
        insert_audit_tx(
            &tx,
            &mutation_audit(
                actor,
                "territory.bind_sub_vertical",
                "territory",
                territory_id.to_string(),
                None,
                true,
                None,
                now,
            ),
        )
        .map_err(db_err)?;
        tx.commit().map_err(|err| db_err(err.into()))?;
        Ok(())
    }

    fn has_territory_binding(
        &self,
        territory_id: TerritoryId,
        sub_vertical_id: &SubVerticalId,
    ) -> Result<bool, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let found: Option<i64> = guard
            .query_row(
                "SELECT 1 FROM territory_sub_verticals \
                 WHERE territory_id = ?1 AND sub_vertical_id = ?2",
                params![territory_id.to_string(), sub_vertical_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        Ok(found.is_some())
    }
}

// ============================================================================
// SECTION: Status Labels
// ============================================================================

/// Returns the stored status label for a policy status.
const fn status_label(status: PolicyStatus) -> &'static str {
    match status {
        PolicyStatus::Draft => "DRAFT",
        PolicyStatus::Staged => "STAGED",
        PolicyStatus::Active => "ACTIVE",
        PolicyStatus::Deprecated => "DEPRECATED",
    }
}
