// crates/authority-kernel-core/src/core/trace.rs
// ============================================================================
// Module: Authority Kernel Trace Model
// Description: Immutable per-call interaction records with HMAC signatures.
// Purpose: Capture the ground truth a replay re-derives and audit reviews.
// Dependencies: serde, serde_json, crate::core::{hashing, identifiers,
// signature, time}
// ============================================================================

//! ## Overview
//! One `Interaction` is recorded per reasoning call. Records are append-only
//! and carry the envelope hash, policy lineage, tool usage, token counts,
//! risk score, and an HMAC-SHA256 signature over
//! `interaction_id ":" envelope_hash ":" outcome`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::hashing::ContentHash;
use crate::core::identifiers::InteractionId;
use crate::core::identifiers::PersonaId;
use crate::core::signature::SigningSecret;
use crate::core::signature::sign_interaction;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Risk score above which an escalation is triggered.
pub const ESCALATION_RISK_THRESHOLD: f64 = 0.7;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when recording interactions.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Risk score outside the closed interval [0, 1].
    #[error("risk score out of range: {0}")]
    RiskScoreOutOfRange(f64),
}

// ============================================================================
// SECTION: Policy Gates and Evidence
// ============================================================================

/// Action taken when a policy gate fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyGateAction {
    /// Gate evaluated and the call proceeded.
    Pass,
    /// Gate evaluated and the call was blocked.
    Block,
}

/// One policy gate evaluation observed during a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyGateHit {
    /// Gate label.
    pub gate: String,
    /// Whether the gate condition fired.
    pub triggered: bool,
    /// Reason recorded by the gate.
    pub reason: String,
    /// Action taken.
    pub action: PolicyGateAction,
}

/// One piece of evidence consumed during a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceUsed {
    /// Evidence source label.
    pub source: String,
    /// Content hash of the evidence payload.
    pub content_hash: ContentHash,
    /// Optional freshness window in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    /// Instant the evidence was fetched.
    pub fetched_at: Timestamp,
}

// ============================================================================
// SECTION: Interaction
// ============================================================================

/// Immutable record of one reasoning call.
///
/// # Invariants
/// - Never updated or deleted once appended.
/// - `escalation_triggered` equals `risk_score > 0.7`.
/// - `signature` covers `interaction_id ":" envelope_sha256 ":" outcome`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Interaction identifier.
    pub interaction_id: InteractionId,
    /// Hash of the envelope bound to the call.
    pub envelope_sha256: ContentHash,
    /// Envelope canonicalization version.
    pub envelope_version: String,
    /// Persona in effect.
    pub persona_id: PersonaId,
    /// Persona version in effect.
    pub persona_version: u32,
    /// Policy version in effect.
    pub policy_version: u32,
    /// Reasoner model slug.
    pub model_slug: String,
    /// Routing decision payload.
    pub routing_decision: Value,
    /// Tools the policy allowed.
    pub tools_allowed: Vec<String>,
    /// Tools the call actually used.
    pub tools_used: Vec<String>,
    /// Policy gate evaluations observed during the call.
    pub policy_gates_hit: Vec<PolicyGateHit>,
    /// Evidence consumed during the call.
    pub evidence_used: Vec<EvidenceUsed>,
    /// Input token count.
    pub tokens_in: u64,
    /// Output token count.
    pub tokens_out: u64,
    /// Estimated call cost.
    pub cost_estimate: f64,
    /// Whether a cached result served the call.
    pub cache_hit: bool,
    /// Risk score in [0, 1].
    pub risk_score: f64,
    /// Whether the risk score crossed the escalation threshold.
    pub escalation_triggered: bool,
    /// Call outcome label.
    pub outcome: String,
    /// Instant the call completed.
    pub occurred_at: Timestamp,
    /// HMAC-SHA256 signature in lowercase hex.
    pub signature: String,
}

/// Inputs required to record an interaction.
pub struct InteractionParams {
    /// Hash of the envelope bound to the call.
    pub envelope_sha256: ContentHash,
    /// Envelope canonicalization version.
    pub envelope_version: String,
    /// Persona in effect.
    pub persona_id: PersonaId,
    /// Persona version in effect.
    pub persona_version: u32,
    /// Policy version in effect.
    pub policy_version: u32,
    /// Reasoner model slug.
    pub model_slug: String,
    /// Routing decision payload.
    pub routing_decision: Value,
    /// Tools the policy allowed.
    pub tools_allowed: Vec<String>,
    /// Tools the call actually used.
    pub tools_used: Vec<String>,
    /// Policy gate evaluations observed during the call.
    pub policy_gates_hit: Vec<PolicyGateHit>,
    /// Evidence consumed during the call.
    pub evidence_used: Vec<EvidenceUsed>,
    /// Input token count.
    pub tokens_in: u64,
    /// Output token count.
    pub tokens_out: u64,
    /// Estimated call cost.
    pub cost_estimate: f64,
    /// Whether a cached result served the call.
    pub cache_hit: bool,
    /// Risk score in [0, 1].
    pub risk_score: f64,
    /// Call outcome label.
    pub outcome: String,
}

impl Interaction {
    /// Records a signed interaction.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::RiskScoreOutOfRange`] when the risk score falls
    /// outside [0, 1].
    pub fn record(
        params: InteractionParams,
        interaction_id: InteractionId,
        occurred_at: Timestamp,
        secret: &SigningSecret,
    ) -> Result<Self, TraceError> {
        if !(0.0 ..= 1.0).contains(&params.risk_score) {
            return Err(TraceError::RiskScoreOutOfRange(params.risk_score));
        }
        let escalation_triggered = params.risk_score > ESCALATION_RISK_THRESHOLD;
        let signature =
            sign_interaction(secret, &interaction_id, &params.envelope_sha256, &params.outcome);
        Ok(Self {
            interaction_id,
            envelope_sha256: params.envelope_sha256,
            envelope_version: params.envelope_version,
            persona_id: params.persona_id,
            persona_version: params.persona_version,
            policy_version: params.policy_version,
            model_slug: params.model_slug,
            routing_decision: params.routing_decision,
            tools_allowed: params.tools_allowed,
            tools_used: params.tools_used,
            policy_gates_hit: params.policy_gates_hit,
            evidence_used: params.evidence_used,
            tokens_in: params.tokens_in,
            tokens_out: params.tokens_out,
            cost_estimate: params.cost_estimate,
            cache_hit: params.cache_hit,
            risk_score: params.risk_score,
            escalation_triggered,
            outcome: params.outcome,
            occurred_at,
            signature,
        })
    }
}
