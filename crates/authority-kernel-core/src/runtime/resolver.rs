// crates/authority-kernel-core/src/runtime/resolver.rs
// ============================================================================
// Module: Authority Kernel Resolver
// Description: Persona, policy, and territory resolution with inheritance.
// Purpose: Resolve exactly one persona/policy and territory per request,
// with an auditable resolution path.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Resolution is pure: given authority snapshots it deterministically probes
//! persona scopes in LOCAL, REGIONAL, GLOBAL order and territory identifiers
//! at five depths, short-circuiting on the first hit. Each probe is echoed
//! into a path string (empty segments render as `none`) so every sealed
//! envelope can explain how its persona and territory were chosen. Negative
//! outcomes are typed and never mutate state; the resolver never retries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::authority::Persona;
use crate::core::authority::PersonaScope;
use crate::core::authority::PolicyStatus;
use crate::core::authority::Territory;
use crate::core::authority::TerritoryLevel;
use crate::core::authority::TerritoryStatus;
use crate::core::authority::territory_covers_sub_vertical;
use crate::core::codes::ErrorCode;
use crate::core::identifiers::PersonaId;
use crate::core::identifiers::PolicyId;
use crate::core::identifiers::RegionCode;
use crate::core::identifiers::SubVerticalId;
use crate::core::identifiers::TerritoryId;
use crate::interfaces::AuthorityStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Resolution Results
// ============================================================================

/// Successful persona resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaResolution {
    /// Resolved persona.
    pub persona_id: PersonaId,
    /// Scope at which the probe matched.
    pub scope: PersonaScope,
    /// Probe-by-probe audit path.
    pub resolution_path: String,
}

/// Successful territory resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryResolution {
    /// Resolved territory.
    pub territory_id: TerritoryId,
    /// Probe depth that matched (1..=5).
    pub resolution_depth: u8,
    /// Probe-by-probe audit path.
    pub resolution_path: String,
}

/// The single active policy of a persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePolicy {
    /// Active policy identifier.
    pub policy_id: PolicyId,
    /// Active policy version.
    pub policy_version: u32,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Typed negative resolution outcomes.
///
/// # Invariants
/// - Resolution failures are configuration problems; callers must not retry.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No persona matched any probe.
    #[error("persona not resolved: {probed}")]
    PersonaNotResolved {
        /// Full probe path that produced no match.
        probed: String,
    },
    /// No territory matched any probe.
    #[error("territory not configured: {probed}")]
    TerritoryNotConfigured {
        /// Full probe path that produced no match.
        probed: String,
    },
    /// The matched territory does not cover the requested sub-vertical.
    #[error("territory {territory_id} not configured for sub-vertical {sub_vertical_id}")]
    TerritoryNotConfiguredForSubVertical {
        /// Matched territory.
        territory_id: TerritoryId,
        /// Requested sub-vertical.
        sub_vertical_id: SubVerticalId,
    },
    /// The persona has no active policy.
    #[error("no active policy for persona {0}")]
    PolicyNotFound(PersonaId),
    /// The persona has more than one active policy.
    #[error("multiple active policies for persona {0}")]
    MultipleActivePolicies(PersonaId),
    /// Infrastructure failure while reading the authority store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResolveError {
    /// Returns the stable error code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::PersonaNotResolved {
                ..
            } => ErrorCode::PersonaNotResolved,
            Self::TerritoryNotConfigured {
                ..
            } => ErrorCode::TerritoryNotConfigured,
            Self::TerritoryNotConfiguredForSubVertical {
                ..
            } => ErrorCode::TerritoryNotConfiguredForSubVertical,
            Self::PolicyNotFound(_) => ErrorCode::PolicyNotFound,
            Self::MultipleActivePolicies(_) => ErrorCode::MultipleActivePolicies,
            Self::Store(_) => ErrorCode::ValidationFailed,
        }
    }
}

// ============================================================================
// SECTION: Path Rendering
// ============================================================================

/// Separator between probe segments in resolution paths.
const PATH_SEPARATOR: &str = " \u{2192} ";

/// Renders one parameterized probe segment, using `none` for empty values.
fn probe_segment(label: &str, value: Option<&str>) -> String {
    format!("{label}({})", value.unwrap_or("none"))
}

// ============================================================================
// SECTION: Persona Resolution
// ============================================================================

/// Resolves a persona from an authority snapshot.
///
/// Probes LOCAL (exact region match), REGIONAL (leading-segment or prefix
/// match), then GLOBAL, requiring `is_active` throughout and
/// short-circuiting after the first hit. Ties at one probe break by
/// ascending creation time.
///
/// # Errors
///
/// Returns [`ResolveError::PersonaNotResolved`] when no probe matches.
pub fn resolve_persona_in(
    personas: &[Persona],
    sub_vertical_id: &SubVerticalId,
    region_code: Option<&RegionCode>,
) -> Result<PersonaResolution, ResolveError> {
    let candidates: Vec<&Persona> = personas
        .iter()
        .filter(|persona| persona.is_active && &persona.sub_vertical_id == sub_vertical_id)
        .collect();
    let mut path: Vec<String> = Vec::with_capacity(3);

    path.push(probe_segment("LOCAL", region_code.map(RegionCode::as_str)));
    if let Some(requested) = region_code
        && let Some(hit) = first_by_created(candidates.iter().copied().filter(|persona| {
            persona.scope == PersonaScope::Local
                && persona.region_code.as_ref() == Some(requested)
        }))
    {
        return Ok(PersonaResolution {
            persona_id: hit.persona_id,
            scope: PersonaScope::Local,
            resolution_path: path.join(PATH_SEPARATOR),
        });
    }

    let regional_hit = region_code.and_then(|requested| {
        first_by_created(candidates.iter().copied().filter(|persona| {
            persona.scope == PersonaScope::Regional
                && persona.region_code.as_ref().is_some_and(|stored| {
                    stored.as_str() == requested.leading_segment() || requested.has_prefix(stored)
                })
        }))
    });
    path.push(probe_segment(
        "REGIONAL",
        regional_hit.and_then(|persona| persona.region_code.as_ref().map(RegionCode::as_str)),
    ));
    if let Some(hit) = regional_hit {
        return Ok(PersonaResolution {
            persona_id: hit.persona_id,
            scope: PersonaScope::Regional,
            resolution_path: path.join(PATH_SEPARATOR),
        });
    }

    path.push("GLOBAL".to_string());
    if let Some(hit) = first_by_created(
        candidates.iter().copied().filter(|persona| persona.scope == PersonaScope::Global),
    ) {
        return Ok(PersonaResolution {
            persona_id: hit.persona_id,
            scope: PersonaScope::Global,
            resolution_path: path.join(PATH_SEPARATOR),
        });
    }

    Err(ResolveError::PersonaNotResolved {
        probed: path.join(PATH_SEPARATOR),
    })
}

/// Returns the earliest-created persona among equally valid matches.
fn first_by_created<'a>(matches: impl Iterator<Item = &'a Persona>) -> Option<&'a Persona> {
    matches.min_by_key(|persona| (persona.created_at, persona.persona_id))
}

// ============================================================================
// SECTION: Territory Resolution
// ============================================================================

/// Resolves a territory from an authority snapshot.
///
/// Probes exact region code, country code (country level), case-insensitive
/// slug, case-insensitive name, then the GLOBAL fallback;
/// `resolution_depth` is 1..=5 matching the probe that hit. Ties at one
/// probe break by level specificity, then ascending creation time.
///
/// # Errors
///
/// Returns [`ResolveError::TerritoryNotConfigured`] when no probe matches.
pub fn resolve_territory_in(
    territories: &[Territory],
    region_code: &RegionCode,
) -> Result<TerritoryResolution, ResolveError> {
    let candidates: Vec<&Territory> = territories
        .iter()
        .filter(|territory| territory.status == TerritoryStatus::Active)
        .collect();
    let requested = region_code.as_str();
    let country = region_code.leading_segment();
    let mut path: Vec<String> = Vec::with_capacity(5);

    path.push(probe_segment("REGION", Some(requested)));
    if let Some(hit) = best_territory(&candidates, |territory| {
        territory.region_code.as_ref().is_some_and(|code| code.as_str() == requested)
    }) {
        return Ok(territory_hit(hit, 1, &path));
    }

    path.push(probe_segment("COUNTRY", Some(country)));
    if let Some(hit) = best_territory(&candidates, |territory| {
        territory.level == TerritoryLevel::Country && territory.country_code.as_deref() == Some(country)
    }) {
        return Ok(territory_hit(hit, 2, &path));
    }

    path.push(probe_segment("SLUG", Some(requested)));
    if let Some(hit) =
        best_territory(&candidates, |territory| territory.slug.eq_ignore_ascii_case(requested))
    {
        return Ok(territory_hit(hit, 3, &path));
    }

    path.push(probe_segment("NAME", Some(requested)));
    if let Some(hit) =
        best_territory(&candidates, |territory| territory.name.eq_ignore_ascii_case(requested))
    {
        return Ok(territory_hit(hit, 4, &path));
    }

    path.push("GLOBAL".to_string());
    if let Some(hit) =
        best_territory(&candidates, |territory| territory.level == TerritoryLevel::Global)
    {
        return Ok(territory_hit(hit, 5, &path));
    }

    Err(ResolveError::TerritoryNotConfigured {
        probed: path.join(PATH_SEPARATOR),
    })
}

/// Returns the most specific, earliest-created territory matching a probe.
fn best_territory<'a>(
    candidates: &[&'a Territory],
    probe: impl Fn(&Territory) -> bool,
) -> Option<&'a Territory> {
    candidates.iter().copied().filter(|territory| probe(territory)).min_by_key(|territory| {
        (territory.level.specificity(), territory.created_at, territory.territory_id)
    })
}

/// Builds a territory resolution for a probe hit.
fn territory_hit(territory: &Territory, resolution_depth: u8, path: &[String]) -> TerritoryResolution {
    TerritoryResolution {
        territory_id: territory.territory_id,
        resolution_depth,
        resolution_path: path.join(PATH_SEPARATOR),
    }
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Resolver bound to an authority store.
///
/// # Invariants
/// - Read-only: resolution never mutates authority state.
pub struct Resolver<'a, S: AuthorityStore> {
    /// Authority store snapshot source.
    store: &'a S,
}

impl<'a, S: AuthorityStore> Resolver<'a, S> {
    /// Creates a resolver over an authority store.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self {
            store,
        }
    }

    /// Resolves a persona for a sub-vertical and optional region.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::PersonaNotResolved`] when no probe matches,
    /// or [`ResolveError::Store`] on infrastructure failure.
    pub fn resolve_persona(
        &self,
        sub_vertical_id: &SubVerticalId,
        region_code: Option<&RegionCode>,
    ) -> Result<PersonaResolution, ResolveError> {
        let personas = self.store.personas_for(sub_vertical_id)?;
        resolve_persona_in(&personas, sub_vertical_id, region_code)
    }

    /// Resolves a territory for a region, gating sub-vertical coverage.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::TerritoryNotConfigured`] when no probe
    /// matches, or
    /// [`ResolveError::TerritoryNotConfiguredForSubVertical`] when the
    /// matched territory does not cover the requested sub-vertical.
    pub fn resolve_territory(
        &self,
        region_code: &RegionCode,
        sub_vertical_id: Option<&SubVerticalId>,
    ) -> Result<TerritoryResolution, ResolveError> {
        let territories = self.store.territories()?;
        let resolution = resolve_territory_in(&territories, region_code)?;
        if let Some(sub_vertical_id) = sub_vertical_id {
            let territory = territories
                .iter()
                .find(|territory| territory.territory_id == resolution.territory_id);
            let has_binding =
                self.store.has_territory_binding(resolution.territory_id, sub_vertical_id)?;
            let covered = territory
                .is_some_and(|territory| territory_covers_sub_vertical(territory, has_binding));
            if !covered {
                return Err(ResolveError::TerritoryNotConfiguredForSubVertical {
                    territory_id: resolution.territory_id,
                    sub_vertical_id: sub_vertical_id.clone(),
                });
            }
        }
        Ok(resolution)
    }

    /// Returns the single active policy for a persona.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::PolicyNotFound`] on zero active policies and
    /// [`ResolveError::MultipleActivePolicies`] on more than one.
    pub fn active_policy(&self, persona_id: PersonaId) -> Result<ActivePolicy, ResolveError> {
        let policies = self.store.policies_for(persona_id)?;
        let mut active =
            policies.iter().filter(|policy| policy.status == PolicyStatus::Active);
        match (active.next(), active.next()) {
            (None, _) => Err(ResolveError::PolicyNotFound(persona_id)),
            (Some(_), Some(_)) => Err(ResolveError::MultipleActivePolicies(persona_id)),
            (Some(policy), None) => Ok(ActivePolicy {
                policy_id: policy.policy_id,
                policy_version: policy.policy_version,
            }),
        }
    }
}
