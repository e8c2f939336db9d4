// crates/authority-kernel-core/src/core/identifiers.rs
// ============================================================================
// Module: Authority Kernel Identifiers
// Description: Canonical opaque identifiers for authority records and runs.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout the
//! Authority Kernel. Record identities are 128-bit random UUIDs; business
//! keys such as sub-verticals and region codes are opaque strings. All
//! identifiers serialize transparently so wire forms stay stable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: UUID Identifier Macro
// ============================================================================

/// Declares a UUID-backed identifier newtype with stable serialization.
macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        ///
        /// # Invariants
        /// - Wraps a 128-bit UUID; serializes as its hyphenated string form.
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates an identifier from an existing UUID.
            #[must_use]
            pub const fn new(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

uuid_identifier! {
    /// Enterprise identifier (tenant root).
    EnterpriseId
}

uuid_identifier! {
    /// Workspace identifier pinned to one enterprise for life.
    WorkspaceId
}

uuid_identifier! {
    /// Execution identity identifier pinned to one workspace for life.
    IdentityId
}

uuid_identifier! {
    /// Persona identifier for an addressable reasoning configuration.
    PersonaId
}

uuid_identifier! {
    /// Policy identifier for a versioned behavioral specification.
    PolicyId
}

uuid_identifier! {
    /// Territory identifier for a hierarchical geographic scope.
    TerritoryId
}

uuid_identifier! {
    /// Sealed envelope identifier.
    EnvelopeId
}

uuid_identifier! {
    /// Runtime gate violation identifier.
    ViolationId
}

uuid_identifier! {
    /// Replay attempt identifier.
    ReplayId
}

uuid_identifier! {
    /// Interaction (trace record) identifier.
    InteractionId
}

uuid_identifier! {
    /// Benchmark suite identifier.
    SuiteId
}

uuid_identifier! {
    /// Validation run identifier.
    RunId
}

uuid_identifier! {
    /// Human calibration session identifier.
    SessionId
}

uuid_identifier! {
    /// Evaluator invite identifier.
    InviteId
}

// ============================================================================
// SECTION: String Identifier Macro
// ============================================================================

/// Declares a string-backed identifier newtype with stable serialization.
macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        ///
        /// # Invariants
        /// - Opaque UTF-8 string; no normalization is applied by this type.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_identifier! {
    /// Sub-vertical business key (for example a market segment).
    SubVerticalId
}

string_identifier! {
    /// Scenario identifier within a benchmark suite.
    ScenarioId
}

string_identifier! {
    /// Stable suite key shared across suite versions.
    SuiteKey
}

// ============================================================================
// SECTION: Region Code
// ============================================================================

/// Hierarchical region code such as `UAE` or `UAE-DUBAI`.
///
/// # Invariants
/// - Segments are joined by `-`; the leading segment addresses the widest
///   enclosing region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionCode(String);

impl RegionCode {
    /// Creates a new region code.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the region code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the leading segment of the code, split on `-`.
    ///
    /// `UAE-DUBAI` yields `UAE`; a code without separators yields itself.
    #[must_use]
    pub fn leading_segment(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }

    /// Returns true when this code starts with the provided prefix code.
    #[must_use]
    pub fn has_prefix(&self, prefix: &Self) -> bool {
        self.0.starts_with(prefix.as_str())
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RegionCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RegionCode {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
