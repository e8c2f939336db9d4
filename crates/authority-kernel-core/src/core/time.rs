// crates/authority-kernel-core/src/core/time.rs
// ============================================================================
// Module: Authority Kernel Time Model
// Description: Microsecond-precision UTC timestamps and injected clocks.
// Purpose: Keep kernel logic deterministic by injecting every wall-clock read.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! The kernel stores all timestamps as UTC unix microseconds. Pure kernel
//! logic never reads the wall clock directly; hosts inject a [`Clock`] so
//! tests can pin time and sealing stays reproducible.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// UTC timestamp with microsecond precision.
///
/// # Invariants
/// - Serializes as a signed unix-microsecond integer for canonical hashing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix microseconds.
    #[must_use]
    pub const fn from_unix_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Returns the timestamp as unix microseconds.
    #[must_use]
    pub const fn as_unix_micros(&self) -> i64 {
        self.0
    }

    /// Returns a timestamp advanced by the provided number of microseconds.
    #[must_use]
    pub const fn saturating_add_micros(&self, micros: i64) -> Self {
        Self(self.0.saturating_add(micros))
    }

    /// Returns a timestamp advanced by the provided number of whole seconds.
    #[must_use]
    pub const fn saturating_add_seconds(&self, seconds: i64) -> Self {
        Self(self.0.saturating_add(seconds.saturating_mul(1_000_000)))
    }

    /// Returns a timestamp advanced by the provided number of whole days.
    #[must_use]
    pub const fn saturating_add_days(&self, days: i64) -> Self {
        self.saturating_add_seconds(days.saturating_mul(86_400))
    }

    /// Returns true when this timestamp is strictly before `other`.
    #[must_use]
    pub const fn is_before(&self, other: Self) -> bool {
        self.0 < other.0
    }

    /// Converts a calendar instant into a kernel timestamp.
    #[must_use]
    pub fn from_offset(instant: OffsetDateTime) -> Self {
        let nanos = instant.unix_timestamp_nanos();
        let micros = nanos.div_euclid(1_000);
        Self(i64::try_from(micros).unwrap_or(i64::MAX))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = i128::from(self.0).saturating_mul(1_000);
        match OffsetDateTime::from_unix_timestamp_nanos(nanos) {
            Ok(instant) => match instant.format(&Rfc3339) {
                Ok(rendered) => f.write_str(&rendered),
                Err(_) => self.0.fmt(f),
            },
            Err(_) => self.0.fmt(f),
        }
    }
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Injected wall-clock source.
///
/// # Invariants
/// - Implementations must return UTC instants; monotonicity is a host
///   responsibility.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Timestamp;
}

/// Clock backed by the operating system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_offset(OffsetDateTime::now_utc())
    }
}

/// Manually advanced clock for deterministic tests.
///
/// # Invariants
/// - Time only changes through [`ManualClock::set`] and
///   [`ManualClock::advance_micros`].
#[derive(Debug, Default)]
pub struct ManualClock {
    /// Current pinned instant in unix microseconds.
    now: Mutex<i64>,
}

impl ManualClock {
    /// Creates a manual clock pinned to the provided instant.
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start.as_unix_micros()),
        }
    }

    /// Pins the clock to the provided instant.
    pub fn set(&self, instant: Timestamp) {
        let mut guard = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = instant.as_unix_micros();
    }

    /// Advances the clock by the provided number of microseconds.
    pub fn advance_micros(&self, micros: i64) {
        let mut guard = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = guard.saturating_add(micros);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let guard = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Timestamp::from_unix_micros(*guard)
    }
}
