// crates/authority-kernel-core/src/core/entropy.rs
// ============================================================================
// Module: Authority Kernel Entropy Services
// Description: Injected identifier and token generators.
// Purpose: Keep random material behind seams so tests can stub generation.
// Dependencies: base64, rand, uuid
// ============================================================================

//! ## Overview
//! Record identities and evaluator invite tokens are random material. Both
//! are drawn through injected sources so deterministic tests can replace
//! them, mirroring how wall-clock reads are injected via
//! [`crate::core::time::Clock`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use uuid::Uuid;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of random bytes backing an evaluator invite token.
pub const INVITE_TOKEN_BYTES: usize = 48;

// ============================================================================
// SECTION: Identifier Source
// ============================================================================

/// Injected source of 128-bit record identities.
pub trait IdSource: Send + Sync {
    /// Returns a fresh identifier.
    fn next_id(&self) -> Uuid;
}

/// Identifier source backed by UUID v4 random generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdSource;

impl IdSource for RandomIdSource {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Deterministic identifier source for tests.
///
/// # Invariants
/// - Issues strictly increasing identifiers starting at the seed value.
#[derive(Debug, Default)]
pub struct SequentialIdSource {
    /// Next raw identifier value.
    next: AtomicU64,
}

impl SequentialIdSource {
    /// Creates a sequential source starting at the provided seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            next: AtomicU64::new(seed),
        }
    }
}

impl IdSource for SequentialIdSource {
    fn next_id(&self) -> Uuid {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        Uuid::from_u128(u128::from(raw))
    }
}

// ============================================================================
// SECTION: Token Source
// ============================================================================

/// Injected source of URL-safe invite tokens.
pub trait TokenSource: Send + Sync {
    /// Returns a fresh URL-safe token.
    fn next_token(&self) -> String;
}

/// Token source drawing [`INVITE_TOKEN_BYTES`] bytes from the OS RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokenSource;

impl TokenSource for RandomTokenSource {
    fn next_token(&self) -> String {
        let mut bytes = [0u8; INVITE_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// Deterministic token source for tests.
///
/// # Invariants
/// - Issues tokens derived from a strictly increasing counter.
#[derive(Debug, Default)]
pub struct SequentialTokenSource {
    /// Next raw token counter value.
    next: AtomicU64,
}

impl SequentialTokenSource {
    /// Creates a sequential token source starting at the provided seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            next: AtomicU64::new(seed),
        }
    }
}

impl TokenSource for SequentialTokenSource {
    fn next_token(&self) -> String {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        let mut bytes = [0u8; INVITE_TOKEN_BYTES];
        bytes[.. 8].copy_from_slice(&raw.to_be_bytes());
        URL_SAFE_NO_PAD.encode(bytes)
    }
}
