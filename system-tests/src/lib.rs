// system-tests/src/lib.rs
// ============================================================================
// Module: System Tests Crate
// Description: Placeholder library for the end-to-end test crate.
// Purpose: Host cross-crate scenario tests under tests/.
// Dependencies: none
// ============================================================================

//! ## Overview
//! This crate exists to run end-to-end scenarios wiring the kernel core,
//! governance, config, and SQLite store together. All content lives under
//! `tests/`.
