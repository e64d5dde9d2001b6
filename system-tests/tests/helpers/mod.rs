// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for grain harness system-tests.
// Purpose: Provide readiness probes, fixtures, and artifact utilities.
// Dependencies: system-tests, grain-harness
// ============================================================================

//! ## Overview
//! Shared helpers for grain harness system-tests.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod artifacts;
pub mod fixtures;
pub mod readiness;
