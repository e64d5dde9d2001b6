// system-tests/src/config/mod.rs
// ============================================================================
// Module: System Test Configuration
// Description: Settings for live-runtime system tests.
// Purpose: Provide typed access to test environment settings and defaults.
// Dependencies: grain-harness
// ============================================================================

//! ## Overview
//! Harness settings (admin port, WebSocket port, timeouts) come from
//! [`grain_harness::HarnessConfig::load`]. This module adds the knobs that only
//! the system tests need, read from `GRAIN_HARNESS_SYSTEM_TEST_*` variables.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod env;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod env_tests;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use env::SystemTestConfig;
pub use env::SystemTestEnv;
