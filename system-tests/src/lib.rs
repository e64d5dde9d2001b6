// system-tests/src/lib.rs
// ============================================================================
// Module: Grain Harness System Tests Library
// Description: Shared configuration for live-runtime system tests.
// Purpose: Provide common settings for the system-test binaries.
// Dependencies: grain-harness
// ============================================================================

//! ## Overview
//! This crate hosts shared configuration used by the live-runtime scenarios in
//! `system-tests/tests`. The scenarios need a reachable flow runtime and only
//! build with the `system-tests` feature.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
