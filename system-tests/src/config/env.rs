// system-tests/src/config/env.rs
// ============================================================================
// Module: System Test Environment
// Description: Environment-backed settings for live-runtime scenarios.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: grain-harness
// ============================================================================

//! ## Overview
//! Environment values are read with strict UTF-8 enforcement; empty or
//! malformed values fail closed instead of falling back to defaults.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use grain_harness::config::read_env_strict;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default wait for the admin API to answer before scenarios start.
const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment keys for system test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTestEnv {
    /// Optional artifact root override.
    RunRoot,
    /// Optional media resource staged by the fetch scenario.
    MediaUri,
    /// Optional admin readiness timeout in seconds (positive integer).
    ReadyTimeoutSeconds,
}

impl SystemTestEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunRoot => "GRAIN_HARNESS_SYSTEM_TEST_RUN_ROOT",
            Self::MediaUri => "GRAIN_HARNESS_SYSTEM_TEST_MEDIA_URI",
            Self::ReadyTimeoutSeconds => "GRAIN_HARNESS_SYSTEM_TEST_READY_TIMEOUT_SEC",
        }
    }
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Typed system test settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemTestConfig {
    /// Optional artifact root override.
    pub run_root: Option<PathBuf>,
    /// Media resource for the staging scenario; the scenario is skipped when unset.
    pub media_uri: Option<String>,
    /// Wait for the admin API before scenarios start.
    pub ready_timeout: Duration,
}

impl Default for SystemTestConfig {
    fn default() -> Self {
        Self {
            run_root: None,
            media_uri: None,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }
}

impl SystemTestConfig {
    /// Loads settings from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when a value is not valid UTF-8, is empty, or fails
    /// validation.
    pub fn load() -> Result<Self, String> {
        Self::load_with(|name| read_env_strict(name).map_err(|err| err.to_string()))
    }

    /// Loads settings through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Returns an error when `lookup` fails, a value is empty, or the timeout
    /// is not a positive integer.
    pub fn load_with<F>(mut lookup: F) -> Result<Self, String>
    where
        F: FnMut(&str) -> Result<Option<String>, String>,
    {
        let mut read = |key: SystemTestEnv| -> Result<Option<String>, String> {
            match lookup(key.as_str())? {
                Some(value) if value.trim().is_empty() => {
                    Err(format!("{} must not be empty", key.as_str()))
                }
                other => Ok(other),
            }
        };
        let run_root = read(SystemTestEnv::RunRoot)?.map(PathBuf::from);
        let media_uri = read(SystemTestEnv::MediaUri)?;
        let ready_timeout = read(SystemTestEnv::ReadyTimeoutSeconds)?
            .map(|raw| parse_timeout_seconds(SystemTestEnv::ReadyTimeoutSeconds.as_str(), &raw))
            .transpose()?
            .unwrap_or(DEFAULT_READY_TIMEOUT);
        Ok(Self {
            run_root,
            media_uri,
            ready_timeout,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a positive number of seconds.
fn parse_timeout_seconds(name: &str, raw: &str) -> Result<Duration, String> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{name} must be a positive integer number of seconds"))?;
    if secs == 0 {
        return Err(format!("{name} must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}
