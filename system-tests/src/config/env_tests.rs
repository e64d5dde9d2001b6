// system-tests/src/config/env_tests.rs
// ============================================================================
// Module: System Test Env Unit Tests
// Description: Unit coverage for system-test environment parsing.
// Purpose: Ensure configuration parsing fails closed on invalid inputs.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Unit coverage for system-test environment parsing.
//! Invariants:
//! - Environment parsing rejects invalid or empty values.
//! - Tests restore environment state after each run.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::time::Duration;

use super::SystemTestConfig;
use super::SystemTestEnv;

mod env_mut {
    #![allow(unsafe_code, reason = "Tests mutate process env vars in a controlled scope.")]

    /// Sets an environment variable for the current process.
    pub fn set_var(key: &str, value: &str) {
        // SAFETY: Tests serialize environment mutation via a global lock.
        unsafe {
            std::env::set_var(key, value);
        }
    }

    /// Removes an environment variable from the current process.
    pub fn remove_var(key: &str) {
        // SAFETY: Tests serialize environment mutation via a global lock.
        unsafe {
            std::env::remove_var(key);
        }
    }
}

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().expect("env lock poisoned")
}

struct EnvGuard {
    entries: Vec<(&'static str, Option<String>)>,
}

impl EnvGuard {
    fn capture() -> Self {
        let names = [
            SystemTestEnv::RunRoot.as_str(),
            SystemTestEnv::MediaUri.as_str(),
            SystemTestEnv::ReadyTimeoutSeconds.as_str(),
        ];
        let entries = names.iter().map(|name| (*name, std::env::var(*name).ok())).collect();
        Self {
            entries,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (name, value) in &self.entries {
            match value {
                Some(value) => env_mut::set_var(name, value),
                None => env_mut::remove_var(name),
            }
        }
    }
}

fn load_from(values: &[(SystemTestEnv, &str)]) -> Result<SystemTestConfig, String> {
    let map: HashMap<&str, String> =
        values.iter().map(|(key, value)| (key.as_str(), (*value).to_string())).collect();
    SystemTestConfig::load_with(|name| Ok(map.get(name).cloned()))
}

#[test]
fn defaults_apply_when_unset() {
    let config = load_from(&[]).unwrap();
    assert_eq!(config, SystemTestConfig::default());
    assert_eq!(config.ready_timeout, Duration::from_secs(30));
}

#[test]
fn values_are_parsed() {
    let config = load_from(&[
        (SystemTestEnv::RunRoot, "/tmp/grain-runs"),
        (SystemTestEnv::MediaUri, "http://media.local/clip.wav"),
        (SystemTestEnv::ReadyTimeoutSeconds, "5"),
    ])
    .unwrap();
    assert_eq!(config.run_root, Some(PathBuf::from("/tmp/grain-runs")));
    assert_eq!(config.media_uri.as_deref(), Some("http://media.local/clip.wav"));
    assert_eq!(config.ready_timeout, Duration::from_secs(5));
}

#[test]
fn invalid_values_fail_closed() {
    let err = load_from(&[(SystemTestEnv::MediaUri, "  ")]).unwrap_err();
    assert!(err.contains("must not be empty"));
    let err = load_from(&[(SystemTestEnv::ReadyTimeoutSeconds, "0")]).unwrap_err();
    assert!(err.contains("greater than zero"));
    let err = load_from(&[(SystemTestEnv::ReadyTimeoutSeconds, "soon")]).unwrap_err();
    assert!(err.contains("positive integer"));
}

#[test]
fn process_env_is_read() {
    let _lock = env_lock();
    let _guard = EnvGuard::capture();
    env_mut::set_var(SystemTestEnv::ReadyTimeoutSeconds.as_str(), "12");
    env_mut::remove_var(SystemTestEnv::RunRoot.as_str());
    env_mut::remove_var(SystemTestEnv::MediaUri.as_str());
    let config = SystemTestConfig::load().unwrap();
    assert_eq!(config.ready_timeout, Duration::from_secs(12));
    assert!(config.run_root.is_none());
}
