// crates/grain-harness/src/config.rs
// ============================================================================
// Module: Harness Configuration
// Description: Typed configuration for flow lifecycle runs.
// Purpose: Replace process-wide port settings with an explicit value per run.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! [`HarnessConfig`] carries the admin API location, the WebSocket listen
//! address and the stall/connect timeouts for one driver instance. Values are
//! layered: defaults, then an optional TOML file, then environment overrides.
//! Environment values are parsed with strict UTF-8 enforcement; invalid or
//! empty values fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default admin API host.
pub const DEFAULT_RED_HOST: &str = "127.0.0.1";
/// Default admin API port.
pub const DEFAULT_RED_PORT: u16 = 1880;
/// Default WebSocket bind host.
pub const DEFAULT_WS_HOST: &str = "127.0.0.1";
/// Default WebSocket listen port.
pub const DEFAULT_WS_PORT: u16 = 8888;
/// Default stall-check interval in milliseconds.
pub const DEFAULT_FLOW_TIMEOUT_MS: u64 = 1_000;
/// Default wait for the flow's output connection in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Default sentinel field marking end-of-stream.
pub const DEFAULT_END_FIELD: &str = "close";
/// Maximum accepted config file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 64 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Config file or environment value could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Configuration is structurally valid but semantically invalid.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Environment Keys
// ============================================================================

/// Environment keys for harness configuration overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessEnv {
    /// Admin API host override.
    RedHost,
    /// Admin API port override.
    RedPort,
    /// WebSocket bind host override.
    WsHost,
    /// WebSocket listen port override.
    WsPort,
    /// Stall-check interval override in milliseconds.
    FlowTimeoutMs,
    /// Output connection wait override in milliseconds.
    ConnectTimeoutMs,
    /// Skip flow deletion (`true`/`false` or `1`/`0`).
    KeepFlow,
    /// End-of-stream sentinel field override.
    EndField,
}

impl HarnessEnv {
    /// Every recognized key, in precedence-neutral order.
    pub const ALL: [Self; 8] = [
        Self::RedHost,
        Self::RedPort,
        Self::WsHost,
        Self::WsPort,
        Self::FlowTimeoutMs,
        Self::ConnectTimeoutMs,
        Self::KeepFlow,
        Self::EndField,
    ];

    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RedHost => "GRAIN_HARNESS_RED_HOST",
            Self::RedPort => "GRAIN_HARNESS_RED_PORT",
            Self::WsHost => "GRAIN_HARNESS_WS_HOST",
            Self::WsPort => "GRAIN_HARNESS_WS_PORT",
            Self::FlowTimeoutMs => "GRAIN_HARNESS_FLOW_TIMEOUT_MS",
            Self::ConnectTimeoutMs => "GRAIN_HARNESS_CONNECT_TIMEOUT_MS",
            Self::KeepFlow => "GRAIN_HARNESS_KEEP_FLOW",
            Self::EndField => "GRAIN_HARNESS_END_FIELD",
        }
    }
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Configuration for a single flow lifecycle driver.
///
/// # Invariants
/// - `flow_timeout_ms` and `connect_timeout_ms` are greater than zero.
/// - `end_field` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Admin API host.
    pub red_host: String,
    /// Admin API port.
    pub red_port: u16,
    /// WebSocket bind host, also written into fixture taps.
    pub ws_host: String,
    /// WebSocket listen port (0 binds an ephemeral port).
    pub ws_port: u16,
    /// Stall-check interval in milliseconds.
    #[serde(rename = "flowTimeout")]
    pub flow_timeout_ms: u64,
    /// Wait for the output connection in milliseconds.
    #[serde(rename = "connectTimeout")]
    pub connect_timeout_ms: u64,
    /// Leave the flow deployed after the run for diagnostics.
    pub keep_flow: bool,
    /// Message field that marks end-of-stream.
    pub end_field: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            red_host: DEFAULT_RED_HOST.to_string(),
            red_port: DEFAULT_RED_PORT,
            ws_host: DEFAULT_WS_HOST.to_string(),
            ws_port: DEFAULT_WS_PORT,
            flow_timeout_ms: DEFAULT_FLOW_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            keep_flow: false,
            end_field: DEFAULT_END_FIELD.to_string(),
        }
    }
}

impl HarnessConfig {
    /// Loads configuration from an optional TOML file plus environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, an
    /// environment value is invalid, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML config file without applying environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable, oversized, not UTF-8,
    /// or not valid TOML for this schema.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses TOML content into a config. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies overrides from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a set variable is not UTF-8, is empty, or
    /// fails to parse.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(read_env_nonempty)
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// The lookup receives canonical [`HarnessEnv`] names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the lookup fails or a value fails to parse.
    pub fn apply_overrides<F>(&mut self, mut lookup: F) -> Result<(), ConfigError>
    where
        F: FnMut(&str) -> Result<Option<String>, ConfigError>,
    {
        for key in HarnessEnv::ALL {
            let name = key.as_str();
            let Some(raw) = lookup(name)? else {
                continue;
            };
            match key {
                HarnessEnv::RedHost => self.red_host = raw.trim().to_string(),
                HarnessEnv::RedPort => self.red_port = parse_port(name, &raw)?,
                HarnessEnv::WsHost => self.ws_host = raw.trim().to_string(),
                HarnessEnv::WsPort => self.ws_port = parse_port(name, &raw)?,
                HarnessEnv::FlowTimeoutMs => self.flow_timeout_ms = parse_millis(name, &raw)?,
                HarnessEnv::ConnectTimeoutMs => {
                    self.connect_timeout_ms = parse_millis(name, &raw)?;
                }
                HarnessEnv::KeepFlow => self.keep_flow = parse_bool(name, &raw)?,
                HarnessEnv::EndField => self.end_field = raw.trim().to_string(),
            }
        }
        Ok(())
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a timeout is zero or a host or
    /// the end field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flow_timeout_ms == 0 {
            return Err(ConfigError::Invalid("flowTimeout must be greater than zero".to_string()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "connectTimeout must be greater than zero".to_string(),
            ));
        }
        if self.red_host.trim().is_empty() {
            return Err(ConfigError::Invalid("redHost must not be empty".to_string()));
        }
        if self.ws_host.trim().is_empty() {
            return Err(ConfigError::Invalid("wsHost must not be empty".to_string()));
        }
        if self.end_field.trim().is_empty() {
            return Err(ConfigError::Invalid("endField must not be empty".to_string()));
        }
        Ok(())
    }

    /// Returns the stall-check interval.
    #[must_use]
    pub const fn flow_timeout(&self) -> Duration {
        Duration::from_millis(self.flow_timeout_ms)
    }

    /// Returns the output connection wait.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the admin API base URL.
    #[must_use]
    pub fn admin_base_url(&self) -> String {
        format!("http://{}", host_port(&self.red_host, self.red_port))
    }

    /// Returns the WebSocket bind address.
    #[must_use]
    pub fn ws_bind_addr(&self) -> String {
        host_port(&self.ws_host, self.ws_port)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Joins a host and port, bracketing bare IPv6 literals.
#[must_use]
pub fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn read_env_strict(name: &str) -> Result<Option<String>, ConfigError> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string()
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("{name} must be valid UTF-8")))
    })
}

/// Reads an environment variable and rejects empty values.
fn read_env_nonempty(name: &str) -> Result<Option<String>, ConfigError> {
    match read_env_strict(name)? {
        Some(value) if value.trim().is_empty() => {
            Err(ConfigError::Invalid(format!("{name} must not be empty")))
        }
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}

/// Parses a TCP port number.
fn parse_port(name: &str, raw: &str) -> Result<u16, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Parse(format!("{name} must be a port number")))
}

/// Parses a positive millisecond count.
fn parse_millis(name: &str, raw: &str) -> Result<u64, ConfigError> {
    let millis: u64 = raw.trim().parse().map_err(|_| {
        ConfigError::Parse(format!("{name} must be a positive integer number of milliseconds"))
    })?;
    if millis == 0 {
        return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
    }
    Ok(millis)
}

/// Parses a boolean literal.
fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
        return Ok(true);
    }
    if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
        return Ok(false);
    }
    Err(ConfigError::Parse(format!("{name} must be 1, 0, true, or false")))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
