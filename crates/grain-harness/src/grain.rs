// crates/grain-harness/src/grain.rs
// ============================================================================
// Module: Grain Validator
// Description: Grain value reconstructed from flow output and its checks.
// Purpose: Give tests one assertion surface for grain shape.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`Grain`] is rebuilt from the fields of one output message. The value
//! keeps the raw wire fields so that [`Grain::check`] can report absent
//! fields separately from malformed ones. No transformation happens here.
//! Invariants:
//! - A valid grain carries exactly one payload segment of positive size.
//! - Both PTP timestamps parse as `<seconds>:<nanoseconds>`.
//! - Flow id, source id and duration are present and non-empty.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Nanoseconds per second; PTP nanosecond fields must stay below this.
const NANOS_PER_SECOND: u32 = 1_000_000_000;

// ============================================================================
// SECTION: Timestamps and Durations
// ============================================================================

/// PTP timestamp in `<seconds>:<nanoseconds>` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PtpTimestamp {
    /// Whole seconds since the PTP epoch.
    seconds: u64,
    /// Sub-second nanoseconds.
    nanoseconds: u32,
}

impl PtpTimestamp {
    /// Builds a timestamp, rejecting out-of-range nanoseconds.
    #[must_use]
    pub const fn new(seconds: u64, nanoseconds: u32) -> Option<Self> {
        if nanoseconds >= NANOS_PER_SECOND {
            return None;
        }
        Some(Self {
            seconds,
            nanoseconds,
        })
    }

    /// Returns the seconds component.
    #[must_use]
    pub const fn seconds(self) -> u64 {
        self.seconds
    }

    /// Returns the nanoseconds component.
    #[must_use]
    pub const fn nanoseconds(self) -> u32 {
        self.nanoseconds
    }
}

impl FromStr for PtpTimestamp {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (secs, nanos) =
            raw.trim().split_once(':').ok_or_else(|| format!("'{raw}' is not seconds:nanos"))?;
        let seconds = secs.parse().map_err(|_| format!("'{raw}' has invalid seconds"))?;
        let nanoseconds = nanos.parse().map_err(|_| format!("'{raw}' has invalid nanoseconds"))?;
        Self::new(seconds, nanoseconds).ok_or_else(|| format!("'{raw}' nanoseconds out of range"))
    }
}

impl fmt::Display for PtpTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.seconds, self.nanoseconds)
    }
}

/// Grain duration as a rational number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrainDuration {
    /// Numerator.
    numerator: u64,
    /// Denominator, never zero.
    denominator: u64,
}

impl GrainDuration {
    /// Builds a duration; both parts must be non-zero.
    #[must_use]
    pub const fn new(numerator: u64, denominator: u64) -> Option<Self> {
        if numerator == 0 || denominator == 0 {
            return None;
        }
        Some(Self {
            numerator,
            denominator,
        })
    }

    /// Returns the numerator.
    #[must_use]
    pub const fn numerator(self) -> u64 {
        self.numerator
    }

    /// Returns the denominator.
    #[must_use]
    pub const fn denominator(self) -> u64 {
        self.denominator
    }
}

impl FromStr for GrainDuration {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (num, den) =
            raw.trim().split_once('/').ok_or_else(|| format!("'{raw}' is not num/den"))?;
        let numerator = num.parse().map_err(|_| format!("'{raw}' has invalid numerator"))?;
        let denominator = den.parse().map_err(|_| format!("'{raw}' has invalid denominator"))?;
        Self::new(numerator, denominator).ok_or_else(|| format!("'{raw}' must be non-zero"))
    }
}

impl fmt::Display for GrainDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

// ============================================================================
// SECTION: Violations
// ============================================================================

/// One failed grain rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrainViolation {
    /// Payload segment count is not exactly one.
    #[error("expected exactly one payload, found {0}")]
    PayloadCount(usize),
    /// The payload segment is empty.
    #[error("payload size must be positive")]
    EmptyPayload,
    /// Synchronization timestamp absent or empty.
    #[error("missing ptpSyncTimestamp")]
    MissingSyncTimestamp,
    /// Synchronization timestamp malformed.
    #[error("invalid ptpSyncTimestamp: {0}")]
    InvalidSyncTimestamp(String),
    /// Origin timestamp absent or empty.
    #[error("missing ptpOriginTimestamp")]
    MissingOriginTimestamp,
    /// Origin timestamp malformed.
    #[error("invalid ptpOriginTimestamp: {0}")]
    InvalidOriginTimestamp(String),
    /// Flow identifier absent or empty.
    #[error("missing flowId")]
    MissingFlowId,
    /// Source identifier absent or empty.
    #[error("missing sourceId")]
    MissingSourceId,
    /// Duration absent or empty.
    #[error("missing duration")]
    MissingDuration,
    /// Duration malformed or zero.
    #[error("invalid duration: {0}")]
    InvalidDuration(String),
}

/// Joins violations into one human-readable line.
#[must_use]
pub fn describe_violations(violations: &[GrainViolation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

// ============================================================================
// SECTION: Grain
// ============================================================================

/// Grain reconstructed from one output message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grain {
    /// Raw synchronization timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ptp_sync_timestamp: Option<String>,
    /// Raw origin timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ptp_origin_timestamp: Option<String>,
    /// Flow identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flow_id: Option<String>,
    /// Source identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_id: Option<String>,
    /// Raw duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<String>,
    /// Byte length of each payload segment.
    #[serde(default)]
    payload_sizes: Vec<u64>,
}

impl Grain {
    /// Builds a grain from typed parts.
    #[must_use]
    pub fn new(
        ptp_sync: PtpTimestamp,
        ptp_origin: PtpTimestamp,
        flow_id: impl Into<String>,
        source_id: impl Into<String>,
        duration: GrainDuration,
        payload_sizes: Vec<u64>,
    ) -> Self {
        Self {
            ptp_sync_timestamp: Some(ptp_sync.to_string()),
            ptp_origin_timestamp: Some(ptp_origin.to_string()),
            flow_id: Some(flow_id.into()),
            source_id: Some(source_id.into()),
            duration: Some(duration.to_string()),
            payload_sizes,
        }
    }

    /// Reconstructs a grain from the fields of a message object.
    ///
    /// # Errors
    ///
    /// Returns the serde error when a field has the wrong JSON type.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Serializes the grain into its wire object.
    ///
    /// # Errors
    ///
    /// Returns the serde error when serialization fails.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Returns the parsed synchronization timestamp when valid.
    #[must_use]
    pub fn ptp_sync(&self) -> Option<PtpTimestamp> {
        self.ptp_sync_timestamp.as_deref().and_then(|raw| raw.parse().ok())
    }

    /// Returns the parsed origin timestamp when valid.
    #[must_use]
    pub fn ptp_origin(&self) -> Option<PtpTimestamp> {
        self.ptp_origin_timestamp.as_deref().and_then(|raw| raw.parse().ok())
    }

    /// Returns the flow identifier.
    #[must_use]
    pub fn flow_id(&self) -> Option<&str> {
        self.flow_id.as_deref()
    }

    /// Returns the source identifier.
    #[must_use]
    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    /// Returns the parsed duration when valid.
    #[must_use]
    pub fn duration(&self) -> Option<GrainDuration> {
        self.duration.as_deref().and_then(|raw| raw.parse().ok())
    }

    /// Returns the payload segment sizes.
    #[must_use]
    pub fn payload_sizes(&self) -> &[u64] {
        &self.payload_sizes
    }

    /// Checks every grain rule and returns all violations.
    ///
    /// # Errors
    ///
    /// Returns the non-empty list of violated rules.
    pub fn check(&self) -> Result<(), Vec<GrainViolation>> {
        let mut violations = Vec::new();
        match self.payload_sizes.as_slice() {
            [size] if *size > 0 => {}
            [_] => violations.push(GrainViolation::EmptyPayload),
            other => violations.push(GrainViolation::PayloadCount(other.len())),
        }
        match present(self.ptp_sync_timestamp.as_deref()) {
            None => violations.push(GrainViolation::MissingSyncTimestamp),
            Some(raw) => {
                if let Err(reason) = raw.parse::<PtpTimestamp>() {
                    violations.push(GrainViolation::InvalidSyncTimestamp(reason));
                }
            }
        }
        match present(self.ptp_origin_timestamp.as_deref()) {
            None => violations.push(GrainViolation::MissingOriginTimestamp),
            Some(raw) => {
                if let Err(reason) = raw.parse::<PtpTimestamp>() {
                    violations.push(GrainViolation::InvalidOriginTimestamp(reason));
                }
            }
        }
        if present(self.flow_id.as_deref()).is_none() {
            violations.push(GrainViolation::MissingFlowId);
        }
        if present(self.source_id.as_deref()).is_none() {
            violations.push(GrainViolation::MissingSourceId);
        }
        match present(self.duration.as_deref()) {
            None => violations.push(GrainViolation::MissingDuration),
            Some(raw) => {
                if let Err(reason) = raw.parse::<GrainDuration>() {
                    violations.push(GrainViolation::InvalidDuration(reason));
                }
            }
        }
        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Returns true when every grain rule holds.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.check().is_ok()
    }
}

/// Treats empty and whitespace-only strings as absent.
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|raw| !raw.trim().is_empty())
}

#[cfg(test)]
#[path = "grain_tests.rs"]
mod tests;
