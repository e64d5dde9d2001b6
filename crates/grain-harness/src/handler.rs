// crates/grain-harness/src/handler.rs
// ============================================================================
// Module: Message Handlers
// Description: Per-message callbacks invoked by the lifecycle driver.
// Purpose: Let each test decide when output is complete and what is valid.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! The driver parses every inbound frame as JSON and passes it to a
//! [`MessageHandler`] together with the current [`RunState`]. The handler
//! answers with a [`MessageAction`] or rejects the message, which fails the
//! run. [`GrainCollector`] is the stock handler for grain-emitting flows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::config::HarnessConfig;
use crate::grain::Grain;
use crate::grain::describe_violations;
use crate::state::RunState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Message field carrying one grain.
pub const PUSH_FIELD: &str = "push";

// ============================================================================
// SECTION: Actions
// ============================================================================

/// Handler verdict for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageAction {
    /// The end condition has been reached.
    pub end: bool,
    /// The connection should be closed.
    pub close: bool,
}

impl MessageAction {
    /// Keep collecting.
    pub const CONTINUE: Self = Self {
        end: false,
        close: false,
    };

    /// End the run, leaving the connection open until teardown.
    #[must_use]
    pub const fn end() -> Self {
        Self {
            end: true,
            close: false,
        }
    }

    /// End the run and close the connection now.
    #[must_use]
    pub const fn end_and_close() -> Self {
        Self {
            end: true,
            close: true,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Per-message callback driven by the lifecycle driver.
pub trait MessageHandler: Send {
    /// Inspects one parsed message.
    ///
    /// # Errors
    ///
    /// Returns a reason when the message fails the test; the run is aborted.
    fn on_message(&mut self, message: &Value, state: &RunState) -> Result<MessageAction, String>;
}

impl<F> MessageHandler for F
where
    F: FnMut(&Value, &RunState) -> Result<MessageAction, String> + Send,
{
    fn on_message(&mut self, message: &Value, state: &RunState) -> Result<MessageAction, String> {
        self(message, state)
    }
}

/// Returns true when the message carries the end-of-stream field.
#[must_use]
pub fn is_end_marker(message: &Value, end_field: &str) -> bool {
    message.get(end_field).is_some()
}

// ============================================================================
// SECTION: Grain Collector
// ============================================================================

/// Validates `push` grains and ends on the end-of-stream field.
///
/// # Invariants
/// - Every stored grain passed [`Grain::check`].
/// - Messages that are neither grains nor end markers are counted, not stored.
#[derive(Debug, Clone)]
pub struct GrainCollector {
    /// End-of-stream field name.
    end_field: String,
    /// Grain count required at the end marker.
    expected: Option<u64>,
    /// Accepted grains.
    grains: Vec<Grain>,
    /// Messages that carried neither a grain nor the end field.
    ignored: u64,
}

impl GrainCollector {
    /// Creates a collector ending on `end_field`.
    #[must_use]
    pub fn new(end_field: impl Into<String>) -> Self {
        Self {
            end_field: end_field.into(),
            expected: None,
            grains: Vec::new(),
            ignored: 0,
        }
    }

    /// Creates a collector using the configured end field.
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.end_field.clone())
    }

    /// Requires exactly `count` grains before the end marker.
    #[must_use]
    pub const fn expect_grains(mut self, count: u64) -> Self {
        self.expected = Some(count);
        self
    }

    /// Returns the accepted grains.
    #[must_use]
    pub fn grains(&self) -> &[Grain] {
        &self.grains
    }

    /// Returns the number of ignored messages.
    #[must_use]
    pub const fn ignored(&self) -> u64 {
        self.ignored
    }

    /// Checks the expected grain count, if one was set.
    ///
    /// # Errors
    ///
    /// Returns a reason when the collected count differs from the expectation.
    pub fn verify_count(&self) -> Result<(), String> {
        let collected = self.grains.len() as u64;
        match self.expected {
            Some(expected) if expected != collected => {
                Err(format!("expected {expected} grains, received {collected}"))
            }
            _ => Ok(()),
        }
    }
}

impl MessageHandler for GrainCollector {
    fn on_message(&mut self, message: &Value, state: &RunState) -> Result<MessageAction, String> {
        if !message.is_object() {
            return Err("message is not a json object".to_string());
        }
        let end = is_end_marker(message, &self.end_field);
        match message.get(PUSH_FIELD) {
            Some(push) => {
                let grain =
                    Grain::from_value(push).map_err(|err| format!("malformed grain: {err}"))?;
                grain.check().map_err(|violations| describe_violations(&violations))?;
                self.grains.push(grain);
            }
            None if !end => {
                self.ignored = self.ignored.saturating_add(1);
                return Ok(MessageAction::CONTINUE);
            }
            None => {}
        }
        // A grain riding on the end marker is counted before the check.
        if end {
            self.verify_count()?;
            tracing::debug!(received = state.received, grains = self.grains.len(), "end marker");
            return Ok(MessageAction::end_and_close());
        }
        Ok(MessageAction::CONTINUE)
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
