// crates/grain-harness/src/error.rs
// ============================================================================
// Module: Harness Errors
// Description: Failure taxonomy for flow lifecycle runs.
// Purpose: Surface one terminal error per run with enough context to debug it.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every failure is terminal for the current run; nothing here is retried.
//! Admin API failures carry the method, path and status so a failing test
//! points at the exact request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::config::ConfigError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while driving a flow through its lifecycle.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Admin API answered with an unexpected status.
    #[error("admin {method} {path} returned {status}: {body}")]
    Admin {
        /// HTTP method of the failed request.
        method: &'static str,
        /// Request path.
        path: String,
        /// Returned status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
    /// Admin API request failed before a response arrived.
    #[error("admin {method} {path} transport failure: {detail}")]
    AdminTransport {
        /// HTTP method of the failed request.
        method: &'static str,
        /// Request path.
        path: String,
        /// Transport error detail.
        detail: String,
    },
    /// Admin API accepted the flow but returned no usable identifier.
    #[error("admin create response is missing a flow id: {0}")]
    MissingFlowId(String),
    /// WebSocket listener could not be bound.
    #[error("websocket bind {addr} failed: {detail}")]
    Bind {
        /// Requested bind address.
        addr: String,
        /// Bind error detail.
        detail: String,
    },
    /// The flow never connected to the WebSocket listener.
    #[error("no websocket connection within {0} ms")]
    ConnectTimeout(u64),
    /// WebSocket handshake or transport failure.
    #[error("websocket: {0}")]
    WebSocket(String),
    /// An inbound message was not valid JSON.
    #[error("message {index} is not valid json: {detail}")]
    MessageParse {
        /// One-based message index.
        index: u64,
        /// Parse error detail.
        detail: String,
    },
    /// The message handler rejected a message.
    #[error("handler rejected message {index}: {reason}")]
    Handler {
        /// One-based message index.
        index: u64,
        /// Handler-provided reason.
        reason: String,
    },
    /// Fixture could not be built or loaded.
    #[error("fixture: {0}")]
    Fixture(String),
    /// Configuration failure.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

/// Result alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;
