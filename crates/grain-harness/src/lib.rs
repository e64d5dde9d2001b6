// crates/grain-harness/src/lib.rs
// ============================================================================
// Module: Grain Harness Library
// Description: Flow lifecycle harness for grain-emitting dataflow runtimes.
// Purpose: Create a flow, collect its WebSocket output, validate it, delete it.
// Dependencies: reqwest, serde_json, tokio, tokio-tungstenite, tracing
// ============================================================================

//! ## Overview
//! Grain Harness drives one flow per run through a runtime's admin API: the
//! fixture is submitted, its output is collected over a WebSocket the
//! harness listens on, each message is judged by a [`MessageHandler`], and
//! the flow is deleted once the run completes.
//! Invariants:
//! - Every run completes exactly once via a [`CompletionLatch`].
//! - Flows created by a run are deleted on every exit path unless
//!   `keepFlow` is set.
//! - A valid [`Grain`] has one positive-size payload and all identity and
//!   timing fields present.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod admin;
pub mod config;
pub mod driver;
pub mod error;
pub mod fixture;
pub mod grain;
pub mod handler;
pub mod latch;
pub mod staging;
pub mod state;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use admin::AdminClient;
pub use admin::FlowId;
pub use config::ConfigError;
pub use config::HarnessConfig;
pub use config::HarnessEnv;
pub use driver::FlowContext;
pub use driver::FlowDriver;
pub use driver::RunReport;
pub use error::HarnessError;
pub use error::HarnessResult;
pub use fixture::FlowFixture;
pub use fixture::FlowNode;
pub use grain::Grain;
pub use grain::GrainDuration;
pub use grain::GrainViolation;
pub use grain::PtpTimestamp;
pub use handler::GrainCollector;
pub use handler::MessageAction;
pub use handler::MessageHandler;
pub use latch::Completion;
pub use latch::CompletionLatch;
pub use latch::CompletionReason;
pub use staging::MAX_DOWNLOAD_BYTES;
pub use staging::StagingError;
pub use staging::download;
pub use staging::download_with_limit;
pub use staging::remove_tree;
pub use state::RunCounters;
pub use state::RunState;
