// crates/grain-harness/src/state.rs
// ============================================================================
// Module: Run State
// Description: Shared counters and flags for one flow run.
// Purpose: Feed stall detection and report the termination gate.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`RunCounters`] is shared between the driver task and the stall watchdog.
//! Handlers and reports see an immutable [`RunState`] snapshot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Serialize;

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Point-in-time view of a run's termination gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    /// Messages received so far.
    pub received: u64,
    /// Count seen by the most recent stall check.
    pub last_observed: u64,
    /// An end marker has been received.
    pub end_received: bool,
    /// Teardown has finished.
    pub closedown_completed: bool,
}

// ============================================================================
// SECTION: Shared Counters
// ============================================================================

/// Lock-free counters shared by the driver and the stall watchdog.
#[derive(Debug, Default)]
pub struct RunCounters {
    /// Messages received.
    received: AtomicU64,
    /// Count at the last stall check.
    last_observed: AtomicU64,
    /// End marker seen.
    end_received: AtomicBool,
    /// Teardown done.
    closedown_completed: AtomicBool,
}

impl RunCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one inbound message and returns the new count.
    pub fn record_message(&self) -> u64 {
        self.received.fetch_add(1, Ordering::SeqCst).saturating_add(1)
    }

    /// Returns the number of messages received.
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }

    /// Compares the count with the previous check and stores the current one.
    ///
    /// Returns true when no message arrived since the previous check.
    pub fn observe_stall(&self) -> bool {
        let current = self.received.load(Ordering::SeqCst);
        let previous = self.last_observed.swap(current, Ordering::SeqCst);
        current == previous
    }

    /// Marks the end marker as received.
    pub fn mark_end_received(&self) {
        self.end_received.store(true, Ordering::SeqCst);
    }

    /// Marks teardown as finished.
    pub fn mark_closedown_completed(&self) {
        self.closedown_completed.store(true, Ordering::SeqCst);
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> RunState {
        RunState {
            received: self.received.load(Ordering::SeqCst),
            last_observed: self.last_observed.load(Ordering::SeqCst),
            end_received: self.end_received.load(Ordering::SeqCst),
            closedown_completed: self.closedown_completed.load(Ordering::SeqCst),
        }
    }
}
