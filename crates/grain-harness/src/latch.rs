// crates/grain-harness/src/latch.rs
// ============================================================================
// Module: Completion Latch
// Description: Single-assignment completion cell for flow runs.
// Purpose: Let the end-marker, stall and abort paths race without double teardown.
// Dependencies: serde, tokio
// ============================================================================

//! ## Overview
//! The first caller of [`CompletionLatch::complete`] wins; later calls return
//! `false` and leave the stored [`Completion`] untouched. Waiters are woken
//! once the value is set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::OnceLock;

use serde::Serialize;
use tokio::sync::Notify;

// ============================================================================
// SECTION: Completion
// ============================================================================

/// Why a run finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The handler reported an end marker.
    EndMarker,
    /// The message count did not change across one stall interval.
    Stalled,
    /// The run failed and is being torn down.
    Aborted,
}

impl CompletionReason {
    /// Returns a stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EndMarker => "end_marker",
            Self::Stalled => "stalled",
            Self::Aborted => "aborted",
        }
    }
}

/// Value stored in the latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Completion {
    /// Completion reason.
    pub reason: CompletionReason,
    /// Messages received when the latch was set.
    pub received: u64,
}

// ============================================================================
// SECTION: Latch
// ============================================================================

/// Settable-once completion cell with async waiting.
#[derive(Debug, Default)]
pub struct CompletionLatch {
    /// Winning completion.
    slot: OnceLock<Completion>,
    /// Wakes waiters after the slot is set.
    notify: Notify,
}

impl CompletionLatch {
    /// Creates an unset latch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to set the latch. Returns true only for the winning call.
    pub fn complete(&self, completion: Completion) -> bool {
        let won = self.slot.set(completion).is_ok();
        if won {
            self.notify.notify_waiters();
        }
        won
    }

    /// Returns the stored completion, if any.
    #[must_use]
    pub fn get(&self) -> Option<Completion> {
        self.slot.get().copied()
    }

    /// Returns true once the latch is set.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Waits until the latch is set and returns the stored completion.
    pub async fn wait(&self) -> Completion {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            let _ = notified.as_mut().enable();
            if let Some(completion) = self.slot.get() {
                return *completion;
            }
            notified.await;
        }
    }
}
