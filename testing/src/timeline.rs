//! Shared journal of side effects, for asserting cross-component ordering.
//!
//! Hand the same [`Timeline`] to the store, publisher and order log; each
//! appends an entry when its side effect takes hold. A test can then check
//! that a commit never precedes the publish it acknowledges.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use inventory_core::OrderId;
use std::sync::{Arc, Mutex};

/// One observed side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEntry {
    /// A decrement was committed for this order
    Reserve(OrderId),
    /// An outcome for this order was acknowledged
    Publish(OrderId),
    /// An offset was committed
    Commit {
        /// Partition of the committed message
        partition: i32,
        /// Offset of the committed message
        offset: i64,
    },
}

/// Append-only, cloneable journal.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    entries: Arc<Mutex<Vec<TimelineEntry>>>,
}

impl Timeline {
    /// Create an empty timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn record(&self, entry: TimelineEntry) {
        self.entries.lock().unwrap().push(entry);
    }

    /// Snapshot of all entries in order.
    #[must_use]
    pub fn entries(&self) -> Vec<TimelineEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Index of the first entry equal to `entry`.
    #[must_use]
    pub fn position_of(&self, entry: &TimelineEntry) -> Option<usize> {
        self.entries.lock().unwrap().iter().position(|e| e == entry)
    }
}
