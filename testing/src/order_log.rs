//! Scripted order log.
//!
//! Plays back a fixed queue of messages and read errors, and records every
//! commit. Once drained it reports [`OrderLogError::Closed`] so a consumer
//! task finishes on its own, or it stays open (pending forever) when built
//! with [`ScriptedOrderLog::keep_open`] so shutdown can be exercised.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use crate::timeline::{Timeline, TimelineEntry};
use inventory_core::{OrderLog, OrderLogError, OrderMessage};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum Step {
    Deliver(OrderMessage),
    Fail(String),
}

/// In-memory [`OrderLog`] driven by a script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOrderLog {
    script: Arc<Mutex<VecDeque<Step>>>,
    committed: Arc<Mutex<Vec<OrderMessage>>>,
    reads: Arc<AtomicUsize>,
    keep_open: bool,
    timeline: Option<Timeline>,
}

impl ScriptedOrderLog {
    /// Create a log that closes once the script is drained.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log that plays `messages` in order.
    #[must_use]
    pub fn with_messages(messages: impl IntoIterator<Item = OrderMessage>) -> Self {
        let log = Self::new();
        for message in messages {
            log.push_message(message);
        }
        log
    }

    /// Block on an empty script instead of closing.
    #[must_use]
    pub fn keep_open(mut self) -> Self {
        self.keep_open = true;
        self
    }

    /// Record commits into `timeline`.
    #[must_use]
    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = Some(timeline);
        self
    }

    /// Append a message to the script.
    pub fn push_message(&self, message: OrderMessage) {
        self.script.lock().unwrap().push_back(Step::Deliver(message));
    }

    /// Append a read failure to the script.
    pub fn push_read_error(&self, reason: impl Into<String>) {
        self.script.lock().unwrap().push_back(Step::Fail(reason.into()));
    }

    /// Every committed message, in commit order.
    #[must_use]
    pub fn committed(&self) -> Vec<OrderMessage> {
        self.committed.lock().unwrap().clone()
    }

    /// Offsets of every committed message, in commit order.
    #[must_use]
    pub fn committed_offsets(&self) -> Vec<i64> {
        self.committed().iter().map(|m| m.offset).collect()
    }

    /// Number of `next_message` calls that returned a message or an error.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Steps not yet played.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl OrderLog for ScriptedOrderLog {
    fn next_message(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<OrderMessage, OrderLogError>> + Send + '_>> {
        Box::pin(async move {
            let step = self.script.lock().unwrap().pop_front();
            match step {
                Some(Step::Deliver(message)) => {
                    self.reads.fetch_add(1, Ordering::SeqCst);
                    Ok(message)
                }
                Some(Step::Fail(reason)) => {
                    self.reads.fetch_add(1, Ordering::SeqCst);
                    Err(OrderLogError::ReadFailed(reason))
                }
                None if self.keep_open => std::future::pending().await,
                None => Err(OrderLogError::Closed),
            }
        })
    }

    fn commit(
        &self,
        message: &OrderMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), OrderLogError>> + Send + '_>> {
        let message = message.clone();
        Box::pin(async move {
            if let Some(timeline) = &self.timeline {
                timeline.record(TimelineEntry::Commit {
                    partition: message.partition,
                    offset: message.offset,
                });
            }
            self.committed.lock().unwrap().push(message);
            Ok(())
        })
    }
}
