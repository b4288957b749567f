//! Recording outcome publisher.
//!
//! Captures every acknowledged outcome together with the topic it was
//! routed to. Failures can be injected for a number of attempts or
//! indefinitely.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use crate::timeline::{Timeline, TimelineEntry};
use inventory_core::{InventoryOutcomeEvent, OutcomePublisher, OutcomeTopics, PublishError};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory [`OutcomePublisher`].
#[derive(Debug, Clone, Default)]
pub struct RecordingOutcomePublisher {
    topics: OutcomeTopics,
    published: Arc<Mutex<Vec<(String, InventoryOutcomeEvent)>>>,
    attempts: Arc<AtomicUsize>,
    failures_remaining: Arc<AtomicUsize>,
    always_fail: Arc<AtomicBool>,
    timeline: Option<Timeline>,
}

impl RecordingOutcomePublisher {
    /// Create a publisher routing to the default topics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route to custom topics.
    #[must_use]
    pub fn with_topics(mut self, topics: OutcomeTopics) -> Self {
        self.topics = topics;
        self
    }

    /// Record acknowledgements into `timeline`.
    #[must_use]
    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = Some(timeline);
        self
    }

    /// Fail the next `n` publish attempts.
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Fail every attempt until switched off.
    pub fn set_failing(&self, failing: bool) {
        self.always_fail.store(failing, Ordering::SeqCst);
    }

    /// Every acknowledged `(topic, outcome)` pair, in order.
    #[must_use]
    pub fn published(&self) -> Vec<(String, InventoryOutcomeEvent)> {
        self.published.lock().unwrap().clone()
    }

    /// Every acknowledged outcome, in order.
    #[must_use]
    pub fn outcomes(&self) -> Vec<InventoryOutcomeEvent> {
        self.published().into_iter().map(|(_, o)| o).collect()
    }

    /// Outcomes acknowledged on `topic`.
    #[must_use]
    pub fn on_topic(&self, topic: &str) -> Vec<InventoryOutcomeEvent> {
        self.published()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, o)| o)
            .collect()
    }

    /// Publish attempts, successful or not.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        self.always_fail.load(Ordering::SeqCst)
            || self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
    }
}

impl OutcomePublisher for RecordingOutcomePublisher {
    fn publish(
        &self,
        outcome: &InventoryOutcomeEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
        let outcome = outcome.clone();
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let topic = self.topics.topic_for(outcome.status).to_string();

            if self.should_fail() {
                return Err(PublishError::PublishFailed {
                    topic,
                    reason: "injected broker failure".to_string(),
                });
            }

            if let Some(timeline) = &self.timeline {
                timeline.record(TimelineEntry::Publish(outcome.order_id));
            }
            self.published.lock().unwrap().push((topic, outcome));
            Ok(())
        })
    }
}
