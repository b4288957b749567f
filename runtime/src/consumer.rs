//! Order consumer loop.
//!
//! A single long-lived task that drains the order log one message at a time:
//!
//! ```text
//! loop {
//!     Idle:        wait for the next message (or shutdown)
//!     Processing:  decode, run the reservation engine
//!     Publishing:  publish the outcome, retrying until acknowledged
//!                  commit the offset
//! }
//! ```
//!
//! # Delivery guarantees
//!
//! - Offsets are committed only after the outcome is acknowledged, so a crash
//!   anywhere in a cycle leads to redelivery. The store's order ledger turns
//!   the redelivery into a replay of the recorded decision.
//! - Malformed payloads are logged, committed and skipped. They produce no
//!   outcome.
//! - Read errors never stop the loop. They back off exponentially and are
//!   exposed through [`ConsumerStats`].
//! - Shutdown is only observed while idle or while waiting to retry a failed
//!   publish. A publish that never succeeded leaves its offset uncommitted.
//!
//! # Example
//!
//! ```rust,ignore
//! let consumer = OrderConsumer::builder()
//!     .name("inventory")
//!     .log(Arc::new(order_log))
//!     .engine(ReservationEngine::new(store))
//!     .publisher(Arc::new(publisher))
//!     .shutdown(shutdown_rx)
//!     .build()?;
//!
//! let stats = consumer.stats();
//! let handle = consumer.spawn();
//! ```

use crate::metrics::{ConsumerMetrics, PublishMetrics};
use crate::reservation::ReservationEngine;
use crate::retry::RetryPolicy;
use inventory_core::{
    InventoryOutcomeEvent, OrderCreatedEvent, OrderLog, OrderLogError, OrderMessage,
    OutcomePublisher, OutcomeStatus, PublishError,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Default deadline for one publish round-trip.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the consumer is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsumerPhase {
    /// Waiting for the next message
    #[default]
    Idle,
    /// Decoding and deciding
    Processing,
    /// Waiting for the outcome to be acknowledged
    Publishing,
}

impl ConsumerPhase {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Processing => 1,
            Self::Publishing => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Processing,
            2 => Self::Publishing,
            _ => Self::Idle,
        }
    }
}

/// Live counters for one consumer, shared with whoever holds the handle.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    received: AtomicU64,
    reserved: AtomicU64,
    failed: AtomicU64,
    malformed: AtomicU64,
    read_failures: AtomicU64,
    consecutive_read_failures: AtomicU64,
    publish_failures: AtomicU64,
    phase: AtomicU8,
}

/// Point-in-time copy of [`ConsumerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsumerSnapshot {
    /// Messages fetched
    pub received: u64,
    /// RESERVED outcomes decided
    pub reserved: u64,
    /// FAILED outcomes decided
    pub failed: u64,
    /// Messages skipped as undecodable
    pub malformed: u64,
    /// Read errors since start
    pub read_failures: u64,
    /// Read errors since the last successful read
    pub consecutive_read_failures: u64,
    /// Failed publish attempts since start
    pub publish_failures: u64,
    /// Current phase
    pub phase: ConsumerPhase,
}

impl ConsumerStats {
    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ConsumerPhase {
        ConsumerPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Read errors since the last successful read.
    #[must_use]
    pub fn consecutive_read_failures(&self) -> u64 {
        self.consecutive_read_failures.load(Ordering::Relaxed)
    }

    /// Copy all counters.
    #[must_use]
    pub fn snapshot(&self) -> ConsumerSnapshot {
        ConsumerSnapshot {
            received: self.received.load(Ordering::Relaxed),
            reserved: self.reserved.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            consecutive_read_failures: self.consecutive_read_failures(),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            phase: self.phase(),
        }
    }

    fn set_phase(&self, phase: ConsumerPhase) {
        self.phase.store(phase.as_u8(), Ordering::Release);
    }

    fn record_decision(&self, status: OutcomeStatus) {
        let counter = match status {
            OutcomeStatus::Reserved => &self.reserved,
            OutcomeStatus::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_read_failure(&self) -> u64 {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_read_failures.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Errors from [`OrderConsumerBuilder::build`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsumerBuildError {
    /// A required collaborator was not supplied
    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Consumes order events and publishes one outcome per delivery.
pub struct OrderConsumer {
    name: String,
    log: Arc<dyn OrderLog>,
    engine: ReservationEngine,
    publisher: Arc<dyn OutcomePublisher>,
    shutdown: broadcast::Receiver<()>,
    read_retry: RetryPolicy,
    publish_retry: RetryPolicy,
    publish_timeout: Duration,
    stats: Arc<ConsumerStats>,
    stopping: bool,
}

impl OrderConsumer {
    /// Create a builder for configuring a consumer.
    #[must_use]
    pub fn builder() -> OrderConsumerBuilder {
        OrderConsumerBuilder::default()
    }

    /// Shared handle to this consumer's counters.
    #[must_use]
    pub fn stats(&self) -> Arc<ConsumerStats> {
        Arc::clone(&self.stats)
    }

    /// Spawn the consumer as a background task.
    ///
    /// The task runs until shutdown is signalled or the log closes.
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run the consumer on the current task.
    pub async fn run(mut self) {
        info!(consumer = %self.name, "Order consumer started");

        loop {
            self.stats.set_phase(ConsumerPhase::Idle);

            let next = tokio::select! {
                biased;
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Order consumer received shutdown signal");
                    break;
                }
                next = self.log.next_message() => next,
            };

            match next {
                Ok(message) => {
                    self.reset_read_failures();
                    self.handle_message(message).await;
                    if self.stopping {
                        break;
                    }
                }
                Err(OrderLogError::Closed) => {
                    info!(consumer = %self.name, "Order log closed");
                    break;
                }
                Err(err) => {
                    if !self.back_off_after_read_error(&err).await {
                        break;
                    }
                }
            }
        }

        self.stats.set_phase(ConsumerPhase::Idle);
        info!(consumer = %self.name, "Order consumer stopped");
    }

    async fn handle_message(&mut self, message: OrderMessage) {
        self.stats.set_phase(ConsumerPhase::Processing);
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        ConsumerMetrics::record_received();

        let Some(event) = self.decode(&message) else {
            self.stats.malformed.fetch_add(1, Ordering::Relaxed);
            ConsumerMetrics::record_malformed();
            self.commit(&message).await;
            return;
        };

        debug!(
            consumer = %self.name,
            order_id = %event.order_id,
            product_id = %event.product_id,
            partition = message.partition,
            offset = message.offset,
            "Processing order"
        );

        let outcome = self.engine.reserve(&event).await;
        self.stats.record_decision(outcome.status);

        self.stats.set_phase(ConsumerPhase::Publishing);
        if self.publish_outcome(&outcome).await {
            self.commit(&message).await;
        } else {
            warn!(
                consumer = %self.name,
                order_id = %outcome.order_id,
                position = %message.position(),
                "Stopping before outcome was published, offset left uncommitted"
            );
        }
    }

    fn decode(&self, message: &OrderMessage) -> Option<OrderCreatedEvent> {
        let Some(payload) = message.payload.as_deref() else {
            warn!(
                consumer = %self.name,
                position = %message.position(),
                "Skipping order message without payload"
            );
            return None;
        };

        match OrderCreatedEvent::from_json(payload) {
            Ok(event) => Some(event),
            Err(err) => {
                warn!(
                    consumer = %self.name,
                    position = %message.position(),
                    error = %err,
                    "Skipping malformed order message"
                );
                None
            }
        }
    }

    /// Publish until acknowledged. Returns `false` only if shutdown arrived
    /// while waiting to retry.
    async fn publish_outcome(&mut self, outcome: &InventoryOutcomeEvent) -> bool {
        let mut attempt = 0usize;

        loop {
            let started = Instant::now();
            match self.publish_once(outcome).await {
                Ok(()) => {
                    PublishMetrics::record_published(outcome.status, started.elapsed());
                    if attempt > 0 {
                        info!(
                            consumer = %self.name,
                            order_id = %outcome.order_id,
                            attempt,
                            "Outcome published after retry"
                        );
                    }
                    return true;
                }
                Err(err) => {
                    self.stats.publish_failures.fetch_add(1, Ordering::Relaxed);
                    PublishMetrics::record_error();

                    let delay = self.publish_retry.delay_for_attempt(attempt);
                    if attempt == self.publish_retry.max_retries {
                        error!(
                            consumer = %self.name,
                            order_id = %outcome.order_id,
                            status = %outcome.status,
                            attempt,
                            error = %err,
                            "Outcome still unpublished after retry budget, consumer is blocked"
                        );
                        PublishMetrics::record_escalation();
                    } else {
                        warn!(
                            consumer = %self.name,
                            order_id = %outcome.order_id,
                            attempt,
                            delay_ms = delay.as_millis(),
                            error = %err,
                            "Failed to publish outcome, retrying"
                        );
                    }
                    attempt += 1;

                    tokio::select! {
                        biased;
                        _ = self.shutdown.recv() => {
                            self.stopping = true;
                            return false;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn publish_once(&self, outcome: &InventoryOutcomeEvent) -> Result<(), PublishError> {
        tokio::time::timeout(self.publish_timeout, self.publisher.publish(outcome))
            .await
            .map_err(|_| PublishError::Timeout(self.publish_timeout))?
    }

    async fn commit(&self, message: &OrderMessage) {
        match self.log.commit(message).await {
            Ok(()) => debug!(
                consumer = %self.name,
                partition = message.partition,
                offset = message.offset,
                "Offset committed"
            ),
            Err(err) => {
                warn!(
                    consumer = %self.name,
                    position = %message.position(),
                    error = %err,
                    "Offset commit failed, message may be redelivered"
                );
                ConsumerMetrics::record_commit_error();
            }
        }
    }

    fn reset_read_failures(&self) {
        let previous = self.stats.consecutive_read_failures.swap(0, Ordering::Relaxed);
        if previous > 0 {
            info!(
                consumer = %self.name,
                failures = previous,
                "Order log reads recovered"
            );
            ConsumerMetrics::record_read_recovered();
        }
    }

    /// Wait out the backoff for a read error. Returns `false` on shutdown.
    async fn back_off_after_read_error(&mut self, err: &OrderLogError) -> bool {
        let consecutive = self.stats.record_read_failure();
        ConsumerMetrics::record_read_error(consecutive);

        let attempt = usize::try_from(consecutive.saturating_sub(1)).unwrap_or(usize::MAX);
        let delay = self.read_retry.delay_for_attempt(attempt);

        if attempt >= self.read_retry.max_retries {
            error!(
                consumer = %self.name,
                consecutive,
                delay_ms = delay.as_millis(),
                error = %err,
                "Order log keeps failing, still retrying"
            );
        } else {
            warn!(
                consumer = %self.name,
                consecutive,
                delay_ms = delay.as_millis(),
                error = %err,
                "Failed to read from order log, retrying"
            );
        }

        tokio::select! {
            biased;
            _ = self.shutdown.recv() => {
                info!(consumer = %self.name, "Order consumer received shutdown signal during backoff");
                false
            }
            () = tokio::time::sleep(delay) => true,
        }
    }
}

/// Builder for configuring an [`OrderConsumer`].
#[derive(Default)]
pub struct OrderConsumerBuilder {
    name: Option<String>,
    log: Option<Arc<dyn OrderLog>>,
    engine: Option<ReservationEngine>,
    publisher: Option<Arc<dyn OutcomePublisher>>,
    shutdown: Option<broadcast::Receiver<()>>,
    read_retry: Option<RetryPolicy>,
    publish_retry: Option<RetryPolicy>,
    publish_timeout: Option<Duration>,
}

impl OrderConsumerBuilder {
    /// Set consumer name (default: `inventory`).
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the order log to consume.
    #[must_use]
    pub fn log(mut self, log: Arc<dyn OrderLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Set the reservation engine.
    #[must_use]
    pub fn engine(mut self, engine: ReservationEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Set the outcome publisher.
    #[must_use]
    pub fn publisher(mut self, publisher: Arc<dyn OutcomePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Set shutdown signal receiver.
    #[must_use]
    pub fn shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Backoff after read errors (default: 500ms doubling to 30s, escalates after 10).
    #[must_use]
    pub fn read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = Some(policy);
        self
    }

    /// Backoff between publish attempts (default: 200ms doubling to 10s, escalates after 5).
    #[must_use]
    pub fn publish_retry(mut self, policy: RetryPolicy) -> Self {
        self.publish_retry = Some(policy);
        self
    }

    /// Deadline for one publish attempt (default: 5s).
    #[must_use]
    pub fn publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = Some(timeout);
        self
    }

    /// Build the [`OrderConsumer`].
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerBuildError::MissingField`] if the log, engine,
    /// publisher or shutdown receiver was not set.
    pub fn build(self) -> Result<OrderConsumer, ConsumerBuildError> {
        Ok(OrderConsumer {
            name: self.name.unwrap_or_else(|| "inventory".to_string()),
            log: self.log.ok_or(ConsumerBuildError::MissingField("log"))?,
            engine: self
                .engine
                .ok_or(ConsumerBuildError::MissingField("engine"))?,
            publisher: self
                .publisher
                .ok_or(ConsumerBuildError::MissingField("publisher"))?,
            shutdown: self
                .shutdown
                .ok_or(ConsumerBuildError::MissingField("shutdown"))?,
            read_retry: self.read_retry.unwrap_or_else(|| {
                RetryPolicy::builder()
                    .max_retries(10)
                    .initial_delay(Duration::from_millis(500))
                    .max_delay(Duration::from_secs(30))
                    .jitter(true)
                    .build()
            }),
            publish_retry: self.publish_retry.unwrap_or_else(|| {
                RetryPolicy::builder()
                    .max_retries(5)
                    .initial_delay(Duration::from_millis(200))
                    .max_delay(Duration::from_secs(10))
                    .jitter(true)
                    .build()
            }),
            publish_timeout: self.publish_timeout.unwrap_or(DEFAULT_PUBLISH_TIMEOUT),
            stats: Arc::new(ConsumerStats::default()),
            stopping: false,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use inventory_core::{FailureReason, OrderId};
    use inventory_testing::{
        InMemoryStockStore, RecordingOutcomePublisher, ScriptedOrderLog, Timeline, TimelineEntry,
        order_event, order_message, raw_message,
    };

    fn fast_retry(max_retries: usize) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(max_retries)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5))
            .build()
    }

    fn consumer(
        log: &ScriptedOrderLog,
        store: &InMemoryStockStore,
        publisher: &RecordingOutcomePublisher,
        shutdown: broadcast::Receiver<()>,
    ) -> OrderConsumer {
        OrderConsumer::builder()
            .name("test")
            .log(Arc::new(log.clone()))
            .engine(ReservationEngine::new(Arc::new(store.clone())).with_retry_policy(fast_retry(2)))
            .publisher(Arc::new(publisher.clone()))
            .shutdown(shutdown)
            .read_retry(fast_retry(3))
            .publish_retry(fast_retry(2))
            .publish_timeout(Duration::from_millis(200))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn competing_orders_for_last_unit() {
        let store = InMemoryStockStore::new().with_stock(1, 1);
        let log = ScriptedOrderLog::with_messages([
            order_message(0, &order_event(1, 1, 1)),
            order_message(1, &order_event(2, 1, 1)),
        ]);
        let publisher = RecordingOutcomePublisher::new();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        consumer(&log, &store, &publisher, shutdown_rx).run().await;

        assert_eq!(
            publisher.on_topic("inventory-reserved"),
            vec![InventoryOutcomeEvent::reserved(OrderId::new(1))]
        );
        assert_eq!(
            publisher.on_topic("inventory-failed"),
            vec![InventoryOutcomeEvent::failed(
                OrderId::new(2),
                FailureReason::NotEnoughStock
            )]
        );
        assert_eq!(store.quantity_of(1), Some(0));
        assert_eq!(log.committed_offsets(), vec![0, 1]);
    }

    #[tokio::test]
    async fn malformed_payload_is_committed_without_outcome() {
        let store = InMemoryStockStore::new().with_stock(42, 10);
        let log = ScriptedOrderLog::with_messages([
            raw_message(
                0,
                br#"{"orderId":1,"userId":1,"productId":42,"quantity":"abc","total":1.0}"#,
            ),
            order_message(1, &order_event(2, 42, 1)),
        ]);
        let publisher = RecordingOutcomePublisher::new();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let consumer = consumer(&log, &store, &publisher, shutdown_rx);
        let stats = consumer.stats();

        consumer.run().await;

        assert_eq!(
            publisher.outcomes(),
            vec![InventoryOutcomeEvent::reserved(OrderId::new(2))]
        );
        assert_eq!(log.committed_offsets(), vec![0, 1]);
        assert_eq!(store.quantity_of(42), Some(9));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 2);
        assert_eq!(snapshot.malformed, 1);
        assert_eq!(snapshot.reserved, 1);
    }

    #[tokio::test]
    async fn invalid_event_is_published_as_failed() {
        let store = InMemoryStockStore::new().with_stock(42, 10);
        let log = ScriptedOrderLog::with_messages([order_message(0, &order_event(3, 42, -4))]);
        let publisher = RecordingOutcomePublisher::new();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        consumer(&log, &store, &publisher, shutdown_rx).run().await;

        assert_eq!(
            publisher.on_topic("inventory-failed"),
            vec![InventoryOutcomeEvent::failed(
                OrderId::new(3),
                FailureReason::InvalidEvent
            )]
        );
        assert_eq!(log.committed_offsets(), vec![0]);
        assert_eq!(store.quantity_of(42), Some(10));
    }

    #[tokio::test]
    async fn each_cycle_completes_before_the_next_starts() {
        let timeline = Timeline::new();
        let store = InMemoryStockStore::new()
            .with_stock(7, 10)
            .with_timeline(timeline.clone());
        let log = ScriptedOrderLog::with_messages([
            order_message(0, &order_event(1, 7, 2)),
            order_message(1, &order_event(2, 7, 3)),
        ])
        .with_timeline(timeline.clone());
        let publisher = RecordingOutcomePublisher::new().with_timeline(timeline.clone());
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        consumer(&log, &store, &publisher, shutdown_rx).run().await;

        assert_eq!(
            timeline.entries(),
            vec![
                TimelineEntry::Reserve(OrderId::new(1)),
                TimelineEntry::Publish(OrderId::new(1)),
                TimelineEntry::Commit { partition: 0, offset: 0 },
                TimelineEntry::Reserve(OrderId::new(2)),
                TimelineEntry::Publish(OrderId::new(2)),
                TimelineEntry::Commit { partition: 0, offset: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn publish_failures_hold_the_commit_until_acknowledged() {
        let timeline = Timeline::new();
        let store = InMemoryStockStore::new().with_stock(42, 10);
        let log = ScriptedOrderLog::with_messages([order_message(0, &order_event(1, 42, 1))])
            .with_timeline(timeline.clone());
        let publisher = RecordingOutcomePublisher::new().with_timeline(timeline.clone());
        publisher.fail_next(4);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let consumer = consumer(&log, &store, &publisher, shutdown_rx);
        let stats = consumer.stats();

        consumer.run().await;

        assert_eq!(publisher.attempts(), 5);
        assert_eq!(publisher.outcomes().len(), 1);
        assert_eq!(stats.snapshot().publish_failures, 4);
        assert_eq!(
            timeline.entries(),
            vec![
                TimelineEntry::Publish(OrderId::new(1)),
                TimelineEntry::Commit { partition: 0, offset: 0 },
            ]
        );
        assert_eq!(store.quantity_of(42), Some(9));
    }

    #[tokio::test]
    async fn redelivery_after_unpublished_shutdown_replays_decision() {
        let store = InMemoryStockStore::new().with_stock(42, 10);
        let message = order_message(0, &order_event(9, 42, 4));

        // First delivery: decided, never published, shut down mid-retry.
        let log = ScriptedOrderLog::with_messages([message.clone()]).keep_open();
        let broken = RecordingOutcomePublisher::new();
        broken.set_failing(true);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = consumer(&log, &store, &broken, shutdown_rx).spawn();

        while broken.attempts() < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("consumer should stop")
            .unwrap();

        assert!(log.committed().is_empty());
        assert!(broken.outcomes().is_empty());
        assert_eq!(store.quantity_of(42), Some(6));

        // Redelivery: the ledger answers, stock is untouched.
        let log = ScriptedOrderLog::with_messages([message]);
        let publisher = RecordingOutcomePublisher::new();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        consumer(&log, &store, &publisher, shutdown_rx).run().await;

        assert_eq!(
            publisher.outcomes(),
            vec![InventoryOutcomeEvent::reserved(OrderId::new(9))]
        );
        assert_eq!(store.quantity_of(42), Some(6));
        assert_eq!(log.committed_offsets(), vec![0]);
    }

    #[tokio::test]
    async fn read_errors_back_off_and_recover() {
        let store = InMemoryStockStore::new().with_stock(42, 10);
        let log = ScriptedOrderLog::new();
        log.push_read_error("broker down");
        log.push_read_error("broker down");
        log.push_message(order_message(0, &order_event(1, 42, 1)));
        let publisher = RecordingOutcomePublisher::new();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let consumer = consumer(&log, &store, &publisher, shutdown_rx);
        let stats = consumer.stats();

        consumer.run().await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.read_failures, 2);
        assert_eq!(snapshot.consecutive_read_failures, 0);
        assert_eq!(snapshot.received, 1);
        assert_eq!(publisher.outcomes().len(), 1);
    }

    #[tokio::test]
    async fn shutdown_while_idle_stops_the_loop() {
        let store = InMemoryStockStore::new();
        let log = ScriptedOrderLog::new().keep_open();
        let publisher = RecordingOutcomePublisher::new();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let consumer = consumer(&log, &store, &publisher, shutdown_rx);
        let stats = consumer.stats();
        let handle = consumer.spawn();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(stats.phase(), ConsumerPhase::Idle);
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("consumer should stop")
            .unwrap();
    }

    #[test]
    fn builder_requires_collaborators() {
        let (_tx, rx) = broadcast::channel(1);
        let result = OrderConsumer::builder().shutdown(rx).build();
        assert!(matches!(result, Err(ConsumerBuildError::MissingField("log"))));
    }

    #[test]
    fn phase_round_trips_through_its_tag() {
        for phase in [
            ConsumerPhase::Idle,
            ConsumerPhase::Processing,
            ConsumerPhase::Publishing,
        ] {
            assert_eq!(ConsumerPhase::from_u8(phase.as_u8()), phase);
        }
    }
}
