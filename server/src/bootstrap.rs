//! Startup: connect every dependency, then wire the pipeline and the router.
//!
//! Any dependency that cannot be reached here aborts startup. Once
//! [`build_application`] returns, the store, the broker and the HTTP port have
//! all answered at least once.

use crate::config::Config;
use crate::lifecycle::Application;
use anyhow::Context;
use axum::routing::get;
use inventory_core::{OutcomeTopics, StockStore};
use inventory_postgres::PostgresStockStore;
use inventory_redpanda::{RedpandaOrderLog, RedpandaOutcomePublisher};
use inventory_runtime::{MetricsRecorder, OrderConsumer, ReservationEngine, RetryPolicy};
use inventory_web::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

/// Connect dependencies and assemble the [`Application`].
///
/// # Errors
///
/// Returns an error if the metrics recorder cannot be installed, the
/// database or broker is unreachable, migrations fail, or the HTTP port
/// cannot be bound.
pub async fn build_application(config: Config) -> anyhow::Result<Application> {
    let metrics = MetricsRecorder::install().context("Failed to install metrics recorder")?;

    let store = Arc::new(
        PostgresStockStore::connect(
            &config.postgres.url,
            config.postgres.max_connections,
            config.postgres.connect_timeout(),
        )
        .await
        .context("PostgreSQL unreachable")?,
    );
    store.migrate().await.context("Database migration failed")?;
    info!("✓ Stock store ready");

    let probe_timeout = config.postgres.connect_timeout();

    let order_log = RedpandaOrderLog::builder()
        .brokers(&config.redpanda.brokers)
        .consumer_group(&config.redpanda.consumer_group)
        .topic(&config.redpanda.orders_topic)
        .auto_offset_reset(&config.redpanda.auto_offset_reset)
        .build()
        .context("Failed to create order consumer")?;
    order_log
        .check_connection(probe_timeout)
        .await
        .context("Redpanda unreachable")?;

    let publisher = Arc::new(
        RedpandaOutcomePublisher::builder()
            .brokers(&config.redpanda.brokers)
            .producer_acks(&config.redpanda.producer_acks)
            .timeout(config.pipeline.publish_timeout())
            .topics(OutcomeTopics {
                reserved: config.redpanda.reserved_topic.clone(),
                failed: config.redpanda.failed_topic.clone(),
            })
            .build()
            .context("Failed to create outcome producer")?,
    );
    publisher
        .check_connection(probe_timeout)
        .await
        .context("Redpanda unreachable")?;
    info!("✓ Redpanda clients ready");

    let shared_store: Arc<dyn StockStore> = store.clone();

    let engine = ReservationEngine::new(Arc::clone(&shared_store))
        .with_store_timeout(config.pipeline.store_timeout())
        .with_retry_policy(
            RetryPolicy::builder()
                .max_retries(config.pipeline.store_max_retries)
                .jitter(true)
                .build(),
        );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let consumer = OrderConsumer::builder()
        .name("inventory-reservations")
        .log(Arc::new(order_log))
        .engine(engine)
        .publisher(publisher.clone())
        .shutdown(shutdown_rx)
        .publish_timeout(config.pipeline.publish_timeout())
        .publish_retry(
            RetryPolicy::builder()
                .max_retries(config.pipeline.publish_max_retries)
                .initial_delay(Duration::from_millis(200))
                .max_delay(Duration::from_secs(10))
                .jitter(true)
                .build(),
        )
        .build()
        .context("Failed to build order consumer")?;

    let router = inventory_web::with_middleware(
        inventory_web::routes()
            .with_state(AppState::new(shared_store))
            .route("/metrics", get(move || std::future::ready(metrics.render()))),
    );

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;

    Ok(Application::new(
        listener,
        router,
        consumer,
        store,
        publisher,
        shutdown_tx,
        Arc::new(config),
    ))
}
