//! Application lifecycle and graceful shutdown.
//!
//! When Ctrl+C or SIGTERM arrives (or the order consumer stops on its own):
//! 1. HTTP stops accepting connections and drains in-flight requests
//! 2. The consumer is told to stop fetching; its in-flight order finishes
//!    (bounded by `SHUTDOWN_TIMEOUT`)
//! 3. Queued outcome records are flushed
//! 4. The database pool is closed

use crate::config::Config;
use inventory_postgres::PostgresStockStore;
use inventory_redpanda::RedpandaOutcomePublisher;
use inventory_runtime::OrderConsumer;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tracing::{info, warn};

/// Running application with its background consumer.
pub struct Application {
    /// TCP listener for HTTP server
    listener: tokio::net::TcpListener,

    /// Axum router with all HTTP routes
    router: axum::Router,

    /// Order consumer, spawned by [`Application::run`]
    consumer: OrderConsumer,

    /// Stock store, closed on shutdown
    store: Arc<PostgresStockStore>,

    /// Outcome producer, flushed on shutdown
    publisher: Arc<RedpandaOutcomePublisher>,

    /// Shutdown signal broadcaster
    shutdown_tx: broadcast::Sender<()>,

    /// Application configuration
    config: Arc<Config>,
}

impl Application {
    /// Create a new application instance.
    #[must_use]
    pub fn new(
        listener: tokio::net::TcpListener,
        router: axum::Router,
        consumer: OrderConsumer,
        store: Arc<PostgresStockStore>,
        publisher: Arc<RedpandaOutcomePublisher>,
        shutdown_tx: broadcast::Sender<()>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            listener,
            router,
            consumer,
            store,
            publisher,
            shutdown_tx,
            config,
        }
    }

    /// Serve HTTP and consume orders until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP server fails. Resources are still
    /// released in that case.
    pub async fn run(self) -> anyhow::Result<()> {
        let Self {
            listener,
            router,
            consumer,
            store,
            publisher,
            shutdown_tx,
            config,
        } = self;

        let stats = consumer.stats();
        let (stopped_tx, stopped_rx) = oneshot::channel::<()>();
        let mut consumer_handle = tokio::spawn(async move {
            consumer.run().await;
            let _ = stopped_tx.send(());
        });

        info!(
            address = %config.server.bind_address(),
            orders_topic = %config.redpanda.orders_topic,
            consumer_group = %config.redpanda.consumer_group,
            "Inventory service running"
        );

        let signal_tx = shutdown_tx.clone();
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    () = shutdown_signal() => {}
                    _ = stopped_rx => warn!("Order consumer stopped, shutting down"),
                }
                // Stop fetching orders while HTTP drains.
                let _ = signal_tx.send(());
            })
            .await;

        info!("HTTP server stopped, initiating graceful shutdown...");
        let _ = shutdown_tx.send(());

        let timeout = config.server.shutdown_timeout();
        match tokio::time::timeout(timeout, &mut consumer_handle).await {
            Ok(Ok(())) => info!("Order consumer stopped gracefully"),
            Ok(Err(e)) => warn!(error = %e, "Order consumer task failed"),
            Err(_) => {
                warn!(?timeout, "Order consumer shutdown timed out");
                consumer_handle.abort();
            }
        }

        let totals = stats.snapshot();
        info!(
            received = totals.received,
            reserved = totals.reserved,
            failed = totals.failed,
            malformed = totals.malformed,
            publish_failures = totals.publish_failures,
            "Order consumer totals"
        );

        let flush_timeout = config.pipeline.publish_timeout();
        let flushed =
            tokio::task::spawn_blocking(move || publisher.flush(flush_timeout)).await;
        match flushed {
            Ok(Ok(())) => info!("Outcome producer flushed"),
            Ok(Err(e)) => warn!(error = %e, "Outcome producer flush incomplete"),
            Err(e) => warn!(error = %e, "Outcome producer flush task failed"),
        }

        store.close().await;

        info!("Graceful shutdown complete");
        served.map_err(Into::into)
    }
}

/// Wait for Ctrl+C or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires; the other
/// one still does.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
