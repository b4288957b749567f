//! `PostgreSQL` stock store for the inventory reservation service.
//!
//! Implements [`StockStore`] over two tables (see `migrations/`):
//!
//! - `inventories(product_id PK, quantity, updated_at)`: current stock
//! - `processed_orders(order_id PK, ..., decision)`: reservation ledger
//!
//! # Reservation transaction
//!
//! ```text
//! BEGIN
//!   INSERT INTO processed_orders ... ON CONFLICT (order_id) DO NOTHING
//!     └ 0 rows: order already decided → return recorded decision (replay)
//!   UPDATE inventories SET quantity = quantity - $q
//!    WHERE product_id = $p AND quantity >= $q RETURNING quantity
//!     └ 0 rows: product missing → NotFound, else → InsufficientStock
//!   UPDATE processed_orders SET decision = ...
//! COMMIT
//! ```
//!
//! The conditional `UPDATE` takes the row lock, so concurrent reservations
//! for one product serialize in the database and can never oversell. The
//! ledger insert blocks a concurrent delivery of the same order until the
//! first one commits.
//!
//! # Example
//!
//! ```ignore
//! use inventory_postgres::PostgresStockStore;
//! use std::time::Duration;
//!
//! let store = PostgresStockStore::connect(
//!     "postgres://localhost/inventory",
//!     10,
//!     Duration::from_secs(5),
//! ).await?;
//! store.migrate().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use inventory_core::{
    ProductId, Reservation, ReservationRequest, ReserveDecision, StockRecord, StockStore,
    StockStoreError,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Placeholder decision held by a ledger row until its transaction commits.
const PENDING_DECISION: &str = "pending";

type StockRow = (i64, i64, DateTime<Utc>);

/// PostgreSQL-backed [`StockStore`].
#[derive(Clone, Debug)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    /// Create a store from an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool and verify the database answers.
    ///
    /// # Errors
    ///
    /// Returns [`StockStoreError::Unavailable`] if the database cannot be reached
    /// within `connect_timeout`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StockStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StockStoreError::Unavailable(format!("Failed to connect: {e}")))?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Create the tables if they don't already exist.
    ///
    /// # Errors
    ///
    /// Returns [`StockStoreError::Query`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StockStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StockStoreError::Query(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }

    async fn reserve_in_transaction(
        &self,
        request: ReservationRequest,
    ) -> Result<Reservation, StockStoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let claimed = sqlx::query(
            "INSERT INTO processed_orders (order_id, product_id, quantity, decision, processed_at)
             VALUES ($1, $2, $3, $4, now())
             ON CONFLICT (order_id) DO NOTHING",
        )
        .bind(request.order_id.get())
        .bind(request.product_id.get())
        .bind(request.quantity)
        .bind(PENDING_DECISION)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected()
            == 1;

        if !claimed {
            let (decision,): (String,) =
                sqlx::query_as("SELECT decision FROM processed_orders WHERE order_id = $1")
                    .bind(request.order_id.get())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(Reservation::replayed(ReserveDecision::parse(&decision)?));
        }

        let remaining: Option<(i64,)> = sqlx::query_as(
            "UPDATE inventories
             SET quantity = quantity - $1, updated_at = now()
             WHERE product_id = $2 AND quantity >= $1
             RETURNING quantity",
        )
        .bind(request.quantity)
        .bind(request.product_id.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let decision = if remaining.is_some() {
            ReserveDecision::Reserved
        } else {
            let (exists,): (bool,) =
                sqlx::query_as("SELECT EXISTS(SELECT 1 FROM inventories WHERE product_id = $1)")
                    .bind(request.product_id.get())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
            if exists {
                ReserveDecision::InsufficientStock
            } else {
                ReserveDecision::NotFound
            }
        };

        sqlx::query("UPDATE processed_orders SET decision = $2 WHERE order_id = $1")
            .bind(request.order_id.get())
            .bind(decision.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        tracing::debug!(
            order_id = %request.order_id,
            product_id = %request.product_id,
            remaining = remaining.map(|(q,)| q),
            decision = decision.as_str(),
            "Reservation committed"
        );
        Ok(Reservation::fresh(decision))
    }
}

impl StockStore for PostgresStockStore {
    fn get_stock(
        &self,
        product_id: ProductId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<StockRecord>, StockStoreError>> + Send + '_>>
    {
        Box::pin(async move {
            let row: Option<StockRow> = sqlx::query_as(
                "SELECT product_id, quantity, updated_at FROM inventories WHERE product_id = $1",
            )
            .bind(product_id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| record_error("get_stock", e))?;

            Ok(row.map(row_to_record))
        })
    }

    fn create_stock(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Pin<Box<dyn Future<Output = Result<StockRecord, StockStoreError>> + Send + '_>> {
        Box::pin(async move {
            if quantity < 0 {
                return Err(StockStoreError::InvalidQuantity(quantity));
            }

            let row: Option<StockRow> = sqlx::query_as(
                "INSERT INTO inventories (product_id, quantity, updated_at)
                 VALUES ($1, $2, now())
                 ON CONFLICT (product_id) DO NOTHING
                 RETURNING product_id, quantity, updated_at",
            )
            .bind(product_id.get())
            .bind(quantity)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| record_error("create_stock", e))?;

            row.map(row_to_record)
                .ok_or(StockStoreError::AlreadyExists(product_id))
        })
    }

    fn set_quantity(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<StockRecord>, StockStoreError>> + Send + '_>>
    {
        Box::pin(async move {
            if quantity < 0 {
                return Err(StockStoreError::InvalidQuantity(quantity));
            }

            let row: Option<StockRow> = sqlx::query_as(
                "UPDATE inventories SET quantity = $2, updated_at = now()
                 WHERE product_id = $1
                 RETURNING product_id, quantity, updated_at",
            )
            .bind(product_id.get())
            .bind(quantity)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| record_error("set_quantity", e))?;

            Ok(row.map(row_to_record))
        })
    }

    fn try_reserve(
        &self,
        request: ReservationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Reservation, StockStoreError>> + Send + '_>> {
        Box::pin(async move {
            if request.quantity <= 0 {
                return Err(StockStoreError::InvalidQuantity(request.quantity));
            }

            self.reserve_in_transaction(request).await.inspect_err(|_| {
                metrics::counter!("inventory_store_errors_total", "operation" => "try_reserve")
                    .increment(1);
            })
        })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), StockStoreError>> + Send + '_>> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| record_error("ping", e))?;
            Ok(())
        })
    }
}

fn row_to_record((product_id, quantity, updated_at): StockRow) -> StockRecord {
    StockRecord {
        product_id: ProductId::new(product_id),
        quantity,
        updated_at,
    }
}

fn record_error(operation: &'static str, err: sqlx::Error) -> StockStoreError {
    metrics::counter!("inventory_store_errors_total", "operation" => operation).increment(1);
    map_sqlx_error(err)
}

/// Classify a sqlx error.
///
/// Connection-level failures and serialization conflicts are transient;
/// everything else is a query error.
fn map_sqlx_error(err: sqlx::Error) -> StockStoreError {
    let transient = match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => is_transient_sqlstate(db.code().as_deref()),
        _ => false,
    };

    if transient {
        StockStoreError::Unavailable(err.to_string())
    } else {
        StockStoreError::Query(err.to_string())
    }
}

/// `40001` serialization failure, `40P01` deadlock, class `08` connection
/// exceptions, `57P01` admin shutdown.
fn is_transient_sqlstate(code: Option<&str>) -> bool {
    matches!(code, Some("40001" | "40P01" | "57P01")) || code.is_some_and(|c| c.starts_with("08"))
}
