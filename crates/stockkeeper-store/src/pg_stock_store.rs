//! `PostgreSQL` implementation of the `StockStore` trait.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use stockkeeper_core::error::DomainError;
use stockkeeper_core::store::{StockRecord, StockStore};

use crate::map_sqlx_error;

/// PostgreSQL-backed stock store.
///
/// The conditional write is a single `UPDATE` guarded by the expected
/// revision, so it stays atomic across service instances sharing the table.
#[derive(Debug, Clone)]
pub struct PgStockStore {
    pool: PgPool,
}

impl PgStockStore {
    /// Creates a new `PgStockStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_revision(&self, stock_id: Uuid) -> Result<Option<i64>, DomainError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT revision FROM stocks WHERE id = $1")
            .bind(stock_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(|(revision,)| revision))
    }
}

#[async_trait]
impl StockStore for PgStockStore {
    #[instrument(skip(self), level = "debug")]
    async fn load(&self, stock_id: Uuid) -> Result<StockRecord, DomainError> {
        let row: Option<(Uuid, Uuid, i64, i64)> = sqlx::query_as(
            "SELECT id, product_id, quantity, revision FROM stocks WHERE id = $1",
        )
        .bind(stock_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(|(stock_id, product_id, quantity, revision)| StockRecord {
            stock_id,
            product_id,
            quantity,
            revision,
        })
        .ok_or(DomainError::StockNotFound(stock_id))
    }

    #[instrument(skip(self, record), fields(stock_id = %record.stock_id), level = "debug")]
    async fn store(&self, record: &StockRecord, expected_revision: i64) -> Result<(), DomainError> {
        record.ensure_successor_of(expected_revision)?;
        let result = sqlx::query(
            "UPDATE stocks SET quantity = $3, revision = $4, updated_at = NOW() \
             WHERE id = $1 AND revision = $2",
        )
        .bind(record.stock_id)
        .bind(expected_revision)
        .bind(record.quantity)
        .bind(record.revision)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        match self.current_revision(record.stock_id).await? {
            Some(actual) => Err(DomainError::ConcurrencyConflict {
                stock_id: record.stock_id,
                expected: expected_revision,
                actual,
            }),
            None => Err(DomainError::StockNotFound(record.stock_id)),
        }
    }

    #[instrument(skip(self, record), fields(stock_id = %record.stock_id), level = "debug")]
    async fn insert(&self, record: &StockRecord) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO stocks (id, product_id, quantity, revision) VALUES ($1, $2, $3, $4)",
        )
        .bind(record.stock_id)
        .bind(record.product_id)
        .bind(record.quantity)
        .bind(record.revision)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}
