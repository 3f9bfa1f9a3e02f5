//! `PostgreSQL` implementation of the `LeaseLockService` trait.
//!
//! Expiry is computed and compared with the database's `now()`, so service
//! instances with skewed clocks still agree on when a lease lapses.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use stockkeeper_core::error::DomainError;
use stockkeeper_core::lock::{Lease, LeaseLockService};

use crate::map_sqlx_error;

/// Lease table in PostgreSQL shared by every service instance.
#[derive(Debug, Clone)]
pub struct PgLeaseLockService {
    pool: PgPool,
}

impl PgLeaseLockService {
    /// Creates a new `PgLeaseLockService`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeaseLockService for PgLeaseLockService {
    #[instrument(skip(self), level = "debug")]
    async fn try_acquire(
        &self,
        stock_id: Uuid,
        owner: Uuid,
        ttl: Duration,
    ) -> Result<Option<Lease>, DomainError> {
        // The upsert only overwrites a lease that has already lapsed.
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "INSERT INTO stock_locks (stock_id, owner, expires_at) \
             VALUES ($1, $2, NOW() + make_interval(secs => $3)) \
             ON CONFLICT (stock_id) DO UPDATE \
                SET owner = EXCLUDED.owner, expires_at = EXCLUDED.expires_at \
                WHERE stock_locks.expires_at <= NOW() \
             RETURNING expires_at",
        )
        .bind(stock_id)
        .bind(owner)
        .bind(ttl.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if row.is_none() {
            debug!(%stock_id, "lease held elsewhere");
        }
        Ok(row.map(|(expires_at,)| Lease {
            stock_id,
            owner,
            expires_at,
        }))
    }

    #[instrument(skip(self, lease), fields(stock_id = %lease.stock_id, owner = %lease.owner), level = "debug")]
    async fn release(&self, lease: &Lease) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM stock_locks WHERE stock_id = $1 AND owner = $2")
            .bind(lease.stock_id)
            .bind(lease.owner)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }
}
