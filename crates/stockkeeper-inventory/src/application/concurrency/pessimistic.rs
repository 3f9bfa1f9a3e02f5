//! Pessimistic strategy: per-id exclusive lock across the whole cycle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stockkeeper_core::config::StrategyKind;
use stockkeeper_core::error::DomainError;
use stockkeeper_core::store::{StockRecord, StockStore};
use tracing::instrument;
use uuid::Uuid;

use super::{ConcurrencyStrategy, KeyedLocks, conflict_as_contention, decrease_once, run_to_completion};

/// Serializes decrements of the same stock id behind an in-process lock.
///
/// Decrements of different ids run in parallel.
#[derive(Debug, Default)]
pub struct PessimisticStrategy {
    locks: KeyedLocks,
    lock_timeout: Option<Duration>,
}

impl PessimisticStrategy {
    /// Creates the strategy. `lock_timeout` of `None` waits indefinitely.
    #[must_use]
    pub fn new(lock_timeout: Option<Duration>) -> Self {
        Self {
            locks: KeyedLocks::new(),
            lock_timeout,
        }
    }

    /// The lock table, exposed for inspection.
    #[must_use]
    pub fn locks(&self) -> &KeyedLocks {
        &self.locks
    }
}

#[async_trait]
impl ConcurrencyStrategy for PessimisticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Pessimistic
    }

    #[instrument(skip(self, store), fields(strategy = "pessimistic"))]
    async fn decrease(
        &self,
        store: Arc<dyn StockStore>,
        stock_id: Uuid,
        amount: i64,
    ) -> Result<StockRecord, DomainError> {
        let guard = self.locks.acquire(stock_id, self.lock_timeout).await?;

        run_to_completion(async move {
            let result = decrease_once(store.as_ref(), stock_id, amount).await;
            drop(guard);
            result.map_err(conflict_as_contention)
        })
        .await
    }
}
