//! Optimistic strategy: unlocked cycle, revision-checked store, bounded retry.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use stockkeeper_core::config::StrategyKind;
use stockkeeper_core::error::DomainError;
use stockkeeper_core::store::{StockRecord, StockStore};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{Backoff, ConcurrencyStrategy, SharedRng, decrease_once, pause};

/// Runs the decrement cycle without locking and retries on conflict.
pub struct OptimisticStrategy {
    max_retries: u32,
    backoff: Backoff,
    rng: SharedRng,
}

impl OptimisticStrategy {
    /// Creates the strategy. At most `max_retries + 1` attempts are made.
    #[must_use]
    pub fn new(max_retries: u32, backoff: Backoff, rng: SharedRng) -> Self {
        Self {
            max_retries,
            backoff,
            rng,
        }
    }
}

impl fmt::Debug for OptimisticStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimisticStrategy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConcurrencyStrategy for OptimisticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Optimistic
    }

    #[instrument(skip(self, store), fields(strategy = "optimistic"))]
    async fn decrease(
        &self,
        store: Arc<dyn StockStore>,
        stock_id: Uuid,
        amount: i64,
    ) -> Result<StockRecord, DomainError> {
        let max_attempts = self.max_retries.saturating_add(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match decrease_once(store.as_ref(), stock_id, amount).await {
                Err(DomainError::ConcurrencyConflict {
                    expected, actual, ..
                }) => {
                    if attempt >= max_attempts {
                        warn!(%stock_id, attempts = attempt, "optimistic retry budget exhausted");
                        return Err(DomainError::ContentionExceeded {
                            stock_id,
                            attempts: attempt,
                        });
                    }
                    debug!(%stock_id, attempt, expected, actual, "revision conflict, retrying");
                    pause(self.backoff.delay(attempt, &self.rng)).await;
                }
                outcome => return outcome,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use stockkeeper_core::error::DomainError;
    use stockkeeper_core::store::{StockRecord, StockStore};
    use stockkeeper_store::memory::InMemoryStockStore;
    use stockkeeper_test_support::{ConflictingStockStore, MockRng, run_contention};
    use uuid::Uuid;

    use super::*;

    fn mock_rng() -> SharedRng {
        Arc::new(Mutex::new(MockRng))
    }

    async fn seeded(quantity: i64) -> (Arc<InMemoryStockStore>, Uuid) {
        let store = Arc::new(InMemoryStockStore::new());
        let stock_id = Uuid::new_v4();
        store
            .insert(&StockRecord {
                stock_id,
                product_id: Uuid::new_v4(),
                quantity,
                revision: 0,
            })
            .await
            .unwrap();
        (store, stock_id)
    }

    #[tokio::test]
    async fn test_persistent_conflicts_exceed_retry_budget() {
        // Arrange: every store attempt loses the race.
        let (inner, stock_id) = seeded(10).await;
        let conflicting = Arc::new(ConflictingStockStore::always(inner.clone()));
        let strategy = OptimisticStrategy::new(3, Backoff::none(), mock_rng());

        // Act
        let result = strategy.decrease(conflicting.clone(), stock_id, 1).await;

        // Assert
        match result {
            Err(DomainError::ContentionExceeded {
                stock_id: id,
                attempts,
            }) => {
                assert_eq!(id, stock_id);
                assert_eq!(attempts, 4);
            }
            other => panic!("expected ContentionExceeded, got {other:?}"),
        }
        assert_eq!(conflicting.store_attempts(), 4);
        let record = inner.load(stock_id).await.unwrap();
        assert_eq!(record.quantity, 10);
        assert_eq!(record.revision, 0);
    }

    #[tokio::test]
    async fn test_zero_retries_gives_up_after_first_conflict() {
        let (inner, stock_id) = seeded(10).await;
        let conflicting = Arc::new(ConflictingStockStore::always(inner));
        let strategy = OptimisticStrategy::new(0, Backoff::none(), mock_rng());

        let result = strategy.decrease(conflicting.clone(), stock_id, 1).await;

        assert!(matches!(
            result,
            Err(DomainError::ContentionExceeded { attempts: 1, .. })
        ));
        assert_eq!(conflicting.store_attempts(), 1);
    }

    #[tokio::test]
    async fn test_transient_conflicts_are_retried_to_success() {
        // Arrange: the first two stores conflict, the third goes through.
        let (inner, stock_id) = seeded(10).await;
        let conflicting = Arc::new(ConflictingStockStore::first(2, inner.clone()));
        let strategy = OptimisticStrategy::new(
            5,
            Backoff::new(Duration::from_millis(1)),
            mock_rng(),
        );

        // Act
        let committed = strategy
            .decrease(conflicting.clone(), stock_id, 4)
            .await
            .unwrap();

        // Assert
        assert_eq!(committed.quantity, 6);
        assert_eq!(committed.revision, 1);
        assert_eq!(conflicting.store_attempts(), 3);
        assert_eq!(inner.load(stock_id).await.unwrap(), committed);
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_not_retried() {
        let (inner, stock_id) = seeded(5).await;
        let conflicting = Arc::new(ConflictingStockStore::always(inner.clone()));
        let strategy = OptimisticStrategy::new(10, Backoff::none(), mock_rng());

        let result = strategy.decrease(conflicting.clone(), stock_id, 10).await;

        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));
        assert_eq!(conflicting.store_attempts(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_hundred_concurrent_decrements_without_lost_updates() {
        // Arrange
        let (store, stock_id) = seeded(100).await;
        // Each lost race means another decrement committed, so no request
        // can need more than 100 attempts.
        let strategy = Arc::new(OptimisticStrategy::new(100, Backoff::none(), mock_rng()));

        // Act
        let report = {
            let store: Arc<dyn StockStore> = store.clone();
            run_contention(100, 32, move |_| {
                let store = Arc::clone(&store);
                let strategy = Arc::clone(&strategy);
                async move { strategy.decrease(store, stock_id, 1).await }
            })
            .await
        };

        // Assert
        assert_eq!(report.succeeded, 100);
        let record = store.load(stock_id).await.unwrap();
        assert_eq!(record.quantity, 0);
        assert_eq!(record.revision, 100);
    }
}
