//! Distributed-lock strategy: per-id lease from an external lock service.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stockkeeper_core::config::StrategyKind;
use stockkeeper_core::error::DomainError;
use stockkeeper_core::lock::{Lease, LeaseLockService};
use stockkeeper_core::store::{StockRecord, StockStore};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{
    Backoff, ConcurrencyStrategy, SharedRng, conflict_as_contention, decrease_once, pause,
    run_to_completion,
};

/// Serializes decrements of one stock id across service instances by
/// holding a lease for the duration of the cycle.
///
/// Each call acquires under a fresh owner token, so a lease that lapsed and
/// was taken over is never released by the previous holder.
pub struct DistributedLockStrategy {
    leases: Arc<dyn LeaseLockService>,
    lease_ttl: Duration,
    lock_timeout: Option<Duration>,
    backoff: Backoff,
    rng: SharedRng,
}

impl DistributedLockStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new(
        leases: Arc<dyn LeaseLockService>,
        lease_ttl: Duration,
        lock_timeout: Option<Duration>,
        backoff: Backoff,
        rng: SharedRng,
    ) -> Self {
        Self {
            leases,
            lease_ttl,
            lock_timeout,
            backoff,
            rng,
        }
    }

    /// Polls the lease service until the lease is granted or the lock
    /// timeout elapses.
    async fn acquire(&self, stock_id: Uuid, owner: Uuid) -> Result<Lease, DomainError> {
        let started = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            if let Some(lease) = self
                .leases
                .try_acquire(stock_id, owner, self.lease_ttl)
                .await?
            {
                debug!(%stock_id, %owner, attempts = attempt + 1, "lease acquired");
                return Ok(lease);
            }
            attempt = attempt.saturating_add(1);

            let mut delay = self.backoff.delay(attempt, &self.rng);
            if let Some(limit) = self.lock_timeout {
                let waited = started.elapsed();
                if waited >= limit {
                    return Err(DomainError::Busy { stock_id, waited });
                }
                delay = delay.min(limit - waited);
            }
            pause(delay).await;
        }
    }
}

impl fmt::Debug for DistributedLockStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedLockStrategy")
            .field("lease_ttl", &self.lease_ttl)
            .field("lock_timeout", &self.lock_timeout)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConcurrencyStrategy for DistributedLockStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Distributed
    }

    #[instrument(skip(self, store), fields(strategy = "distributed"))]
    async fn decrease(
        &self,
        store: Arc<dyn StockStore>,
        stock_id: Uuid,
        amount: i64,
    ) -> Result<StockRecord, DomainError> {
        let lease = self.acquire(stock_id, Uuid::new_v4()).await?;
        let leases = Arc::clone(&self.leases);

        run_to_completion(async move {
            let result = decrease_once(store.as_ref(), stock_id, amount).await;
            match leases.release(&lease).await {
                Ok(true) => {}
                Ok(false) => warn!(
                    %stock_id,
                    owner = %lease.owner,
                    "lease lapsed before release; current holder left untouched"
                ),
                Err(e) => warn!(
                    %stock_id,
                    owner = %lease.owner,
                    error = %e,
                    "lease release failed; it will lapse at expiry"
                ),
            }
            result.map_err(conflict_as_contention)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use stockkeeper_core::error::DomainError;
    use stockkeeper_core::lock::LeaseLockService;
    use stockkeeper_core::store::{StockRecord, StockStore};
    use stockkeeper_store::memory::{InMemoryLeaseLockService, InMemoryStockStore};
    use stockkeeper_test_support::{
        FailingStockStore, GatedStockStore, ManualClock, MockRng, run_contention,
    };
    use uuid::Uuid;

    use super::*;

    fn rng() -> SharedRng {
        Arc::new(Mutex::new(MockRng))
    }

    fn strategy(
        leases: Arc<InMemoryLeaseLockService>,
        timeout: Option<Duration>,
    ) -> DistributedLockStrategy {
        DistributedLockStrategy::new(
            leases,
            Duration::from_secs(10),
            timeout,
            Backoff::new(Duration::from_millis(1)).capped(Duration::from_millis(2)),
            rng(),
        )
    }

    fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ))
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

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_hundred_concurrent_decrements_across_instances() {
        // Arrange: two strategy instances share one lease service and store,
        // as two service processes would.
        let (store, stock_id) = seeded(100).await;
        let leases = Arc::new(InMemoryLeaseLockService::new(manual_clock()));
        let instances = Arc::new([
            strategy(Arc::clone(&leases), None),
            strategy(Arc::clone(&leases), None),
        ]);

        // Act
        let report = {
            let store: Arc<dyn StockStore> = store.clone();
            run_contention(100, 32, move |i| {
                let store = Arc::clone(&store);
                let instances = Arc::clone(&instances);
                async move { instances[i % 2].decrease(store, stock_id, 1).await }
            })
            .await
        };

        // Assert
        assert_eq!(report.succeeded, 100);
        let record = store.load(stock_id).await.unwrap();
        assert_eq!(record.quantity, 0);
        assert_eq!(record.revision, 100);
        assert_eq!(leases.held(), 0);
    }

    #[tokio::test]
    async fn test_live_lease_held_elsewhere_times_out_as_busy() {
        // Arrange
        let (store, stock_id) = seeded(10).await;
        let leases = Arc::new(InMemoryLeaseLockService::new(manual_clock()));
        leases
            .try_acquire(stock_id, Uuid::new_v4(), Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        let strategy = strategy(Arc::clone(&leases), Some(Duration::from_millis(30)));

        // Act
        let result = strategy.decrease(store.clone(), stock_id, 1).await;

        // Assert
        match result {
            Err(DomainError::Busy { stock_id: id, waited }) => {
                assert_eq!(id, stock_id);
                assert!(waited >= Duration::from_millis(30));
            }
            other => panic!("expected Busy, got {other:?}"),
        }
        assert_eq!(store.load(stock_id).await.unwrap().revision, 0);
    }

    #[tokio::test]
    async fn test_expired_lease_of_crashed_holder_is_taken_over() {
        // Arrange: a holder took the lease and never released it.
        let (store, stock_id) = seeded(10).await;
        let clock = manual_clock();
        let leases = Arc::new(InMemoryLeaseLockService::new(clock.clone()));
        leases
            .try_acquire(stock_id, Uuid::new_v4(), Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        clock.advance(Duration::from_secs(6));
        let strategy = strategy(Arc::clone(&leases), Some(Duration::from_millis(30)));

        // Act
        let committed = strategy.decrease(store.clone(), stock_id, 2).await.unwrap();

        // Assert
        assert_eq!(committed.quantity, 8);
        assert_eq!(committed.revision, 1);
        assert_eq!(leases.held(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_still_releases_lease() {
        // Arrange
        let (inner, stock_id) = seeded(10).await;
        let store: Arc<dyn StockStore> = Arc::new(FailingStockStore::on_store(inner.clone()));
        let leases = Arc::new(InMemoryLeaseLockService::new(manual_clock()));
        let strategy = strategy(Arc::clone(&leases), Some(Duration::from_millis(30)));

        // Act
        let result = strategy.decrease(store, stock_id, 1).await;

        // Assert
        assert!(matches!(result, Err(DomainError::StorageUnavailable(_))));
        assert_eq!(leases.held(), 0);
        assert_eq!(inner.load(stock_id).await.unwrap().quantity, 10);
    }

    #[tokio::test]
    async fn test_lease_lapsing_mid_cycle_loses_the_write() {
        // Arrange: the first instance loads, then stalls before its write
        // for longer than the lease lives.
        let (inner, stock_id) = seeded(10).await;
        let clock = manual_clock();
        let leases = Arc::new(InMemoryLeaseLockService::new(clock.clone()));
        let gated = Arc::new(GatedStockStore::on_store(inner.clone()));
        let stalled = Arc::new(strategy(Arc::clone(&leases), None));
        let first = {
            let stalled = Arc::clone(&stalled);
            let store: Arc<dyn StockStore> = gated.clone();
            tokio::spawn(async move { stalled.decrease(store, stock_id, 2).await })
        };
        gated.wait_until_entered().await;
        clock.advance(Duration::from_secs(11));

        // Act: a second instance takes over the lapsed lease and commits.
        let second = strategy(Arc::clone(&leases), Some(Duration::from_millis(30)))
            .decrease(inner.clone(), stock_id, 4)
            .await;
        gated.open();
        let first = first.await.unwrap();

        // Assert
        let committed = second.unwrap();
        assert_eq!((committed.quantity, committed.revision), (6, 1));
        assert!(matches!(
            first,
            Err(DomainError::ContentionExceeded { attempts: 1, .. })
        ));
        let record = inner.load(stock_id).await.unwrap();
        assert_eq!((record.quantity, record.revision), (6, 1));
        assert_eq!(leases.held(), 0);
    }

    #[tokio::test]
    async fn test_release_after_lapse_leaves_new_holder_in_place() {
        // Arrange
        let (inner, stock_id) = seeded(10).await;
        let clock = manual_clock();
        let leases = Arc::new(InMemoryLeaseLockService::new(clock.clone()));
        let gated = Arc::new(GatedStockStore::on_store(inner.clone()));
        let stalled = Arc::new(strategy(Arc::clone(&leases), None));
        let first = {
            let stalled = Arc::clone(&stalled);
            let store: Arc<dyn StockStore> = gated.clone();
            tokio::spawn(async move { stalled.decrease(store, stock_id, 1).await })
        };
        gated.wait_until_entered().await;
        clock.advance(Duration::from_secs(11));
        let successor = Uuid::new_v4();
        leases
            .try_acquire(stock_id, successor, Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();

        // Act
        gated.open();
        let first = first.await.unwrap();

        // Assert: the stale write went through but the successor's lease survives.
        assert!(first.is_ok());
        assert_eq!(leases.held(), 1);
        assert!(
            leases
                .try_acquire(stock_id, Uuid::new_v4(), Duration::from_secs(1))
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            leases
                .try_acquire(stock_id, successor, Duration::from_secs(30))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_unknown_stock_releases_lease() {
        let (store, _) = seeded(10).await;
        let leases = Arc::new(InMemoryLeaseLockService::new(manual_clock()));
        let strategy = strategy(Arc::clone(&leases), None);
        let missing = Uuid::new_v4();

        let result = strategy.decrease(store, missing, 1).await;

        assert!(matches!(result, Err(DomainError::StockNotFound(id)) if id == missing));
        assert_eq!(leases.held(), 0);
    }
}
