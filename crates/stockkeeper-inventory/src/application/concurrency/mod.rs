//! Concurrency strategies guarding the decrement cycle.
//!
//! Every strategy runs the same critical section (load the record, apply
//! the decrease to the aggregate, store it against the loaded revision)
//! and differs only in how concurrent cycles on one stock id are
//! serialized or reconciled:
//!
//! - [`PessimisticStrategy`] holds a per-id in-process lock across the
//!   whole cycle.
//! - [`OptimisticStrategy`] runs the cycle unlocked and retries on revision
//!   conflicts, up to a bounded budget.
//! - [`DistributedLockStrategy`] holds a per-id lease from an external
//!   [`LeaseLockService`] so several service instances can share a store.
//!
//! The store's revision check is evaluated under every strategy, so even a
//! writer outside the controlled path cannot cause a lost update.

mod distributed;
mod keyed_locks;
mod optimistic;
mod pessimistic;

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use stockkeeper_core::config::{ConcurrencyConfig, StrategyKind};
use stockkeeper_core::error::DomainError;
use stockkeeper_core::lock::LeaseLockService;
use stockkeeper_core::rng::DeterministicRng;
use stockkeeper_core::store::{StockRecord, StockStore};
use tracing::debug;
use uuid::Uuid;

use crate::domain::aggregates::Stock;

pub use distributed::DistributedLockStrategy;
pub use keyed_locks::{KeyedLockGuard, KeyedLocks};
pub use optimistic::OptimisticStrategy;
pub use pessimistic::PessimisticStrategy;

/// Shared, lockable source of backoff jitter.
pub type SharedRng = Arc<Mutex<dyn DeterministicRng + Send>>;

/// Upper bound on a single backoff delay.
const BACKOFF_CAP: Duration = Duration::from_millis(250);

/// Policy that serializes or reconciles concurrent decrements of one stock id.
#[async_trait]
pub trait ConcurrencyStrategy: Send + Sync + fmt::Debug {
    /// Which policy this is.
    fn kind(&self) -> StrategyKind;

    /// Decrease `stock_id` by `amount` and return the committed record.
    ///
    /// On any error the persisted record is left exactly as it was.
    async fn decrease(
        &self,
        store: Arc<dyn StockStore>,
        stock_id: Uuid,
        amount: i64,
    ) -> Result<StockRecord, DomainError>;
}

/// Builds the strategy selected by `config`.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` if the configuration is invalid or
/// the distributed strategy is selected without a lease service.
pub fn build_strategy(
    config: &ConcurrencyConfig,
    leases: Option<Arc<dyn LeaseLockService>>,
    rng: SharedRng,
) -> Result<Arc<dyn ConcurrencyStrategy>, DomainError> {
    config.validate()?;
    let backoff = Backoff::new(config.retry_backoff);
    let strategy: Arc<dyn ConcurrencyStrategy> = match config.strategy {
        StrategyKind::Pessimistic => Arc::new(PessimisticStrategy::new(config.lock_timeout)),
        StrategyKind::Optimistic => {
            Arc::new(OptimisticStrategy::new(config.max_retries, backoff, rng))
        }
        StrategyKind::Distributed => {
            let leases = leases.ok_or_else(|| {
                DomainError::InvalidArgument(
                    "distributed strategy requires a lease lock service".into(),
                )
            })?;
            Arc::new(DistributedLockStrategy::new(
                leases,
                config.lease_ttl,
                config.lock_timeout,
                backoff,
                rng,
            ))
        }
    };
    Ok(strategy)
}

/// One load → validate → decrease → store cycle.
///
/// The store is asked to commit against the revision that was loaded, so a
/// concurrent writer surfaces as `DomainError::ConcurrencyConflict`.
pub(crate) async fn decrease_once(
    store: &dyn StockStore,
    stock_id: Uuid,
    amount: i64,
) -> Result<StockRecord, DomainError> {
    let loaded = store.load(stock_id).await?;
    debug!(%stock_id, quantity = loaded.quantity, revision = loaded.revision, "loaded");

    let mut stock = Stock::from_record(&loaded);
    if let Err(e) = stock.decrease(amount) {
        debug!(%stock_id, error = %e, "rejected");
        return Err(e);
    }
    debug!(%stock_id, quantity = stock.quantity(), "validated");

    let updated = stock.to_record();
    store.store(&updated, loaded.revision).await?;
    debug!(%stock_id, revision = updated.revision, "persisted");
    Ok(updated)
}

/// Runs a critical section on its own task.
///
/// Once exclusive access is held the section must finish even if the caller
/// stops waiting, otherwise the lock or lease would be released mid-write.
pub(crate) async fn run_to_completion<F>(section: F) -> Result<StockRecord, DomainError>
where
    F: Future<Output = Result<StockRecord, DomainError>> + Send + 'static,
{
    tokio::spawn(section).await.map_err(|e| {
        DomainError::StorageUnavailable(format!("critical section did not complete: {e}"))
    })?
}

/// A revision conflict while exclusive access was held means the record was
/// written outside the controlled path; callers see it as contention.
pub(crate) fn conflict_as_contention(error: DomainError) -> DomainError {
    match error {
        DomainError::ConcurrencyConflict { stock_id, .. } => DomainError::ContentionExceeded {
            stock_id,
            attempts: 1,
        },
        other => other,
    }
}

/// Exponential backoff with equal jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
}

impl Backoff {
    /// Backoff starting at `base`, doubling per attempt, capped at 250 ms.
    #[must_use]
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            cap: BACKOFF_CAP.max(base),
        }
    }

    /// Lowers or raises the ceiling on a single delay.
    #[must_use]
    pub fn capped(mut self, cap: Duration) -> Self {
        self.cap = cap.max(self.base);
        self
    }

    /// No delay between attempts.
    #[must_use]
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Delay before retry number `attempt` (1-based).
    ///
    /// Half of the exponential step is fixed and the other half is drawn
    /// from `rng`.
    pub fn delay(&self, attempt: u32, rng: &SharedRng) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let step = self.base.saturating_mul(1 << exponent).min(self.cap);
        let half = step / 2;
        let spread = u32::try_from(half.as_micros()).unwrap_or(u32::MAX);
        let jitter = match rng.lock() {
            Ok(mut rng) => rng.next_u32_range(0, spread),
            Err(_) => spread / 2,
        };
        half + Duration::from_micros(u64::from(jitter))
    }
}

/// Waits `delay`, or just yields when there is nothing to wait for.
pub(crate) async fn pause(delay: Duration) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(delay).await;
    }
}
