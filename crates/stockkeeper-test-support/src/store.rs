//! Test stores: `StockStore` wrappers that inject failures, conflicts and
//! pauses into the decrement cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use stockkeeper_core::error::DomainError;
use stockkeeper_core::store::{StockRecord, StockStore};
use tokio::sync::{Notify, watch};
use uuid::Uuid;

fn unavailable() -> DomainError {
    DomainError::StorageUnavailable("connection refused".into())
}

/// A store whose writes fail with `StorageUnavailable`.
///
/// Built with [`FailingStockStore::new`] every call fails. Built with
/// [`FailingStockStore::on_store`] loads and inserts reach the wrapped store
/// and only the conditional write fails.
pub struct FailingStockStore {
    inner: Option<Arc<dyn StockStore>>,
}

impl FailingStockStore {
    /// A store that fails every call.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: None }
    }

    /// A store that reads through `inner` but fails every `store` call.
    #[must_use]
    pub fn on_store(inner: Arc<dyn StockStore>) -> Self {
        Self { inner: Some(inner) }
    }
}

impl Default for FailingStockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StockStore for FailingStockStore {
    async fn load(&self, stock_id: Uuid) -> Result<StockRecord, DomainError> {
        match &self.inner {
            Some(inner) => inner.load(stock_id).await,
            None => Err(unavailable()),
        }
    }

    async fn store(
        &self,
        _record: &StockRecord,
        _expected_revision: i64,
    ) -> Result<(), DomainError> {
        Err(unavailable())
    }

    async fn insert(&self, record: &StockRecord) -> Result<(), DomainError> {
        match &self.inner {
            Some(inner) => inner.insert(record).await,
            None => Err(unavailable()),
        }
    }
}

/// A store that reports a revision conflict on the first `n` writes (or on
/// every write) as if another writer had just committed.
pub struct ConflictingStockStore {
    inner: Arc<dyn StockStore>,
    conflicts: Option<u32>,
    store_attempts: AtomicU32,
}

impl ConflictingStockStore {
    /// Every write conflicts.
    #[must_use]
    pub fn always(inner: Arc<dyn StockStore>) -> Self {
        Self {
            inner,
            conflicts: None,
            store_attempts: AtomicU32::new(0),
        }
    }

    /// The first `n` writes conflict, later ones reach `inner`.
    #[must_use]
    pub fn first(n: u32, inner: Arc<dyn StockStore>) -> Self {
        Self {
            inner,
            conflicts: Some(n),
            store_attempts: AtomicU32::new(0),
        }
    }

    /// Number of `store` calls seen so far.
    pub fn store_attempts(&self) -> u32 {
        self.store_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StockStore for ConflictingStockStore {
    async fn load(&self, stock_id: Uuid) -> Result<StockRecord, DomainError> {
        self.inner.load(stock_id).await
    }

    async fn store(&self, record: &StockRecord, expected_revision: i64) -> Result<(), DomainError> {
        let attempt = self.store_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.conflicts.is_none_or(|n| attempt <= n) {
            return Err(DomainError::ConcurrencyConflict {
                stock_id: record.stock_id,
                expected: expected_revision,
                actual: expected_revision + 1,
            });
        }
        self.inner.store(record, expected_revision).await
    }

    async fn insert(&self, record: &StockRecord) -> Result<(), DomainError> {
        self.inner.insert(record).await
    }
}

/// Where a [`GatedStockStore`] parks its callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GatePoint {
    Load,
    Store,
}

/// A store that parks callers until the gate is opened, so a test can hold
/// a caller inside its critical section.
///
/// Built with [`GatedStockStore::new`] callers park in `load`. Built with
/// [`GatedStockStore::on_store`] loads go through and callers park in the
/// conditional write, after they have read the record.
pub struct GatedStockStore {
    inner: Arc<dyn StockStore>,
    point: GatePoint,
    entered: Notify,
    gate: watch::Sender<bool>,
}

impl GatedStockStore {
    /// Wrap `inner` with a closed gate in front of `load`.
    #[must_use]
    pub fn new(inner: Arc<dyn StockStore>) -> Self {
        Self::gated_at(inner, GatePoint::Load)
    }

    /// Wrap `inner` with a closed gate in front of `store`.
    #[must_use]
    pub fn on_store(inner: Arc<dyn StockStore>) -> Self {
        Self::gated_at(inner, GatePoint::Store)
    }

    fn gated_at(inner: Arc<dyn StockStore>, point: GatePoint) -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            inner,
            point,
            entered: Notify::new(),
            gate,
        }
    }

    /// Resolves once some caller is parked at the gate.
    pub async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    /// Let every parked and future caller through.
    pub fn open(&self) {
        self.gate.send_replace(true);
    }

    async fn pass(&self, point: GatePoint) -> Result<(), DomainError> {
        if point != self.point {
            return Ok(());
        }
        let mut gate = self.gate.subscribe();
        self.entered.notify_one();
        if gate.wait_for(|open| *open).await.is_ok() {
            Ok(())
        } else {
            Err(unavailable())
        }
    }
}

#[async_trait]
impl StockStore for GatedStockStore {
    async fn load(&self, stock_id: Uuid) -> Result<StockRecord, DomainError> {
        self.pass(GatePoint::Load).await?;
        self.inner.load(stock_id).await
    }

    async fn store(&self, record: &StockRecord, expected_revision: i64) -> Result<(), DomainError> {
        self.pass(GatePoint::Store).await?;
        self.inner.store(record, expected_revision).await
    }

    async fn insert(&self, record: &StockRecord) -> Result<(), DomainError> {
        self.inner.insert(record).await
    }
}
