//! In-process store and lease lock backed by mutex-guarded maps.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use stockkeeper_core::clock::Clock;
use stockkeeper_core::error::DomainError;
use stockkeeper_core::lock::{Lease, LeaseLockService};
use stockkeeper_core::store::{StockRecord, StockStore};
use tracing::debug;
use uuid::Uuid;

// No code path panics while a map is locked, so a poisoned map is intact.
fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stock records held in memory. The revision check and the write happen
/// under one lock, so `store` is atomic.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    records: Mutex<HashMap<Uuid, StockRecord>>,
}

impl InMemoryStockStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn load(&self, stock_id: Uuid) -> Result<StockRecord, DomainError> {
        locked(&self.records)
            .get(&stock_id)
            .cloned()
            .ok_or(DomainError::StockNotFound(stock_id))
    }

    async fn store(&self, record: &StockRecord, expected_revision: i64) -> Result<(), DomainError> {
        record.ensure_successor_of(expected_revision)?;
        let mut records = locked(&self.records);
        let current = records
            .get_mut(&record.stock_id)
            .ok_or(DomainError::StockNotFound(record.stock_id))?;
        if current.revision != expected_revision {
            return Err(DomainError::ConcurrencyConflict {
                stock_id: record.stock_id,
                expected: expected_revision,
                actual: current.revision,
            });
        }
        if record.quantity < 0 {
            return Err(DomainError::InvalidArgument(format!(
                "quantity must not be negative, got {}",
                record.quantity
            )));
        }
        *current = record.clone();
        Ok(())
    }

    async fn insert(&self, record: &StockRecord) -> Result<(), DomainError> {
        let mut records = locked(&self.records);
        if records.contains_key(&record.stock_id) {
            return Err(DomainError::InvalidArgument(format!(
                "stock already exists: {}",
                record.stock_id
            )));
        }
        records.insert(record.stock_id, record.clone());
        Ok(())
    }
}

/// Lease table held in memory, with expiry read from an injected clock.
///
/// Shared between several strategy instances it stands in for an external
/// lock service.
pub struct InMemoryLeaseLockService {
    clock: Arc<dyn Clock>,
    leases: Mutex<HashMap<Uuid, Lease>>,
}

impl InMemoryLeaseLockService {
    /// Creates an empty lease table reading time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            leases: Mutex::new(HashMap::new()),
        }
    }

    /// Number of leases currently on record, lapsed or not.
    #[must_use]
    pub fn held(&self) -> usize {
        locked(&self.leases).len()
    }
}

impl fmt::Debug for InMemoryLeaseLockService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryLeaseLockService")
            .field("held", &self.held())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LeaseLockService for InMemoryLeaseLockService {
    async fn try_acquire(
        &self,
        stock_id: Uuid,
        owner: Uuid,
        ttl: Duration,
    ) -> Result<Option<Lease>, DomainError> {
        let now = self.clock.now();
        let mut leases = locked(&self.leases);
        if let Some(current) = leases.get(&stock_id) {
            if current.owner != owner && !current.is_expired_at(now) {
                return Ok(None);
            }
            if current.owner != owner {
                debug!(%stock_id, previous = %current.owner, %owner, "taking over lapsed lease");
            }
        }
        let lease = Lease {
            stock_id,
            owner,
            expires_at: self.clock.deadline_after(ttl),
        };
        leases.insert(stock_id, lease.clone());
        Ok(Some(lease))
    }

    async fn release(&self, lease: &Lease) -> Result<bool, DomainError> {
        let mut leases = locked(&self.leases);
        match leases.get(&lease.stock_id) {
            Some(current) if current.owner == lease.owner => {
                leases.remove(&lease.stock_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
