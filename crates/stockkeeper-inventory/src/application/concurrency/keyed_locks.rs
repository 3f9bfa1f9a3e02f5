//! Per-stock-id lock table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use stockkeeper_core::error::DomainError;
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;
use uuid::Uuid;

type LockTable = Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>;

/// A table of async mutexes, one per stock id.
///
/// Entries are created on first use and removed as soon as no guard or
/// waiter refers to them, so the table only grows with the number of ids
/// currently under contention. Unrelated ids never share a mutex.
#[derive(Debug, Default, Clone)]
pub struct KeyedLocks {
    table: LockTable,
}

/// Exclusive access to one stock id. Released on drop.
#[derive(Debug)]
pub struct KeyedLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    checkout: Checkout,
}

impl KeyedLockGuard {
    /// The stock id this guard covers.
    #[must_use]
    pub fn stock_id(&self) -> Uuid {
        self.checkout.stock_id
    }
}

impl Drop for KeyedLockGuard {
    fn drop(&mut self) {
        // Unlock before `checkout` drops and reclaims the entry.
        drop(self.guard.take());
    }
}

/// A caller's reference to one table entry, held from checkout until the
/// caller either gets the lock or gives up. Dropping it, including when the
/// waiting future is cancelled, reclaims the entry if nobody else uses it.
#[derive(Debug)]
struct Checkout {
    stock_id: Uuid,
    table: LockTable,
    mutex: Arc<tokio::sync::Mutex<()>>,
}

impl Checkout {
    fn mutex(&self) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(&self.mutex)
    }
}

impl Drop for Checkout {
    fn drop(&mut self) {
        let mut table = lock_table(&self.table);
        // Only the table and this checkout still refer to the mutex.
        if table.get(&self.stock_id).is_some_and(|entry| {
            Arc::ptr_eq(entry, &self.mutex) && Arc::strong_count(entry) == 2
        }) {
            table.remove(&self.stock_id);
        }
    }
}

impl KeyedLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `stock_id`.
    ///
    /// With `timeout` set, gives up after that long. Giving up, timing out
    /// or dropping the returned future all leave the table as if this call
    /// had never been made.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Busy` if the timeout elapses first.
    pub async fn acquire(
        &self,
        stock_id: Uuid,
        timeout: Option<Duration>,
    ) -> Result<KeyedLockGuard, DomainError> {
        let checkout = self.checkout(stock_id);
        let guard = match timeout {
            None => checkout.mutex().lock_owned().await,
            Some(limit) => {
                let started = Instant::now();
                let Ok(guard) = tokio::time::timeout(limit, checkout.mutex().lock_owned()).await
                else {
                    return Err(DomainError::Busy {
                        stock_id,
                        waited: started.elapsed(),
                    });
                };
                guard
            }
        };
        Ok(KeyedLockGuard {
            guard: Some(guard),
            checkout,
        })
    }

    /// Number of ids that currently have a live entry.
    #[must_use]
    pub fn len(&self) -> usize {
        lock_table(&self.table).len()
    }

    /// Whether no id currently has a live entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn checkout(&self, stock_id: Uuid) -> Checkout {
        let mutex = Arc::clone(lock_table(&self.table).entry(stock_id).or_default());
        Checkout {
            stock_id,
            table: Arc::clone(&self.table),
            mutex,
        }
    }
}

// Nothing panics while the table is held, so a poisoned table is still consistent.
fn lock_table(table: &LockTable) -> MutexGuard<'_, HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}
