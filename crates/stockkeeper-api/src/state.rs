//! Shared application state.

use std::sync::{Arc, Mutex};

use sqlx::PgPool;
use stockkeeper_core::clock::SystemClock;
use stockkeeper_core::config::ConcurrencyConfig;
use stockkeeper_core::error::DomainError;
use stockkeeper_core::lock::LeaseLockService;
use stockkeeper_core::rng::StdDeterministicRng;
use stockkeeper_core::store::StockStore;
use stockkeeper_inventory::application::concurrency::{
    ConcurrencyStrategy, SharedRng, build_strategy,
};
use stockkeeper_store::memory::{InMemoryLeaseLockService, InMemoryStockStore};
use stockkeeper_store::pg_lease_lock::PgLeaseLockService;
use stockkeeper_store::pg_stock_store::PgStockStore;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Stock store every request reads and writes through.
    pub store: Arc<dyn StockStore>,
    /// Concurrency strategy guarding decrements.
    pub strategy: Arc<dyn ConcurrencyStrategy>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(store: Arc<dyn StockStore>, strategy: Arc<dyn ConcurrencyStrategy>) -> Self {
        Self { store, strategy }
    }

    /// State backed by PostgreSQL. The lease table lives in the same
    /// database, so several server processes can share it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `config` is invalid.
    pub fn postgres(pool: PgPool, config: &ConcurrencyConfig) -> Result<Self, DomainError> {
        let leases: Arc<dyn LeaseLockService> = Arc::new(PgLeaseLockService::new(pool.clone()));
        let strategy = build_strategy(config, Some(leases), os_rng())?;
        Ok(Self::new(Arc::new(PgStockStore::new(pool)), strategy))
    }

    /// State backed by the in-process store and lease table.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `config` is invalid.
    pub fn in_memory(config: &ConcurrencyConfig) -> Result<Self, DomainError> {
        let leases: Arc<dyn LeaseLockService> =
            Arc::new(InMemoryLeaseLockService::new(Arc::new(SystemClock)));
        let strategy = build_strategy(config, Some(leases), os_rng())?;
        Ok(Self::new(Arc::new(InMemoryStockStore::new()), strategy))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

fn os_rng() -> SharedRng {
    Arc::new(Mutex::new(StdDeterministicRng::from_os_rng()))
}
