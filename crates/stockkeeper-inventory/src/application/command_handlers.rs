//! Command handlers for the stock context.
//!
//! Creation goes straight to the store. Decrements are delegated to the
//! configured concurrency strategy, which owns the load, validate, store
//! cycle.

use std::sync::Arc;

use stockkeeper_core::command::Command;
use stockkeeper_core::error::DomainError;
use stockkeeper_core::store::{StockRecord, StockStore};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::application::concurrency::ConcurrencyStrategy;
use crate::domain::aggregates::Stock;
use crate::domain::commands::{CreateStock, DecreaseStock};

/// Result of a successfully handled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockCommandResult {
    /// The stock record affected by the command.
    pub stock_id: Uuid,
    /// Units on hand after the command committed.
    pub quantity: i64,
    /// Revision after the command committed.
    pub revision: i64,
}

impl From<StockRecord> for StockCommandResult {
    fn from(record: StockRecord) -> Self {
        Self {
            stock_id: record.stock_id,
            quantity: record.quantity,
            revision: record.revision,
        }
    }
}

/// Handles the `CreateStock` command: validates the initial quantity and
/// inserts a record at revision 0.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` for a negative quantity or an id
/// that already exists, and `DomainError::StorageUnavailable` if the store
/// cannot be reached.
#[instrument(
    skip(store),
    fields(command = command.command_type(), correlation_id = %command.correlation_id)
)]
pub async fn handle_create_stock(
    command: &CreateStock,
    store: &dyn StockStore,
) -> Result<StockCommandResult, DomainError> {
    let stock = Stock::create(command.stock_id, command.product_id, command.quantity)?;
    let record = stock.to_record();
    store.insert(&record).await?;
    debug!(stock_id = %record.stock_id, quantity = record.quantity, "stock created");
    Ok(record.into())
}

/// Handles the `DecreaseStock` command through `strategy`.
///
/// # Errors
///
/// Returns whatever the strategy reports: `StockNotFound`,
/// `InvalidArgument`, `InsufficientStock`, `Busy`, `ContentionExceeded` or
/// `StorageUnavailable`. The stored record is unchanged on every error.
#[instrument(
    skip(strategy, store),
    fields(
        command = command.command_type(),
        correlation_id = %command.correlation_id,
        strategy = %strategy.kind()
    )
)]
pub async fn handle_decrease_stock(
    command: &DecreaseStock,
    strategy: &dyn ConcurrencyStrategy,
    store: &Arc<dyn StockStore>,
) -> Result<StockCommandResult, DomainError> {
    let record = strategy
        .decrease(Arc::clone(store), command.stock_id, command.amount)
        .await?;
    Ok(record.into())
}
