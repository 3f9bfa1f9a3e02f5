//! Query handlers for the stock context.
//!
//! Reads go straight to the store and never take a lock or lease.

use serde::Serialize;
use stockkeeper_core::error::DomainError;
use stockkeeper_core::store::StockStore;
use uuid::Uuid;

/// Read-only view of a stock counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockView {
    /// The stock identifier.
    pub stock_id: Uuid,
    /// The product the counter tracks.
    pub product_id: Uuid,
    /// Units on hand.
    pub quantity: i64,
    /// Number of committed writes since creation.
    pub revision: i64,
}

/// Retrieves the latest committed state of a stock counter.
///
/// # Errors
///
/// Returns `DomainError::StockNotFound` if no record exists for the id and
/// `DomainError::StorageUnavailable` if the store cannot be reached.
pub async fn get_stock_by_id(
    stock_id: Uuid,
    store: &dyn StockStore,
) -> Result<StockView, DomainError> {
    let record = store.load(stock_id).await?;
    Ok(StockView {
        stock_id: record.stock_id,
        product_id: record.product_id,
        quantity: record.quantity,
        revision: record.revision,
    })
}
