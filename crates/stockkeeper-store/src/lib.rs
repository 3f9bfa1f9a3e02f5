//! Stock store and lease lock implementations.
//!
//! [`memory`] backs tests and single-process runs. [`pg_stock_store`] and
//! [`pg_lease_lock`] share one PostgreSQL database between service
//! instances.

pub mod memory;
pub mod pg_lease_lock;
pub mod pg_stock_store;

use stockkeeper_core::error::DomainError;

/// Maps a driver error onto the domain.
///
/// A unique violation means the id is taken, a check violation means a
/// negative quantity reached the database; everything else is treated as
/// the store being unreachable.
pub(crate) fn map_sqlx_error(error: sqlx::Error) -> DomainError {
    if let Some(db) = error.as_database_error() {
        if db.is_unique_violation() {
            return DomainError::InvalidArgument(format!("stock already exists: {db}"));
        }
        if db.is_check_violation() {
            return DomainError::InvalidArgument(format!("rejected by database: {db}"));
        }
    }
    DomainError::StorageUnavailable(error.to_string())
}
