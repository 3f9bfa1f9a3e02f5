//! Counter store abstraction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DomainError;

/// Persisted representation of a stock counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRecord {
    /// Unique stock identifier.
    pub stock_id: Uuid,
    /// The product this counter tracks.
    pub product_id: Uuid,
    /// Units on hand. Never negative once committed.
    pub quantity: i64,
    /// Incremented by one on every successful store.
    pub revision: i64,
}

impl StockRecord {
    /// Checks that this record is the next revision after
    /// `expected_revision`, as every committed write must be.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `revision` is anything other
    /// than `expected_revision + 1`.
    pub fn ensure_successor_of(&self, expected_revision: i64) -> Result<(), DomainError> {
        if expected_revision.checked_add(1) == Some(self.revision) {
            Ok(())
        } else {
            Err(DomainError::InvalidArgument(format!(
                "revision must advance by one from {expected_revision}, got {}",
                self.revision
            )))
        }
    }
}

/// Store trait for loading and persisting stock counters.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Load the latest committed state of a stock record.
    ///
    /// Returns `DomainError::StockNotFound` if no record exists for the id.
    async fn load(&self, stock_id: Uuid) -> Result<StockRecord, DomainError>;

    /// Persist `record` only if the stored revision still equals
    /// `expected_revision`. `record.revision` must be `expected_revision + 1`;
    /// anything else is `DomainError::InvalidArgument`.
    ///
    /// Returns `DomainError::ConcurrencyConflict` without mutating anything
    /// when the revision has moved, and `DomainError::StockNotFound` when the
    /// record has disappeared.
    async fn store(&self, record: &StockRecord, expected_revision: i64)
    -> Result<(), DomainError>;

    /// Insert a brand-new record. Rejects an id that already exists.
    async fn insert(&self, record: &StockRecord) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_revision(revision: i64) -> StockRecord {
        StockRecord {
            stock_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity: 1,
            revision,
        }
    }

    #[test]
    fn test_next_revision_is_accepted() {
        assert!(at_revision(1).ensure_successor_of(0).is_ok());
        assert!(at_revision(42).ensure_successor_of(41).is_ok());
    }

    #[test]
    fn test_unchanged_or_skipped_revision_is_rejected() {
        for (revision, expected) in [(0, 0), (3, 1), (0, 1), (i64::MAX, i64::MAX)] {
            let result = at_revision(revision).ensure_successor_of(expected);
            assert!(
                matches!(result, Err(DomainError::InvalidArgument(_))),
                "{revision} after {expected}"
            );
        }
    }
}
