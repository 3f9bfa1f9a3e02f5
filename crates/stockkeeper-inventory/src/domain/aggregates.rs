//! Aggregate roots for the stock context.

use stockkeeper_core::error::DomainError;
use stockkeeper_core::store::StockRecord;
use uuid::Uuid;

/// The aggregate root for a stock counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stock {
    /// Aggregate identifier.
    pub id: Uuid,
    /// The product this counter tracks.
    product_id: Uuid,
    /// Units on hand.
    quantity: i64,
    /// Current revision (successful stores so far).
    revision: i64,
}

impl Stock {
    /// Creates a new stock counter at revision 0.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `quantity` is negative.
    pub fn create(id: Uuid, product_id: Uuid, quantity: i64) -> Result<Self, DomainError> {
        if quantity < 0 {
            return Err(DomainError::InvalidArgument(format!(
                "initial quantity must not be negative, got {quantity}"
            )));
        }
        Ok(Self {
            id,
            product_id,
            quantity,
            revision: 0,
        })
    }

    /// Reconstitutes the aggregate from its persisted record.
    #[must_use]
    pub fn from_record(record: &StockRecord) -> Self {
        Self {
            id: record.stock_id,
            product_id: record.product_id,
            quantity: record.quantity,
            revision: record.revision,
        }
    }

    /// Returns the persisted representation of the current state.
    #[must_use]
    pub fn to_record(&self) -> StockRecord {
        StockRecord {
            stock_id: self.id,
            product_id: self.product_id,
            quantity: self.quantity,
            revision: self.revision,
        }
    }

    /// Returns the product identifier.
    #[must_use]
    pub fn product_id(&self) -> Uuid {
        self.product_id
    }

    /// Returns the units on hand.
    #[must_use]
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    /// Returns the current revision.
    #[must_use]
    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// Removes `amount` units and advances the revision by one.
    ///
    /// The aggregate is left untouched when the decrease is rejected.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `amount` is negative and
    /// `DomainError::InsufficientStock` if fewer than `amount` units remain.
    pub fn decrease(&mut self, amount: i64) -> Result<(), DomainError> {
        if amount < 0 {
            return Err(DomainError::InvalidArgument(format!(
                "decrease amount must not be negative, got {amount}"
            )));
        }
        let remaining = self
            .quantity
            .checked_sub(amount)
            .filter(|remaining| *remaining >= 0)
            .ok_or(DomainError::InsufficientStock {
                stock_id: self.id,
                requested: amount,
                available: self.quantity,
            })?;

        self.quantity = remaining;
        self.revision += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock_with(quantity: i64) -> Stock {
        Stock::create(Uuid::new_v4(), Uuid::new_v4(), quantity).unwrap()
    }

    #[test]
    fn test_create_starts_at_revision_zero() {
        // Arrange
        let stock_id = Uuid::new_v4();
        let product_id = Uuid::new_v4();

        // Act
        let stock = Stock::create(stock_id, product_id, 100).unwrap();

        // Assert
        assert_eq!(stock.id, stock_id);
        assert_eq!(stock.product_id(), product_id);
        assert_eq!(stock.quantity(), 100);
        assert_eq!(stock.revision(), 0);
    }

    #[test]
    fn test_create_rejects_negative_quantity() {
        let result = Stock::create(Uuid::new_v4(), Uuid::new_v4(), -1);

        match result {
            Err(DomainError::InvalidArgument(msg)) => assert!(msg.contains("-1")),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_decrease_subtracts_and_bumps_revision() {
        // Arrange
        let mut stock = stock_with(100);

        // Act
        stock.decrease(1).unwrap();

        // Assert
        assert_eq!(stock.quantity(), 99);
        assert_eq!(stock.revision(), 1);
    }

    #[test]
    fn test_decrease_to_exactly_zero_is_allowed() {
        let mut stock = stock_with(5);

        stock.decrease(5).unwrap();

        assert_eq!(stock.quantity(), 0);
        assert_eq!(stock.revision(), 1);
    }

    #[test]
    fn test_decrease_by_zero_still_advances_revision() {
        let mut stock = stock_with(5);

        stock.decrease(0).unwrap();

        assert_eq!(stock.quantity(), 5);
        assert_eq!(stock.revision(), 1);
    }

    #[test]
    fn test_decrease_beyond_quantity_is_rejected_without_change() {
        // Arrange
        let mut stock = stock_with(5);
        let before = stock.clone();

        // Act
        let result = stock.decrease(10);

        // Assert
        match result {
            Err(DomainError::InsufficientStock {
                stock_id,
                requested,
                available,
            }) => {
                assert_eq!(stock_id, stock.id);
                assert_eq!(requested, 10);
                assert_eq!(available, 5);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(stock, before);
    }

    #[test]
    fn test_decrease_rejects_negative_amount_without_change() {
        let mut stock = stock_with(5);
        let before = stock.clone();

        let result = stock.decrease(-3);

        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
        assert_eq!(stock, before);
    }

    #[test]
    fn test_decrease_by_max_amount_is_rejected() {
        let mut stock = stock_with(0);

        let result = stock.decrease(i64::MAX);

        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));
    }

    #[test]
    fn test_record_round_trip_preserves_state() {
        let mut stock = stock_with(42);
        stock.decrease(2).unwrap();

        let record = stock.to_record();
        let restored = Stock::from_record(&record);

        assert_eq!(record.quantity, 40);
        assert_eq!(record.revision, 1);
        assert_eq!(restored, stock);
    }
}
