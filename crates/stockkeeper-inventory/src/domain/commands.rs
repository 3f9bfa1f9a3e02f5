//! Commands for the stock context.

use stockkeeper_core::command::Command;
use uuid::Uuid;

/// Command to register a new stock counter.
#[derive(Debug, Clone)]
pub struct CreateStock {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The identifier the new record will carry.
    pub stock_id: Uuid,
    /// The product the counter tracks.
    pub product_id: Uuid,
    /// Initial quantity. Must not be negative.
    pub quantity: i64,
}

/// Command to take `amount` units out of a stock counter.
#[derive(Debug, Clone)]
pub struct DecreaseStock {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The stock identifier.
    pub stock_id: Uuid,
    /// Units to remove. Must not be negative.
    pub amount: i64,
}

impl Command for CreateStock {
    fn command_type(&self) -> &'static str {
        "stock.create"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn stock_id(&self) -> Uuid {
        self.stock_id
    }
}

impl Command for DecreaseStock {
    fn command_type(&self) -> &'static str {
        "stock.decrease"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn stock_id(&self) -> Uuid {
        self.stock_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_report_type_and_target() {
        let stock_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let create = CreateStock {
            correlation_id,
            stock_id,
            product_id: Uuid::new_v4(),
            quantity: 1,
        };
        let decrease = DecreaseStock {
            correlation_id,
            stock_id,
            amount: 1,
        };

        assert_eq!(create.command_type(), "stock.create");
        assert_eq!(decrease.command_type(), "stock.decrease");
        assert_eq!(create.stock_id(), decrease.stock_id());
        assert_eq!(decrease.correlation_id(), correlation_id);
    }
}
