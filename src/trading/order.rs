//! Order requests and acknowledgements exchanged with the executor.

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;

use super::position::PositionId;
use crate::error::ExecutionError;
use crate::market::Direction;

/// Request to open a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenRequest {
    /// Identifier the position will carry once filled.
    pub position_id: PositionId,
    /// Market to trade.
    pub market_id: String,
    /// Side to buy.
    pub direction: Direction,
    /// Limit price per share.
    pub price: Decimal,
    /// USD amount to spend.
    pub size: Decimal,
}

impl OpenRequest {
    /// Shares bought if filled at the limit price.
    pub fn shares(&self) -> Decimal {
        if self.price.is_zero() {
            Decimal::ZERO
        } else {
            self.size / self.price
        }
    }

    /// Validate order parameters.
    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.market_id.is_empty() {
            return Err(ExecutionError::InvalidParams("market_id is required".to_string()));
        }
        if self.price <= Decimal::ZERO || self.price >= Decimal::ONE {
            return Err(ExecutionError::InvalidParams(
                "price must be in (0, 1)".to_string(),
            ));
        }
        if self.size <= Decimal::ZERO {
            return Err(ExecutionError::InvalidParams("size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Request to sell a held position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseRequest {
    /// Position to close.
    pub position_id: PositionId,
    /// Market held.
    pub market_id: String,
    /// Side held.
    pub direction: Direction,
    /// Shares to sell.
    pub shares: Decimal,
    /// Expected price per share.
    pub price: Decimal,
}

impl CloseRequest {
    /// Validate order parameters.
    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.shares <= Decimal::ZERO {
            return Err(ExecutionError::InvalidParams("shares must be positive".to_string()));
        }
        if self.price < Decimal::ZERO || self.price > Decimal::ONE {
            return Err(ExecutionError::InvalidParams(
                "price must be in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Fill {
    /// Average fill price per share.
    pub price: Decimal,
    /// Shares traded.
    pub shares: Decimal,
    /// Execution time.
    #[serde(with = "time::serde::rfc3339")]
    pub filled_at: OffsetDateTime,
}

/// Executor response to a close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CloseAck {
    /// The sale executed.
    Filled(Fill),
    /// Accepted but not yet executed; poll again later.
    Pending,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open(price: Decimal, size: Decimal) -> OpenRequest {
        OpenRequest {
            position_id: PositionId(1),
            market_id: "m1".to_string(),
            direction: Direction::BuyYes,
            price,
            size,
        }
    }

    #[test]
    fn open_request_validation() {
        assert!(open(dec!(0.60), dec!(50)).validate().is_ok());
        assert!(open(dec!(0), dec!(50)).validate().is_err());
        assert!(open(dec!(1), dec!(50)).validate().is_err());
        assert!(open(dec!(0.60), dec!(-1)).validate().is_err());

        let mut no_market = open(dec!(0.60), dec!(50));
        no_market.market_id.clear();
        assert!(matches!(
            no_market.validate(),
            Err(ExecutionError::InvalidParams(_))
        ));
    }

    #[test]
    fn open_request_shares() {
        assert_eq!(open(dec!(0.50), dec!(50)).shares(), dec!(100));
    }

    #[test]
    fn close_request_validation() {
        let close = CloseRequest {
            position_id: PositionId(1),
            market_id: "m1".to_string(),
            direction: Direction::BuyNo,
            shares: dec!(100),
            price: dec!(0.76),
        };
        assert!(close.validate().is_ok());
        assert!(CloseRequest {
            shares: dec!(0),
            ..close.clone()
        }
        .validate()
        .is_err());
        assert!(CloseRequest {
            price: dec!(1.2),
            ..close
        }
        .validate()
        .is_err());
    }
}
