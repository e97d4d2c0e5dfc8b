//! Order execution collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::order::{CloseAck, CloseRequest, Fill, OpenRequest};
use super::position::PositionId;
use crate::clock::Clock;
use crate::error::ExecutionError;

/// Venue-facing order execution.
///
/// Implementations must be cheap to share; the engine calls them without
/// holding its state lock.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    /// Buy into a new position.
    async fn open(&self, request: OpenRequest) -> Result<Fill, ExecutionError>;

    /// Sell a held position.
    async fn close(&self, request: CloseRequest) -> Result<CloseAck, ExecutionError>;

    /// Check on a close that was previously acknowledged as pending.
    async fn poll_close(&self, position_id: PositionId) -> Result<CloseAck, ExecutionError>;
}

/// Paper trading executor. Every order fills immediately at its limit price.
#[derive(Clone)]
pub struct PaperExecutor {
    clock: Arc<dyn Clock>,
}

impl PaperExecutor {
    /// Create a paper executor stamping fills with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl OrderExecutor for PaperExecutor {
    #[instrument(skip(self, request), fields(position = %request.position_id, market = %request.market_id))]
    async fn open(&self, request: OpenRequest) -> Result<Fill, ExecutionError> {
        request.validate()?;
        debug!(price = %request.price, size = %request.size, "Paper open filled");
        Ok(Fill {
            price: request.price,
            shares: request.shares(),
            filled_at: self.clock.now(),
        })
    }

    #[instrument(skip(self, request), fields(position = %request.position_id, market = %request.market_id))]
    async fn close(&self, request: CloseRequest) -> Result<CloseAck, ExecutionError> {
        request.validate()?;
        debug!(price = %request.price, shares = %request.shares, "Paper close filled");
        Ok(CloseAck::Filled(Fill {
            price: request.price,
            shares: request.shares,
            filled_at: self.clock.now(),
        }))
    }

    async fn poll_close(&self, position_id: PositionId) -> Result<CloseAck, ExecutionError> {
        // Paper closes never stay pending.
        Err(ExecutionError::UnknownPosition(position_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::market::Direction;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    fn executor() -> PaperExecutor {
        PaperExecutor::new(Arc::new(ManualClock::new(datetime!(2025-02-09 13:12 UTC))))
    }

    #[tokio::test]
    async fn paper_open_fills_at_limit() {
        let fill = executor()
            .open(OpenRequest {
                position_id: PositionId(1),
                market_id: "m1".to_string(),
                direction: Direction::BuyYes,
                price: dec!(0.60),
                size: dec!(60),
            })
            .await
            .unwrap();

        assert_eq!(fill.price, dec!(0.60));
        assert_eq!(fill.shares, dec!(100));
        assert_eq!(fill.filled_at, datetime!(2025-02-09 13:12 UTC));
    }

    #[tokio::test]
    async fn paper_rejects_invalid_orders() {
        let result = executor()
            .open(OpenRequest {
                position_id: PositionId(1),
                market_id: "m1".to_string(),
                direction: Direction::BuyYes,
                price: dec!(0),
                size: dec!(60),
            })
            .await;
        assert!(matches!(result, Err(ExecutionError::InvalidParams(_))));
    }

    #[tokio::test]
    async fn paper_close_is_immediate() {
        let ack = executor()
            .close(CloseRequest {
                position_id: PositionId(3),
                market_id: "m1".to_string(),
                direction: Direction::BuyNo,
                shares: dec!(100),
                price: dec!(0.76),
            })
            .await
            .unwrap();
        assert!(matches!(ack, CloseAck::Filled(fill) if fill.price == dec!(0.76)));

        assert_eq!(
            executor().poll_close(PositionId(3)).await,
            Err(ExecutionError::UnknownPosition(PositionId(3)))
        );
    }

    #[test]
    fn paper_close_validates_shares() {
        let executor = executor();
        let request = CloseRequest {
            position_id: PositionId(4),
            market_id: "m1".to_string(),
            direction: Direction::BuyYes,
            shares: dec!(0),
            price: dec!(0.50),
        };
        tokio_test::assert_err!(tokio_test::block_on(executor.close(request.clone())));

        let valid = CloseRequest {
            shares: dec!(10),
            ..request
        };
        tokio_test::assert_ok!(tokio_test::block_on(executor.close(valid)));
    }
}
