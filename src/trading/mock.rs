//! Scripted order executor for tests and dry runs.
//!
//! Fills at the requested price unless told to fail or to leave closes
//! pending. Every request is recorded for later assertions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;

use super::execution::OrderExecutor;
use super::order::{CloseAck, CloseRequest, Fill, OpenRequest};
use super::position::PositionId;
use crate::error::ExecutionError;

/// Configuration for mock executor behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Whether to fail open requests.
    pub fail_open: bool,
    /// Whether to fail close requests.
    pub fail_close: bool,
    /// Whether closes are acknowledged as pending instead of filled.
    pub pending_closes: bool,
    /// Simulated latency in milliseconds.
    pub latency_ms: u64,
}

#[derive(Debug, Default)]
struct MockState {
    config: MockConfig,
    opens: Vec<OpenRequest>,
    closes: Vec<CloseRequest>,
    pending: HashMap<PositionId, CloseRequest>,
    released: HashMap<PositionId, Decimal>,
}

/// Mock executor for testing.
#[derive(Debug, Clone)]
pub struct MockExecutor {
    state: Arc<Mutex<MockState>>,
    fill_time: OffsetDateTime,
}

impl MockExecutor {
    /// Create a mock executor with default configuration.
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// Create a mock executor with custom configuration.
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                config,
                ..MockState::default()
            })),
            fill_time: OffsetDateTime::UNIX_EPOCH,
        }
    }

    /// Stamp fills with `at` instead of the epoch.
    pub fn with_fill_time(mut self, at: OffsetDateTime) -> Self {
        self.fill_time = at;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Toggle open failures.
    pub fn set_fail_open(&self, fail: bool) {
        self.lock().config.fail_open = fail;
    }

    /// Toggle close failures.
    pub fn set_fail_close(&self, fail: bool) {
        self.lock().config.fail_close = fail;
    }

    /// Toggle pending close acknowledgements.
    pub fn set_pending_closes(&self, pending: bool) {
        self.lock().config.pending_closes = pending;
    }

    /// Let a pending close fill at `price` on its next poll.
    pub fn release_close(&self, position_id: PositionId, price: Decimal) {
        self.lock().released.insert(position_id, price);
    }

    /// Open requests received so far.
    pub fn opens(&self) -> Vec<OpenRequest> {
        self.lock().opens.clone()
    }

    /// Close requests received so far.
    pub fn closes(&self) -> Vec<CloseRequest> {
        self.lock().closes.clone()
    }

    async fn simulate_latency(&self) {
        let latency_ms = self.lock().config.latency_ms;
        if latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(latency_ms)).await;
        }
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderExecutor for MockExecutor {
    async fn open(&self, request: OpenRequest) -> Result<Fill, ExecutionError> {
        self.simulate_latency().await;
        request.validate()?;

        let mut state = self.lock();
        state.opens.push(request.clone());
        if state.config.fail_open {
            return Err(ExecutionError::SubmissionFailed(
                "Mock open failure".to_string(),
            ));
        }
        Ok(Fill {
            price: request.price,
            shares: request.shares(),
            filled_at: self.fill_time,
        })
    }

    async fn close(&self, request: CloseRequest) -> Result<CloseAck, ExecutionError> {
        self.simulate_latency().await;
        request.validate()?;

        let mut state = self.lock();
        state.closes.push(request.clone());
        if state.config.fail_close {
            return Err(ExecutionError::OrderRejected {
                reason: "Mock close failure".to_string(),
            });
        }
        if state.config.pending_closes {
            state.pending.insert(request.position_id, request);
            return Ok(CloseAck::Pending);
        }
        Ok(CloseAck::Filled(Fill {
            price: request.price,
            shares: request.shares,
            filled_at: self.fill_time,
        }))
    }

    async fn poll_close(&self, position_id: PositionId) -> Result<CloseAck, ExecutionError> {
        self.simulate_latency().await;

        let mut state = self.lock();
        let Some(request) = state.pending.get(&position_id).cloned() else {
            return Err(ExecutionError::UnknownPosition(position_id));
        };
        match state.released.remove(&position_id) {
            Some(price) => {
                state.pending.remove(&position_id);
                Ok(CloseAck::Filled(Fill {
                    price,
                    shares: request.shares,
                    filled_at: self.fill_time,
                }))
            }
            None => Ok(CloseAck::Pending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Direction;
    use rust_decimal_macros::dec;

    fn open_request() -> OpenRequest {
        OpenRequest {
            position_id: PositionId(1),
            market_id: "m1".to_string(),
            direction: Direction::BuyYes,
            price: dec!(0.50),
            size: dec!(50),
        }
    }

    fn close_request() -> CloseRequest {
        CloseRequest {
            position_id: PositionId(1),
            market_id: "m1".to_string(),
            direction: Direction::BuyYes,
            shares: dec!(100),
            price: dec!(0.76),
        }
    }

    #[tokio::test]
    async fn mock_records_requests() {
        let executor = MockExecutor::new();
        let fill = executor.open(open_request()).await.unwrap();
        assert_eq!(fill.shares, dec!(100));
        executor.close(close_request()).await.unwrap();

        assert_eq!(executor.opens().len(), 1);
        assert_eq!(executor.closes().len(), 1);
    }

    #[tokio::test]
    async fn mock_failure_modes() {
        let executor = MockExecutor::with_config(MockConfig {
            fail_open: true,
            fail_close: true,
            ..Default::default()
        });
        assert!(executor.open(open_request()).await.is_err());
        assert!(executor.close(close_request()).await.is_err());

        executor.set_fail_open(false);
        assert!(executor.open(open_request()).await.is_ok());
    }

    #[tokio::test]
    async fn mock_pending_close_fills_after_release() {
        let executor = MockExecutor::new();
        executor.set_pending_closes(true);

        assert_eq!(executor.close(close_request()).await.unwrap(), CloseAck::Pending);
        assert_eq!(
            executor.poll_close(PositionId(1)).await.unwrap(),
            CloseAck::Pending
        );

        executor.release_close(PositionId(1), dec!(0.74));
        match executor.poll_close(PositionId(1)).await.unwrap() {
            CloseAck::Filled(fill) => assert_eq!(fill.price, dec!(0.74)),
            CloseAck::Pending => panic!("expected fill"),
        }
        assert!(executor.poll_close(PositionId(1)).await.is_err());
    }
}
