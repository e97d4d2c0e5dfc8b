//! Trading module for positions and their execution.
//!
//! This module handles:
//! - Position state and P&L
//! - Exit rules and the position lifecycle
//! - Order requests and the execution collaborator
//! - Performance statistics

pub mod execution;
pub mod lifecycle;
pub mod mock;
pub mod order;
pub mod performance;
pub mod position;

pub use execution::{OrderExecutor, PaperExecutor};
pub use lifecycle::{evaluate_exit, ExitAction, ExitRules, LifecycleManager};
pub use mock::{MockConfig, MockExecutor};
pub use order::{CloseAck, CloseRequest, Fill, OpenRequest};
pub use performance::{KindStats, PerformanceStats};
pub use position::{ExitReason, NewPosition, Position, PositionId, PositionStatus};
