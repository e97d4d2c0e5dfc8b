//! Probability-edge trading core for Polymarket crypto markets.
//!
//! For each monitored binary contract the engine estimates the probability
//! of the YES outcome from the underlying asset's price, compares it with
//! the quoted price, and opens a position when the difference ("edge")
//! clears a threshold. Open positions are re-marked every tick and closed
//! when one of the exit rules fires.
//!
//! # Example
//!
//! ```text
//! Reference (period open):  $103,000
//! Current BTC price:        $103,500   (+0.49%)
//! Time remaining:           3m 0s
//! ─────────────────────────────────────
//! Model probability (UP):   0.76
//! Quoted YES price:         0.60
//! Edge:                     +16 pp  → BUY YES
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`clock`]: Injectable time source
//! - [`market`]: Market model, price feed and catalog
//! - [`estimator`]: Probability models
//! - [`edge`]: Edge calculation and opportunity detection
//! - [`risk`]: Admission control and position sizing
//! - [`trading`]: Positions, exits and order execution
//! - [`engine`]: Tick-driven scheduler
//! - [`replay`]: Recorded event replay
//! - [`api`]: HTTP API for health, control and metrics
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod clock;
pub mod config;
pub mod edge;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod market;
pub mod metrics;
pub mod replay;
pub mod risk;
pub mod trading;
pub mod utils;

pub use config::Config;
pub use engine::Engine;
pub use error::{BotError, Result};
