//! Edge module for detecting directional mispricings.
//!
//! This module handles:
//! - Edge calculations against quoted prices
//! - Opportunity detection with the trading-window policy
//! - Ranking of opportunities within a tick

pub mod calculator;
pub mod detector;

pub use calculator::{compute_edge, rank, EdgeSignal, Opportunity};
pub use detector::EdgeDetector;
