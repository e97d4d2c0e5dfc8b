//! Risk module for admission control and position sizing.
//!
//! This module handles:
//! - Exposure, position-count and daily loss limits
//! - The admin pause gate
//! - Converting edge into a position size

pub mod manager;
pub mod sizer;

pub use manager::{Admission, PositionKey, RejectReason, RiskLimits, RiskSnapshot, RiskState};
pub use sizer::{PositionSizer, SizeCap, SizeDecision};
