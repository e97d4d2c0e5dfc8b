//! Position sizing.
//!
//! Sizes start from the configured default, grow for strong late setups, and
//! are then capped by the per-position maximum and the remaining exposure
//! headroom reported by the risk manager.

use rust_decimal::Decimal;
use serde::Serialize;
use strum::Display;
use time::Duration;

use crate::config::Config;
use crate::estimator::updown::minutes;

/// What limited a position's size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SizeCap {
    /// Per-position maximum.
    MaxPositionSize,
    /// Remaining total exposure.
    Headroom,
}

/// Result of a sizing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeDecision {
    /// Final size in USD.
    pub size: Decimal,
    /// Size before caps.
    pub requested: Decimal,
    /// Whether the strong-setup multiplier was applied.
    pub strong_setup: bool,
    /// Cap that bound the final size, if any.
    pub capped_by: Option<SizeCap>,
}

/// Converts edge and timing into a USD position size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSizer {
    default_size: Decimal,
    max_size: Decimal,
    min_size: Decimal,
    strong_edge_percent: Decimal,
    strong_minutes: Decimal,
    strong_multiplier: Decimal,
}

impl PositionSizer {
    /// Build a sizer from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_size: config.default_position_size,
            max_size: config.max_position_size,
            min_size: config.min_position_size,
            strong_edge_percent: config.strong_setup_edge_percent,
            strong_minutes: config.strong_setup_minutes,
            strong_multiplier: config.strong_setup_multiplier,
        }
    }

    /// Whether a setup qualifies for the size multiplier.
    pub fn is_strong_setup(&self, edge_percent: Decimal, remaining: Duration) -> bool {
        edge_percent.abs() > self.strong_edge_percent && minutes(remaining) < self.strong_minutes
    }

    /// Size a new position.
    ///
    /// Returns `None` when there is no headroom left or the capped size falls
    /// below the configured minimum.
    pub fn size(
        &self,
        edge_percent: Decimal,
        remaining: Duration,
        headroom: Decimal,
    ) -> Option<SizeDecision> {
        if headroom <= Decimal::ZERO {
            return None;
        }

        let strong_setup = self.is_strong_setup(edge_percent, remaining);
        let requested = if strong_setup {
            self.default_size * self.strong_multiplier
        } else {
            self.default_size
        };

        let mut size = requested;
        let mut capped_by = None;
        if size > self.max_size {
            size = self.max_size;
            capped_by = Some(SizeCap::MaxPositionSize);
        }
        if size > headroom {
            size = headroom;
            capped_by = Some(SizeCap::Headroom);
        }

        let size = size.round_dp(2);
        if size <= Decimal::ZERO || size < self.min_size {
            return None;
        }

        Some(SizeDecision {
            size,
            requested,
            strong_setup,
            capped_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sizer() -> PositionSizer {
        PositionSizer::from_config(&Config::default())
    }

    #[test]
    fn default_size_for_ordinary_setups() {
        let decision = sizer().size(dec!(5), Duration::minutes(4), dec!(1000)).unwrap();
        assert_eq!(decision.size, dec!(50));
        assert!(!decision.strong_setup);
        assert_eq!(decision.capped_by, None);
    }

    #[test]
    fn strong_late_setups_are_scaled_up() {
        let decision = sizer().size(dec!(16), Duration::minutes(2), dec!(1000)).unwrap();
        assert_eq!(decision.size, dec!(60));
        assert!(decision.strong_setup);

        // Strong edge but too early.
        let decision = sizer().size(dec!(16), Duration::minutes(3), dec!(1000)).unwrap();
        assert_eq!(decision.size, dec!(50));
    }

    #[test]
    fn capped_by_max_size_and_headroom() {
        let sizer = PositionSizer {
            max_size: dec!(55),
            ..sizer()
        };
        let decision = sizer.size(dec!(-20), Duration::minutes(1), dec!(1000)).unwrap();
        assert_eq!(decision.size, dec!(55));
        assert_eq!(decision.capped_by, Some(SizeCap::MaxPositionSize));

        let decision = sizer.size(dec!(5), Duration::minutes(4), dec!(30)).unwrap();
        assert_eq!(decision.size, dec!(30));
        assert_eq!(decision.capped_by, Some(SizeCap::Headroom));
    }

    #[test]
    fn no_trade_without_headroom_or_below_minimum() {
        assert!(sizer().size(dec!(5), Duration::minutes(4), dec!(0)).is_none());
        assert!(sizer().size(dec!(5), Duration::minutes(4), dec!(-10)).is_none());
        assert!(sizer().size(dec!(5), Duration::minutes(4), dec!(9.99)).is_none());
    }
}
