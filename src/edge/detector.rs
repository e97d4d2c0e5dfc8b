//! Opportunity detection.

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use super::calculator::{compute_edge, Opportunity};
use crate::config::Config;
use crate::estimator::{Estimate, ModelConfig};
use crate::market::{Market, MarketKind, Quote};
use crate::risk::PositionSizer;

/// Turns estimates and quotes into sized opportunities.
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    min_edge_percent: Decimal,
    monitored_assets: Vec<String>,
    monitor_price_target: bool,
    monitor_updown: bool,
    model: ModelConfig,
    sizer: PositionSizer,
}

impl EdgeDetector {
    /// Build a detector from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_edge_percent: config.min_edge_percent,
            monitored_assets: config
                .monitored_assets
                .iter()
                .map(|asset| asset.trim().to_uppercase())
                .collect(),
            monitor_price_target: config.monitor_price_target,
            monitor_updown: config.monitor_updown,
            model: ModelConfig::from_config(config),
            sizer: PositionSizer::from_config(config),
        }
    }

    /// Probability model parameters.
    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    /// Minimum actionable edge in percentage points.
    pub fn min_edge_percent(&self) -> Decimal {
        self.min_edge_percent
    }

    /// Whether the monitoring toggles include this market.
    pub fn is_monitored(&self, market: &Market) -> bool {
        let kind_enabled = match market.kind {
            MarketKind::PriceTarget { .. } => self.monitor_price_target,
            MarketKind::UpDown { .. } => self.monitor_updown,
        };
        kind_enabled
            && self
                .monitored_assets
                .iter()
                .any(|asset| asset.eq_ignore_ascii_case(&market.asset))
    }

    /// Check one market for an actionable, sized opportunity.
    ///
    /// `None` is the common case: edge below threshold, outside the up/down
    /// window, or no exposure headroom left.
    #[instrument(skip(self, market, estimate, quote), fields(market = %market.id))]
    pub fn check(
        &self,
        market: &Market,
        estimate: &Estimate,
        quote: &Quote,
        now: OffsetDateTime,
        headroom: Decimal,
    ) -> Option<Opportunity> {
        if !self.model.is_actionable(market, now) {
            debug!(remaining = %market.time_remaining_str(now), "Outside trading window");
            return None;
        }

        let signal = compute_edge(estimate.probability, quote);
        if signal.magnitude() < self.min_edge_percent
            || signal.side_edge_percent < self.min_edge_percent
            || signal.side_edge_percent <= Decimal::ZERO
        {
            debug!(
                probability = %estimate.probability,
                yes = %quote.yes,
                edge_percent = %signal.edge_percent,
                threshold = %self.min_edge_percent,
                "No edge"
            );
            return None;
        }

        let remaining = market.time_remaining(now);
        let Some(sizing) = self.sizer.size(signal.edge_percent, remaining, headroom) else {
            debug!(headroom = %headroom, "No size available");
            return None;
        };

        let opportunity = Opportunity {
            market_id: market.id.clone(),
            asset: market.asset.clone(),
            kind: market.kind.label(),
            probability: estimate.probability,
            side_probability: signal.direction.side_probability(estimate.probability),
            quoted_price: signal.price,
            edge_percent: signal.edge_percent,
            direction: signal.direction,
            size: sizing.size,
            confidence: estimate.confidence,
            seconds_remaining: remaining.whole_seconds(),
            breakdown: estimate.breakdown.clone(),
            detected_at: now,
        };

        info!(
            direction = %opportunity.direction,
            probability = %opportunity.probability,
            price = %opportunity.quoted_price,
            edge_percent = %opportunity.edge_percent,
            size = %opportunity.size,
            strong_setup = sizing.strong_setup,
            "Opportunity detected"
        );

        Some(opportunity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{estimate, Breakdown};
    use crate::market::{Direction, PriceFeed, PriceSample, Resolution};
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    fn test_market() -> Market {
        Market {
            id: "btc-updown-15m-1".to_string(),
            asset: "BTC".to_string(),
            kind: MarketKind::UpDown {
                reference_price: Some(dec!(103000)),
            },
            period_start: datetime!(2025-02-09 13:00 UTC),
            period_end: datetime!(2025-02-09 13:15 UTC),
            resolution: Resolution::Unresolved,
            question: None,
        }
    }

    fn scenario_estimate(now: OffsetDateTime) -> Estimate {
        let mut feed = PriceFeed::new(16);
        feed.ingest(&PriceSample::new("BTC", dec!(103500), now));
        estimate(&test_market(), &feed, now, &ModelConfig::default()).unwrap()
    }

    #[test]
    fn scenario_is_actionable_buy_yes() {
        let detector = EdgeDetector::from_config(&Config::default());
        let now = datetime!(2025-02-09 13:12 UTC);
        let estimate = scenario_estimate(now);

        let opp = detector
            .check(&test_market(), &estimate, &Quote::from_yes(dec!(0.60)), now, dec!(1000))
            .unwrap();

        assert_eq!(opp.probability, dec!(0.76));
        assert_eq!(opp.edge_percent, dec!(16));
        assert_eq!(opp.direction, Direction::BuyYes);
        assert_eq!(opp.quoted_price, dec!(0.60));
        // 16 points is a strong setup but 3 minutes is not under the 3 minute cutoff.
        assert_eq!(opp.size, dec!(50));
    }

    #[test]
    fn below_threshold_is_absent_and_stable() {
        let detector = EdgeDetector::from_config(&Config::default());
        let now = datetime!(2025-02-09 13:12 UTC);
        let estimate = scenario_estimate(now);
        let quote = Quote::from_yes(dec!(0.74));

        for _ in 0..3 {
            assert!(detector
                .check(&test_market(), &estimate, &quote, now, dec!(1000))
                .is_none());
        }
    }

    #[test]
    fn updown_outside_window_is_not_actionable() {
        let detector = EdgeDetector::from_config(&Config::default());
        let now = datetime!(2025-02-09 13:05 UTC);
        let estimate = Estimate {
            probability: dec!(0.9),
            confidence: dec!(0.9),
            breakdown: Breakdown::PriceTarget {
                current_price: dec!(1),
                target_price: dec!(1),
                z_score: dec!(0),
                minutes_remaining: dec!(10),
            },
        };

        assert!(detector
            .check(&test_market(), &estimate, &Quote::from_yes(dec!(0.5)), now, dec!(1000))
            .is_none());
    }

    #[test]
    fn no_headroom_means_no_opportunity() {
        let detector = EdgeDetector::from_config(&Config::default());
        let now = datetime!(2025-02-09 13:12 UTC);
        let estimate = scenario_estimate(now);

        assert!(detector
            .check(&test_market(), &estimate, &Quote::from_yes(dec!(0.60)), now, dec!(0))
            .is_none());
    }

    #[test]
    fn monitoring_toggles_filter_markets() {
        let config = Config {
            monitored_assets: vec!["ETH".to_string()],
            ..Config::default()
        };
        assert!(!EdgeDetector::from_config(&config).is_monitored(&test_market()));

        let config = Config {
            monitor_updown: false,
            ..Config::default()
        };
        assert!(!EdgeDetector::from_config(&config).is_monitored(&test_market()));

        assert!(EdgeDetector::from_config(&Config::default()).is_monitored(&test_market()));
    }
}
