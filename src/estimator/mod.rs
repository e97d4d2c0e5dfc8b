//! Probability estimator for binary crypto markets.
//!
//! This module handles:
//! - Price-target markets (distance to strike over remaining volatility)
//! - Up/down markets (momentum, time boost and persistence factors)
//! - The trading-window policy for up/down markets

pub mod price_target;
pub mod updown;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::config::Config;
use crate::error::EstimateError;
use crate::market::{Direction, Market, MarketKind, PriceFeed};

pub use updown::{MomentumTable, PersistenceRule, TimeBoostCurve};

/// Parameters of the probability model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelConfig {
    /// Momentum step table.
    pub momentum: MomentumTable,
    /// Time-remaining boost curve.
    pub time_boost: TimeBoostCurve,
    /// Persistence rule.
    pub persistence: PersistenceRule,
    /// Hard cap on up/down probabilities.
    pub ceiling: Decimal,
    /// Per-minute volatility for price-target markets.
    pub price_target_volatility: Decimal,
    /// Up/down window length in minutes.
    pub updown_window_minutes: Decimal,
    /// Up/down window as a fraction of the period.
    pub updown_window_fraction: Decimal,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ModelConfig {
    /// Build the model parameters from application configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            momentum: MomentumTable::default(),
            time_boost: TimeBoostCurve::default(),
            persistence: PersistenceRule {
                bonus: config.persistence_bonus,
                threshold: config.persistence_threshold,
                min_samples: config.persistence_min_samples,
            },
            ceiling: config.probability_ceiling,
            price_target_volatility: config.price_target_volatility,
            updown_window_minutes: config.updown_window_minutes,
            updown_window_fraction: config.updown_window_fraction,
        }
    }

    /// Length of the up/down trading window for a period.
    pub fn updown_window(&self, period: Duration) -> Duration {
        let by_fraction = updown::minutes(period) * self.updown_window_fraction;
        let window_minutes = self.updown_window_minutes.min(by_fraction);
        let millis = (window_minutes * Decimal::from(60_000)).trunc();
        Duration::milliseconds(millis.to_i64().unwrap_or(i64::MAX))
    }

    /// Whether an estimate for `market` may be acted on at `now`.
    ///
    /// Price-target markets are always actionable before expiry; up/down
    /// markets only inside the final window.
    pub fn is_actionable(&self, market: &Market, now: OffsetDateTime) -> bool {
        if market.is_expired(now) || (market.is_updown() && !market.has_started(now)) {
            return false;
        }
        match market.kind {
            MarketKind::PriceTarget { .. } => true,
            MarketKind::UpDown { .. } => {
                market.time_remaining(now) <= self.updown_window(market.period())
            }
        }
    }
}

/// Factor breakdown behind an estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Breakdown {
    /// Price-target inputs.
    PriceTarget {
        /// Current asset price.
        current_price: Decimal,
        /// Strike.
        target_price: Decimal,
        /// Standardized distance to the strike.
        z_score: Decimal,
        /// Minutes left in the period.
        minutes_remaining: Decimal,
    },
    /// Up/down factors.
    UpDown {
        /// Current asset price.
        current_price: Decimal,
        /// Captured reference price.
        reference_price: Decimal,
        /// Absolute move from the reference in percent.
        move_percent: Decimal,
        /// Side the price is on, `BuyYes` for up.
        direction: Direction,
        /// Momentum base probability.
        base: Decimal,
        /// Time-remaining boost.
        time_boost: Decimal,
        /// Persistence bonus.
        persistence: Decimal,
        /// Whether the ceiling cut the sum.
        capped: bool,
    },
}

/// Model output for one market at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    /// Probability of the YES / UP outcome.
    pub probability: Decimal,
    /// Heuristic confidence in the estimate, in [0, 1].
    pub confidence: Decimal,
    /// Factor breakdown for observability.
    pub breakdown: Breakdown,
}

/// Estimate the YES probability for `market` from the latest feed state.
pub fn estimate(
    market: &Market,
    feed: &PriceFeed,
    now: OffsetDateTime,
    config: &ModelConfig,
) -> Result<Estimate, EstimateError> {
    if market.period_end <= market.period_start {
        return Err(EstimateError::InvalidPeriod {
            market_id: market.id.clone(),
        });
    }

    let current = feed
        .latest_price(&market.asset)
        .ok_or_else(|| EstimateError::NoPrice {
            asset: market.asset.clone(),
        })?;
    if current <= Decimal::ZERO {
        return Err(EstimateError::NonPositivePrice {
            asset: market.asset.clone(),
            price: current,
        });
    }

    let remaining = market.time_remaining(now);
    match market.kind {
        MarketKind::PriceTarget { target_price } => {
            estimate_price_target(market, current, target_price, remaining, config)
        }
        MarketKind::UpDown { reference_price } => {
            let reference = reference_price.ok_or_else(|| EstimateError::ReferenceNotCaptured {
                market_id: market.id.clone(),
            })?;
            if reference <= Decimal::ZERO {
                return Err(EstimateError::NonPositivePrice {
                    asset: market.asset.clone(),
                    price: reference,
                });
            }
            Ok(estimate_updown(market, feed, current, reference, remaining, config))
        }
    }
}

fn estimate_price_target(
    market: &Market,
    current: Decimal,
    target: Decimal,
    remaining: Duration,
    config: &ModelConfig,
) -> Result<Estimate, EstimateError> {
    let sigma = config.price_target_volatility;
    let invalid = || EstimateError::NonPositivePrice {
        asset: market.asset.clone(),
        price: target,
    };
    let z_score = price_target::z_score(current, target, remaining, sigma).ok_or_else(invalid)?;
    let probability =
        price_target::probability_above(current, target, remaining, sigma).ok_or_else(invalid)?;

    Ok(Estimate {
        probability,
        confidence: price_target::confidence(current, target),
        breakdown: Breakdown::PriceTarget {
            current_price: current,
            target_price: target,
            z_score,
            minutes_remaining: updown::minutes(remaining),
        },
    })
}

fn estimate_updown(
    market: &Market,
    feed: &PriceFeed,
    current: Decimal,
    reference: Decimal,
    remaining: Duration,
    config: &ModelConfig,
) -> Estimate {
    let move_percent = updown::move_percent(reference, current);
    let going_up = current >= reference;
    let direction = if going_up {
        Direction::BuyYes
    } else {
        Direction::BuyNo
    };

    if current == reference {
        return Estimate {
            probability: Decimal::new(5, 1),
            confidence: updown::confidence(move_percent, remaining),
            breakdown: Breakdown::UpDown {
                current_price: current,
                reference_price: reference,
                move_percent,
                direction,
                base: Decimal::new(5, 1),
                time_boost: Decimal::ZERO,
                persistence: Decimal::ZERO,
                capped: false,
            },
        };
    }

    let base = updown::momentum_base(&config.momentum, move_percent);
    let time_boost = updown::time_boost(&config.time_boost, remaining);
    let persistence = updown::persistence_bonus(
        &config.persistence,
        feed.window(&market.asset),
        market.period_start,
        reference,
        going_up,
    );
    let directional = updown::combine(base, time_boost, persistence, config.ceiling);

    Estimate {
        probability: direction.side_probability(directional),
        confidence: updown::confidence(move_percent, remaining),
        breakdown: Breakdown::UpDown {
            current_price: current,
            reference_price: reference,
            move_percent,
            direction,
            base,
            time_boost,
            persistence,
            capped: directional < base + time_boost + persistence,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{PriceSample, Resolution};
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    fn updown_market(reference: Option<Decimal>) -> Market {
        Market {
            id: "btc-updown-15m-1".to_string(),
            asset: "BTC".to_string(),
            kind: MarketKind::UpDown {
                reference_price: reference,
            },
            period_start: datetime!(2025-02-09 13:00 UTC),
            period_end: datetime!(2025-02-09 13:15 UTC),
            resolution: Resolution::Unresolved,
            question: None,
        }
    }

    fn feed_with(price: Decimal, at: OffsetDateTime) -> PriceFeed {
        let mut feed = PriceFeed::new(64);
        feed.ingest(&PriceSample::new("BTC", price, at));
        feed
    }

    #[test]
    fn updown_scenario_gives_76_percent() {
        let market = updown_market(Some(dec!(103000)));
        let now = datetime!(2025-02-09 13:12 UTC);
        let feed = feed_with(dec!(103500), now);

        let estimate = estimate(&market, &feed, now, &ModelConfig::default()).unwrap();

        assert_eq!(estimate.probability, dec!(0.76));
        match estimate.breakdown {
            Breakdown::UpDown {
                base,
                time_boost,
                persistence,
                direction,
                ..
            } => {
                assert_eq!(base, dec!(0.68));
                assert_eq!(time_boost, dec!(0.08));
                assert_eq!(persistence, dec!(0));
                assert_eq!(direction, Direction::BuyYes);
            }
            other => panic!("unexpected breakdown {other:?}"),
        }
    }

    #[test]
    fn down_move_mirrors_probability() {
        let market = updown_market(Some(dec!(103000)));
        let now = datetime!(2025-02-09 13:12 UTC);
        let feed = feed_with(dec!(102500), now);

        let estimate = estimate(&market, &feed, now, &ModelConfig::default()).unwrap();

        assert_eq!(estimate.probability, dec!(0.24));
    }

    #[test]
    fn flat_price_is_a_coin_flip() {
        let market = updown_market(Some(dec!(103000)));
        let now = datetime!(2025-02-09 13:14 UTC);
        let feed = feed_with(dec!(103000), now);

        let estimate = estimate(&market, &feed, now, &ModelConfig::default()).unwrap();

        assert_eq!(estimate.probability, dec!(0.5));
    }

    #[test]
    fn huge_move_is_capped_at_ceiling() {
        let market = updown_market(Some(dec!(100000)));
        let now = datetime!(2025-02-09 13:14:59 UTC);
        let mut feed = PriceFeed::new(64);
        for second in 0..60 {
            feed.ingest(&PriceSample::new(
                "BTC",
                dec!(110000),
                datetime!(2025-02-09 13:10 UTC) + Duration::seconds(second),
            ));
        }

        let estimate = estimate(&market, &feed, now, &ModelConfig::default()).unwrap();

        assert_eq!(estimate.probability, dec!(0.96));
        assert!(matches!(estimate.breakdown, Breakdown::UpDown { capped: true, .. }));
    }

    #[test]
    fn missing_inputs_are_input_errors() {
        let now = datetime!(2025-02-09 13:12 UTC);
        let feed = feed_with(dec!(103500), now);

        let uncaptured = updown_market(None);
        assert_eq!(
            estimate(&uncaptured, &feed, now, &ModelConfig::default()),
            Err(EstimateError::ReferenceNotCaptured {
                market_id: uncaptured.id.clone()
            })
        );

        let mut other_asset = updown_market(Some(dec!(3000)));
        other_asset.asset = "ETH".to_string();
        assert!(matches!(
            estimate(&other_asset, &feed, now, &ModelConfig::default()),
            Err(EstimateError::NoPrice { .. })
        ));

        let mut inverted = updown_market(Some(dec!(103000)));
        inverted.period_end = inverted.period_start;
        assert!(matches!(
            estimate(&inverted, &feed, now, &ModelConfig::default()),
            Err(EstimateError::InvalidPeriod { .. })
        ));
    }

    #[test]
    fn expired_market_is_a_boundary_not_an_error() {
        let market = updown_market(Some(dec!(103000)));
        let now = datetime!(2025-02-09 13:20 UTC);
        let feed = feed_with(dec!(103500), now);

        let estimate = estimate(&market, &feed, now, &ModelConfig::default()).unwrap();

        assert_eq!(estimate.probability, dec!(0.80));
    }

    #[test]
    fn updown_window_policy() {
        let config = ModelConfig::default();
        let market = updown_market(Some(dec!(103000)));

        assert!(!config.is_actionable(&market, datetime!(2025-02-09 13:05 UTC)));
        assert!(config.is_actionable(&market, datetime!(2025-02-09 13:10 UTC)));
        assert!(config.is_actionable(&market, datetime!(2025-02-09 13:14 UTC)));
        assert!(!config.is_actionable(&market, datetime!(2025-02-09 13:15 UTC)));

        let narrow = ModelConfig {
            updown_window_fraction: dec!(0.1),
            ..ModelConfig::default()
        };
        // 10% of 15 minutes is 90 seconds.
        assert_eq!(narrow.updown_window(market.period()), Duration::seconds(90));
        assert!(!narrow.is_actionable(&market, datetime!(2025-02-09 13:13 UTC)));
    }

    #[test]
    fn price_target_estimate_uses_strike() {
        let market = Market {
            id: "btc-above-103k".to_string(),
            asset: "BTC".to_string(),
            kind: MarketKind::PriceTarget {
                target_price: dec!(103000),
            },
            period_start: datetime!(2025-02-09 12:00 UTC),
            period_end: datetime!(2025-02-09 14:00 UTC),
            resolution: Resolution::Unresolved,
            question: None,
        };
        let now = datetime!(2025-02-09 13:30 UTC);
        let feed = feed_with(dec!(104000), now);

        let estimate = estimate(&market, &feed, now, &ModelConfig::default()).unwrap();

        assert!(estimate.probability > dec!(0.5));
        assert_eq!(estimate.confidence, dec!(0.9));
        assert!(ModelConfig::default().is_actionable(&market, now));
    }
}
