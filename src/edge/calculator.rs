//! Edge calculations for directional opportunities.

use rust_decimal::{Decimal, MathematicalOps};
use serde::Serialize;
use time::OffsetDateTime;

use crate::estimator::Breakdown;
use crate::market::{Direction, Quote};

/// Edge of a probability against a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeSignal {
    /// Signed edge in percentage points; positive favours YES.
    pub edge_percent: Decimal,
    /// Side with the larger edge.
    pub direction: Direction,
    /// Edge of the chosen side in percentage points. Not positive when
    /// neither side is underpriced.
    pub side_edge_percent: Decimal,
    /// Quoted price of the chosen side.
    pub price: Decimal,
}

impl EdgeSignal {
    /// Absolute edge in percentage points.
    pub fn magnitude(&self) -> Decimal {
        self.edge_percent.abs()
    }
}

/// Compare a YES probability with the quote for both tokens.
///
/// With complementary quotes the signed edge is exactly `(p - q_yes) * 100`.
pub fn compute_edge(probability: Decimal, quote: &Quote) -> EdgeSignal {
    let yes_edge = probability - quote.yes;
    let no_edge = (Decimal::ONE - probability) - quote.no;

    if yes_edge >= no_edge {
        EdgeSignal {
            edge_percent: yes_edge * Decimal::ONE_HUNDRED,
            direction: Direction::BuyYes,
            side_edge_percent: yes_edge * Decimal::ONE_HUNDRED,
            price: quote.yes,
        }
    } else {
        EdgeSignal {
            edge_percent: -no_edge * Decimal::ONE_HUNDRED,
            direction: Direction::BuyNo,
            side_edge_percent: no_edge * Decimal::ONE_HUNDRED,
            price: quote.no,
        }
    }
}

/// Detected mispricing, valid for the tick that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    /// Market being traded.
    pub market_id: String,
    /// Underlying asset.
    pub asset: String,
    /// Contract kind label.
    pub kind: &'static str,
    /// Estimated YES probability.
    pub probability: Decimal,
    /// Estimated probability of the side to buy.
    pub side_probability: Decimal,
    /// Quoted price of the side to buy.
    pub quoted_price: Decimal,
    /// Signed edge in percentage points.
    pub edge_percent: Decimal,
    /// Side to buy.
    pub direction: Direction,
    /// Recommended size in USD.
    pub size: Decimal,
    /// Estimator confidence.
    pub confidence: Decimal,
    /// Seconds left in the market period.
    pub seconds_remaining: i64,
    /// Estimator factor breakdown.
    pub breakdown: Breakdown,
    /// When the opportunity was detected.
    #[serde(with = "time::serde::rfc3339")]
    pub detected_at: OffsetDateTime,
}

impl Opportunity {
    /// Ranking score: `|edge| * confidence * ln(size + 1)`.
    pub fn score(&self) -> Decimal {
        let size_factor = (self.size + Decimal::ONE)
            .checked_ln()
            .unwrap_or(Decimal::ZERO);
        self.edge_percent.abs() * self.confidence * size_factor
    }

    /// Expected profit in USD if held to resolution.
    pub fn expected_profit(&self) -> Decimal {
        if self.quoted_price.is_zero() {
            return Decimal::ZERO;
        }
        self.size * (self.side_probability - self.quoted_price) / self.quoted_price
    }

    /// Shares bought at the quoted price.
    pub fn shares(&self) -> Decimal {
        if self.quoted_price.is_zero() {
            Decimal::ZERO
        } else {
            self.size / self.quoted_price
        }
    }
}

/// Sort opportunities best first.
pub fn rank(opportunities: &mut [Opportunity]) {
    opportunities.sort_by(|a, b| {
        b.score()
            .cmp(&a.score())
            .then_with(|| a.market_id.cmp(&b.market_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    fn opportunity(market_id: &str, edge: Decimal, confidence: Decimal, size: Decimal) -> Opportunity {
        Opportunity {
            market_id: market_id.to_string(),
            asset: "BTC".to_string(),
            kind: "updown",
            probability: dec!(0.76),
            side_probability: dec!(0.76),
            quoted_price: dec!(0.60),
            edge_percent: edge,
            direction: Direction::BuyYes,
            size,
            confidence,
            seconds_remaining: 180,
            breakdown: Breakdown::PriceTarget {
                current_price: dec!(1),
                target_price: dec!(1),
                z_score: dec!(0),
                minutes_remaining: dec!(3),
            },
            detected_at: datetime!(2025-02-09 13:12 UTC),
        }
    }

    #[test]
    fn sixteen_point_edge_buys_yes() {
        let signal = compute_edge(dec!(0.76), &Quote::from_yes(dec!(0.60)));
        assert_eq!(signal.edge_percent, dec!(16));
        assert_eq!(signal.side_edge_percent, dec!(16));
        assert_eq!(signal.direction, Direction::BuyYes);
        assert_eq!(signal.price, dec!(0.60));
    }

    #[test]
    fn overpriced_yes_buys_no() {
        let signal = compute_edge(dec!(0.24), &Quote::from_yes(dec!(0.40)));
        assert_eq!(signal.edge_percent, dec!(-16));
        assert_eq!(signal.direction, Direction::BuyNo);
        assert_eq!(signal.price, dec!(0.60));
        assert_eq!(signal.magnitude(), dec!(16));
    }

    #[test]
    fn overround_quote_has_no_positive_side() {
        let quote = Quote {
            yes: dec!(0.55),
            no: dec!(0.55),
        };
        let signal = compute_edge(dec!(0.5), &quote);
        assert!(signal.side_edge_percent <= dec!(0));
    }

    #[test]
    fn expected_profit_uses_shares() {
        let opp = opportunity("m1", dec!(16), dec!(0.8), dec!(60));
        assert_eq!(opp.shares(), dec!(100));
        assert_eq!(opp.expected_profit(), dec!(16));
    }

    #[test]
    fn ranking_prefers_higher_scores() {
        let mut opportunities = vec![
            opportunity("small", dec!(5), dec!(0.7), dec!(50)),
            opportunity("big", dec!(16), dec!(0.8), dec!(60)),
            opportunity("mid", dec!(-10), dec!(0.9), dec!(50)),
        ];
        rank(&mut opportunities);
        let order: Vec<_> = opportunities.iter().map(|o| o.market_id.as_str()).collect();
        assert_eq!(order, vec!["big", "mid", "small"]);
    }
}
