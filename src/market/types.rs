//! Market-related types for binary crypto prediction markets.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use time::{Duration, OffsetDateTime};

/// Which token of a binary market a trade buys.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Buy the YES (UP) token.
    #[strum(serialize = "buy_yes", serialize = "yes", serialize = "up")]
    BuyYes,
    /// Buy the NO (DOWN) token.
    #[strum(serialize = "buy_no", serialize = "no", serialize = "down")]
    BuyNo,
}

impl Direction {
    /// Get the opposite direction.
    pub fn opposite(&self) -> Self {
        match self {
            Direction::BuyYes => Direction::BuyNo,
            Direction::BuyNo => Direction::BuyYes,
        }
    }

    /// Probability that the held side pays out, given the YES probability.
    pub fn side_probability(&self, yes_probability: Decimal) -> Decimal {
        match self {
            Direction::BuyYes => yes_probability,
            Direction::BuyNo => Decimal::ONE - yes_probability,
        }
    }
}

/// Resolution state of a market. Set once.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Resolution {
    /// Outcome not known yet.
    #[default]
    Unresolved,
    /// YES (UP) won.
    ResolvedYes,
    /// NO (DOWN) won.
    ResolvedNo,
}

impl Resolution {
    /// Whether the market has resolved either way.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Resolution::Unresolved)
    }

    /// The direction that pays out, if resolved.
    pub fn winner(&self) -> Option<Direction> {
        match self {
            Resolution::Unresolved => None,
            Resolution::ResolvedYes => Some(Direction::BuyYes),
            Resolution::ResolvedNo => Some(Direction::BuyNo),
        }
    }
}

/// What a contract pays out on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketKind {
    /// "Will the asset be above `target_price` at period end?"
    PriceTarget {
        /// Strike the asset must finish above.
        target_price: Decimal,
    },
    /// "Will the asset finish the period above where it opened?"
    UpDown {
        /// Asset price captured at period start.
        #[serde(default)]
        reference_price: Option<Decimal>,
    },
}

impl MarketKind {
    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            MarketKind::PriceTarget { .. } => "price_target",
            MarketKind::UpDown { .. } => "updown",
        }
    }
}

/// A monitored binary contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// Unique market identifier (condition id or slug).
    pub id: String,
    /// Underlying asset symbol, e.g. "BTC".
    pub asset: String,
    /// Contract kind with its kind-specific fields.
    #[serde(flatten)]
    pub kind: MarketKind,
    /// When the period opened.
    #[serde(with = "time::serde::rfc3339")]
    pub period_start: OffsetDateTime,
    /// When the period closes.
    #[serde(with = "time::serde::rfc3339")]
    pub period_end: OffsetDateTime,
    /// Resolution state.
    #[serde(default)]
    pub resolution: Resolution,
    /// Market question text.
    #[serde(default)]
    pub question: Option<String>,
}

impl Market {
    /// Full length of the period.
    pub fn period(&self) -> Duration {
        self.period_end - self.period_start
    }

    /// Time left until the period closes, never negative.
    pub fn time_remaining(&self, now: OffsetDateTime) -> Duration {
        let remaining = self.period_end - now;
        if remaining.is_negative() {
            Duration::ZERO
        } else {
            remaining
        }
    }

    /// Time since the period opened, never negative.
    pub fn time_elapsed(&self, now: OffsetDateTime) -> Duration {
        let elapsed = now - self.period_start;
        if elapsed.is_negative() {
            Duration::ZERO
        } else {
            elapsed
        }
    }

    /// Check if the period has ended.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.period_end
    }

    /// Check if the period has started.
    pub fn has_started(&self, now: OffsetDateTime) -> bool {
        now >= self.period_start
    }

    /// Captured reference price of an up/down market.
    pub fn reference_price(&self) -> Option<Decimal> {
        match self.kind {
            MarketKind::UpDown { reference_price } => reference_price,
            MarketKind::PriceTarget { .. } => None,
        }
    }

    /// Whether this is an up/down market.
    pub fn is_updown(&self) -> bool {
        matches!(self.kind, MarketKind::UpDown { .. })
    }

    /// Record the reference price once. Returns false if already set or not
    /// an up/down market.
    pub fn capture_reference(&mut self, price: Decimal) -> bool {
        match &mut self.kind {
            MarketKind::UpDown { reference_price } if reference_price.is_none() => {
                *reference_price = Some(price);
                true
            }
            _ => false,
        }
    }

    /// Format remaining time as "Xm Ys".
    pub fn time_remaining_str(&self, now: OffsetDateTime) -> String {
        if self.is_expired(now) {
            return "CLOSED".to_string();
        }
        crate::utils::format_duration(self.time_remaining(now))
    }
}

/// Quoted prices for both tokens of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Price of the YES token.
    pub yes: Decimal,
    /// Price of the NO token.
    pub no: Decimal,
}

impl Quote {
    /// Build a quote from the YES price, assuming a complementary NO price.
    pub fn from_yes(yes: Decimal) -> Self {
        Self {
            yes,
            no: Decimal::ONE - yes,
        }
    }

    /// Price of the token a direction buys.
    pub fn price_for(&self, direction: Direction) -> Decimal {
        match direction {
            Direction::BuyYes => self.yes,
            Direction::BuyNo => self.no,
        }
    }

    /// Both prices within [0, 1].
    pub fn is_valid(&self) -> bool {
        let unit = Decimal::ZERO..=Decimal::ONE;
        unit.contains(&self.yes) && unit.contains(&self.no)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    fn updown_market() -> Market {
        Market {
            id: "btc-updown-15m-1".to_string(),
            asset: "BTC".to_string(),
            kind: MarketKind::UpDown {
                reference_price: None,
            },
            period_start: datetime!(2025-02-09 13:00 UTC),
            period_end: datetime!(2025-02-09 13:15 UTC),
            resolution: Resolution::Unresolved,
            question: None,
        }
    }

    #[test]
    fn direction_opposite_works() {
        assert_eq!(Direction::BuyYes.opposite(), Direction::BuyNo);
        assert_eq!(Direction::BuyNo.opposite(), Direction::BuyYes);
    }

    #[test]
    fn direction_from_string_works() {
        use std::str::FromStr;
        assert_eq!(Direction::from_str("yes").unwrap(), Direction::BuyYes);
        assert_eq!(Direction::from_str("down").unwrap(), Direction::BuyNo);
        assert_eq!(Direction::BuyYes.to_string(), "buy_yes");
    }

    #[test]
    fn resolution_winner() {
        assert_eq!(Resolution::Unresolved.winner(), None);
        assert_eq!(Resolution::ResolvedYes.winner(), Some(Direction::BuyYes));
        assert_eq!(Resolution::ResolvedNo.winner(), Some(Direction::BuyNo));
    }

    #[test]
    fn time_remaining_saturates_at_zero() {
        let market = updown_market();
        let after = datetime!(2025-02-09 13:20 UTC);
        assert_eq!(market.time_remaining(after), Duration::ZERO);
        assert_eq!(
            market.time_remaining(datetime!(2025-02-09 13:12 UTC)),
            Duration::minutes(3)
        );
        assert_eq!(market.time_remaining_str(after), "CLOSED");
    }

    #[test]
    fn reference_is_captured_once() {
        let mut market = updown_market();
        assert!(market.capture_reference(dec!(103000)));
        assert!(!market.capture_reference(dec!(104000)));
        assert_eq!(market.reference_price(), Some(dec!(103000)));
    }

    #[test]
    fn market_deserializes_flattened_kind() {
        let json = r#"{
            "id": "m1",
            "asset": "BTC",
            "kind": "price_target",
            "target_price": "103000",
            "period_start": "2025-02-09T13:00:00Z",
            "period_end": "2025-02-09T14:00:00Z"
        }"#;
        let market: Market = serde_json::from_str(json).unwrap();
        assert_eq!(
            market.kind,
            MarketKind::PriceTarget {
                target_price: dec!(103000)
            }
        );
        assert_eq!(market.resolution, Resolution::Unresolved);
    }

    #[test]
    fn quote_price_for_direction() {
        let quote = Quote::from_yes(dec!(0.60));
        assert_eq!(quote.price_for(Direction::BuyYes), dec!(0.60));
        assert_eq!(quote.price_for(Direction::BuyNo), dec!(0.40));
        assert!(quote.is_valid());
    }
}
