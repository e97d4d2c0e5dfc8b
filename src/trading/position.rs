//! Position tracking.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};
use time::{Duration, OffsetDateTime};

use crate::market::Direction;
use crate::risk::PositionKey;

/// Process-unique position identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos-{}", self.0)
    }
}

/// Lifecycle status. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PositionStatus {
    /// Held and evaluated every tick.
    Open,
    /// Close requested, waiting for the fill.
    Closing,
    /// Terminal.
    Closed,
}

/// Why a position was closed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExitReason {
    /// The market resolved.
    Resolved,
    /// ROI reached the profit target.
    ProfitTarget,
    /// ROI fell to the stop loss.
    StopLoss,
    /// Held for longer than the time limit.
    TimedOut,
    /// Selling now was worth more than holding.
    #[strum(to_string = "ev_exit", serialize = "smart_exit")]
    EvExit,
}

/// A directional position in one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    /// Identifier.
    pub id: PositionId,
    /// Market held.
    pub market_id: String,
    /// Underlying asset.
    pub asset: String,
    /// Contract kind label.
    pub market_kind: String,
    /// Side held.
    pub direction: Direction,
    /// Fill price per share.
    pub entry_price: Decimal,
    /// USD cost of the position.
    pub size: Decimal,
    /// Shares held.
    pub shares: Decimal,
    /// Model probability of the held side at entry.
    pub entry_probability: Decimal,
    /// Edge at entry in percentage points.
    pub entry_edge_percent: Decimal,
    /// When the entry filled.
    #[serde(with = "time::serde::rfc3339")]
    pub opened_at: OffsetDateTime,
    /// Latest quote of the held side.
    pub mark_price: Decimal,
    /// P&L at the mark price.
    pub unrealized_pnl: Decimal,
    /// P&L locked in at close.
    pub realized_pnl: Option<Decimal>,
    /// Lifecycle status.
    pub status: PositionStatus,
    /// Exit reason, set when closing starts.
    pub exit_reason: Option<ExitReason>,
    /// Price the position closed at.
    pub exit_price: Option<Decimal>,
    /// When the position closed.
    #[serde(with = "time::serde::rfc3339::option")]
    pub closed_at: Option<OffsetDateTime>,
}

/// Entry details for a new position.
#[derive(Debug, Clone)]
pub struct NewPosition {
    /// Market held.
    pub market_id: String,
    /// Underlying asset.
    pub asset: String,
    /// Contract kind label.
    pub market_kind: String,
    /// Side held.
    pub direction: Direction,
    /// Fill price per share.
    pub entry_price: Decimal,
    /// USD cost.
    pub size: Decimal,
    /// Model probability of the held side.
    pub entry_probability: Decimal,
    /// Edge at entry.
    pub entry_edge_percent: Decimal,
    /// Fill time.
    pub opened_at: OffsetDateTime,
}

impl Position {
    /// Create an open position marked at its entry price.
    pub fn open(id: PositionId, entry: NewPosition) -> Self {
        let shares = if entry.entry_price.is_zero() {
            Decimal::ZERO
        } else {
            entry.size / entry.entry_price
        };
        Self {
            id,
            market_id: entry.market_id,
            asset: entry.asset,
            market_kind: entry.market_kind,
            direction: entry.direction,
            entry_price: entry.entry_price,
            size: entry.size,
            shares,
            entry_probability: entry.entry_probability,
            entry_edge_percent: entry.entry_edge_percent,
            opened_at: entry.opened_at,
            mark_price: entry.entry_price,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: None,
            status: PositionStatus::Open,
            exit_reason: None,
            exit_price: None,
            closed_at: None,
        }
    }

    /// Risk slot this position occupies.
    pub fn key(&self) -> PositionKey {
        PositionKey::new(self.market_id.clone(), self.direction)
    }

    /// P&L if the position were valued at `price`: `(price - entry) * size / entry`.
    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        (price - self.entry_price) * self.size / self.entry_price
    }

    /// Refresh the mark price and unrealized P&L.
    pub fn mark(&mut self, price: Decimal) {
        if self.status == PositionStatus::Closed {
            return;
        }
        self.mark_price = price;
        self.unrealized_pnl = self.pnl_at(price);
    }

    /// Return on cost at the mark price, in percent.
    pub fn roi_percent(&self) -> Decimal {
        if self.size.is_zero() {
            return Decimal::ZERO;
        }
        self.unrealized_pnl / self.size * Decimal::ONE_HUNDRED
    }

    /// Time held so far.
    pub fn hold_time(&self, now: OffsetDateTime) -> Duration {
        now - self.opened_at
    }

    /// Whether the position is still evaluated for exits.
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Whether a close has been requested but not confirmed.
    pub fn is_closing(&self) -> bool {
        self.status == PositionStatus::Closing
    }

    /// Move from `Open` to `Closing`. Returns false for any other state.
    pub fn begin_close(&mut self, reason: ExitReason) -> bool {
        if self.status != PositionStatus::Open {
            return false;
        }
        self.status = PositionStatus::Closing;
        self.exit_reason = Some(reason);
        true
    }

    /// Close at `exit_price`. Returns the realized P&L, or `None` if the
    /// position was already closed.
    pub fn close(&mut self, reason: ExitReason, exit_price: Decimal, now: OffsetDateTime) -> Option<Decimal> {
        if self.status == PositionStatus::Closed {
            return None;
        }
        let realized = self.pnl_at(exit_price);
        self.mark_price = exit_price;
        self.unrealized_pnl = Decimal::ZERO;
        self.realized_pnl = Some(realized);
        self.status = PositionStatus::Closed;
        self.exit_reason = Some(reason);
        self.exit_price = Some(exit_price);
        self.closed_at = Some(now);
        Some(realized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    pub(crate) fn position(entry_price: Decimal, size: Decimal) -> Position {
        Position::open(
            PositionId(1),
            NewPosition {
                market_id: "m1".to_string(),
                asset: "BTC".to_string(),
                market_kind: "updown".to_string(),
                direction: Direction::BuyYes,
                entry_price,
                size,
                entry_probability: dec!(0.76),
                entry_edge_percent: dec!(16),
                opened_at: datetime!(2025-02-09 13:12 UTC),
            },
        )
    }

    #[test]
    fn position_calculations() {
        let mut pos = position(dec!(0.50), dec!(50));
        assert_eq!(pos.shares, dec!(100));

        pos.mark(dec!(0.76));
        assert_eq!(pos.unrealized_pnl, dec!(26));
        assert_eq!(pos.roi_percent(), dec!(52));

        pos.mark(dec!(0.40));
        assert_eq!(pos.unrealized_pnl, dec!(-10));
        assert_eq!(pos.roi_percent(), dec!(-20));
    }

    #[test]
    fn resolution_payout_matches_shares() {
        let mut pos = position(dec!(0.60), dec!(60));
        let realized = pos.close(ExitReason::Resolved, dec!(1), datetime!(2025-02-09 13:15 UTC));
        // 100 shares pay $1 each on a $60 cost.
        assert_eq!(realized, Some(dec!(40)));
    }

    #[test]
    fn status_transitions_are_monotonic() {
        let mut pos = position(dec!(0.50), dec!(50));
        let now = datetime!(2025-02-09 13:14 UTC);

        assert!(pos.begin_close(ExitReason::TimedOut));
        assert!(!pos.begin_close(ExitReason::StopLoss));
        assert!(pos.close(ExitReason::TimedOut, dec!(0.55), now).is_some());
        assert!(pos.close(ExitReason::Resolved, dec!(1), now).is_none());
        assert!(!pos.begin_close(ExitReason::StopLoss));
        assert_eq!(pos.status, PositionStatus::Closed);
        assert_eq!(pos.exit_reason, Some(ExitReason::TimedOut));

        pos.mark(dec!(0.9));
        assert_eq!(pos.mark_price, dec!(0.55));
    }

    #[test]
    fn exit_reason_strings() {
        use std::str::FromStr;
        assert_eq!(ExitReason::ProfitTarget.to_string(), "profit_target");
        assert_eq!(ExitReason::from_str("smart_exit").unwrap(), ExitReason::EvExit);
        assert_eq!(PositionId(7).to_string(), "pos-7");
    }

    #[test]
    fn ev_exit_has_one_label() {
        use std::str::FromStr;
        let label: &'static str = ExitReason::EvExit.into();
        assert_eq!(label, "ev_exit");
        assert_eq!(ExitReason::EvExit.to_string(), "ev_exit");
        assert_eq!(serde_json::to_value(ExitReason::EvExit).unwrap(), "ev_exit");
        assert_eq!(ExitReason::from_str("ev_exit").unwrap(), ExitReason::EvExit);
    }
}
