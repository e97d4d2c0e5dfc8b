//! Trading performance statistics.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use time::{Date, Duration};

use super::position::Position;

/// Per-contract-kind totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KindStats {
    /// Closed trades.
    pub trades: u64,
    /// Realized P&L.
    pub pnl: Decimal,
}

/// Aggregate statistics over closed positions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PerformanceStats {
    /// Closed trades.
    pub total_trades: u64,
    /// Trades with positive P&L.
    pub winning_trades: u64,
    /// Trades with negative P&L.
    pub losing_trades: u64,
    /// Trades that closed flat.
    pub break_even_trades: u64,
    /// Realized P&L over all trades.
    pub total_pnl: Decimal,
    /// Total USD cost of closed trades.
    pub total_invested: Decimal,
    /// Best single trade.
    pub largest_win: Decimal,
    /// Worst single trade, as a negative amount.
    pub largest_loss: Decimal,
    /// Realized P&L for the current UTC day.
    pub daily_pnl: Decimal,
    /// Trades closed in the current UTC day.
    pub daily_trades: u64,
    /// Totals by contract kind.
    pub by_kind: BTreeMap<String, KindStats>,
    #[serde(skip)]
    total_hold_seconds: i64,
    #[serde(skip)]
    day: Option<Date>,
}

impl PerformanceStats {
    /// Create empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a closed position into the statistics. Open positions are ignored.
    pub fn record(&mut self, position: &Position) {
        let (Some(pnl), Some(closed_at)) = (position.realized_pnl, position.closed_at) else {
            return;
        };

        let day = closed_at.date();
        if self.day != Some(day) {
            self.day = Some(day);
            self.daily_pnl = Decimal::ZERO;
            self.daily_trades = 0;
        }

        self.total_trades += 1;
        self.daily_trades += 1;
        self.total_pnl += pnl;
        self.daily_pnl += pnl;
        self.total_invested += position.size;
        self.total_hold_seconds += position.hold_time(closed_at).whole_seconds();

        if pnl > Decimal::ZERO {
            self.winning_trades += 1;
            self.largest_win = self.largest_win.max(pnl);
        } else if pnl < Decimal::ZERO {
            self.losing_trades += 1;
            self.largest_loss = self.largest_loss.min(pnl);
        } else {
            self.break_even_trades += 1;
        }

        let kind = self.by_kind.entry(position.market_kind.clone()).or_default();
        kind.trades += 1;
        kind.pnl += pnl;
    }

    /// Percentage of trades that made money.
    pub fn win_rate(&self) -> Decimal {
        if self.total_trades == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.winning_trades) / Decimal::from(self.total_trades) * Decimal::ONE_HUNDRED
    }

    /// Realized P&L as a percentage of capital deployed.
    pub fn roi_percent(&self) -> Decimal {
        if self.total_invested.is_zero() {
            return Decimal::ZERO;
        }
        self.total_pnl / self.total_invested * Decimal::ONE_HUNDRED
    }

    /// Mean time positions were held.
    pub fn average_hold_time(&self) -> Duration {
        match i64::try_from(self.total_trades) {
            Ok(trades) if trades > 0 => Duration::seconds(self.total_hold_seconds / trades),
            _ => Duration::ZERO,
        }
    }
}
