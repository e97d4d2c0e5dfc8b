//! Position lifecycle management.
//!
//! Every tick each open position is re-marked from the latest quote of the
//! side it holds and checked against the exit rules in priority order:
//! resolution, profit target, stop loss, time limit, then the expected-value
//! exit. Closed positions are archived and folded into the performance
//! statistics in the same call that returns their exposure to the risk
//! state.

use std::collections::{BTreeMap, VecDeque};

use rust_decimal::Decimal;
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use super::order::CloseRequest;
use super::performance::PerformanceStats;
use super::position::{ExitReason, NewPosition, Position, PositionId};
use crate::config::Config;
use crate::estimator::{self, ModelConfig};
use crate::market::{MarketCatalog, PriceFeed, Resolution};
use crate::risk::{Admission, RiskState};

/// Closed positions kept for reporting.
const MAX_ARCHIVED: usize = 1000;

/// Exit thresholds. A zero threshold disables its rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExitRules {
    /// ROI in percent that takes profit.
    pub profit_target_percent: Decimal,
    /// Loss in percent of cost that stops out.
    pub stop_loss_percent: Decimal,
    /// Maximum hold time in minutes.
    pub time_limit_minutes: u64,
    /// Whether the expected-value exit is active.
    pub smart_exit_enabled: bool,
    /// Per-share amount the mark must exceed the hold value by.
    pub smart_exit_margin: Decimal,
}

impl ExitRules {
    /// Extract the exit rules from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            profit_target_percent: config.profit_target_percent,
            stop_loss_percent: config.stop_loss_percent,
            time_limit_minutes: config.time_limit_minutes,
            smart_exit_enabled: config.smart_exit_enabled,
            smart_exit_margin: config.smart_exit_margin,
        }
    }

    fn time_limit(&self) -> Option<Duration> {
        if self.time_limit_minutes == 0 {
            return None;
        }
        i64::try_from(self.time_limit_minutes)
            .ok()?
            .checked_mul(60)
            .map(Duration::seconds)
    }
}

/// Decide whether `position` should exit now. First matching rule wins.
///
/// `hold_probability` is the model probability that the held side pays out;
/// the expected-value exit is skipped when it is unavailable.
pub fn evaluate_exit(
    position: &Position,
    rules: &ExitRules,
    resolution: Resolution,
    hold_probability: Option<Decimal>,
    now: OffsetDateTime,
) -> Option<ExitReason> {
    if resolution.is_resolved() {
        return Some(ExitReason::Resolved);
    }

    let roi = position.roi_percent();
    if rules.profit_target_percent > Decimal::ZERO && roi >= rules.profit_target_percent {
        return Some(ExitReason::ProfitTarget);
    }
    if rules.stop_loss_percent > Decimal::ZERO && roi <= -rules.stop_loss_percent {
        return Some(ExitReason::StopLoss);
    }
    if let Some(limit) = rules.time_limit() {
        if position.hold_time(now) >= limit {
            return Some(ExitReason::TimedOut);
        }
    }
    if rules.smart_exit_enabled {
        if let Some(hold) = hold_probability {
            if position.mark_price - hold > rules.smart_exit_margin {
                return Some(ExitReason::EvExit);
            }
        }
    }
    None
}

/// What the engine has to do about a position this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitAction {
    /// The market resolved; close at the payout without an order.
    Settle {
        /// Position to settle.
        position_id: PositionId,
        /// 1 if the held side won, else 0.
        payout: Decimal,
    },
    /// Sell through the executor.
    Sell {
        /// Rule that fired.
        reason: ExitReason,
        /// Order to send.
        request: CloseRequest,
    },
    /// Check on a close left pending by the executor.
    Poll {
        /// Position being closed.
        position_id: PositionId,
    },
}

/// Owns open positions, the closed archive and performance statistics.
#[derive(Debug, Clone)]
pub struct LifecycleManager {
    rules: ExitRules,
    positions: BTreeMap<PositionId, Position>,
    closed: VecDeque<Position>,
    stats: PerformanceStats,
    next_id: u64,
}

impl LifecycleManager {
    /// Create an empty manager.
    pub fn new(rules: ExitRules) -> Self {
        Self {
            rules,
            positions: BTreeMap::new(),
            closed: VecDeque::new(),
            stats: PerformanceStats::new(),
            next_id: 1,
        }
    }

    /// Exit rules in force.
    pub fn rules(&self) -> &ExitRules {
        &self.rules
    }

    /// Reserve an identifier for a position about to be opened.
    pub fn allocate_id(&mut self) -> PositionId {
        let id = PositionId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Record a filled entry and confirm its admission.
    pub fn open(
        &mut self,
        risk: &mut RiskState,
        admission: Admission,
        id: PositionId,
        entry: NewPosition,
    ) -> &Position {
        risk.commit(admission);
        let position = Position::open(id, entry);
        info!(
            position = %position.id,
            market = %position.market_id,
            direction = %position.direction,
            entry_price = %position.entry_price,
            size = %position.size,
            "Position opened"
        );
        self.positions.entry(id).or_insert(position)
    }

    /// Re-mark open and closing positions from the latest quotes.
    pub fn refresh_marks(&mut self, catalog: &MarketCatalog) {
        for position in self.positions.values_mut() {
            if let Some(quote) = catalog.quote(&position.market_id) {
                position.mark(quote.price_for(position.direction));
            }
        }
    }

    /// Work out the exit actions for this tick without changing anything.
    pub fn evaluate(
        &self,
        catalog: &MarketCatalog,
        feed: &PriceFeed,
        model: &ModelConfig,
        now: OffsetDateTime,
    ) -> Vec<ExitAction> {
        let mut actions = Vec::new();

        for position in self.positions.values() {
            let Some(market) = catalog.get(&position.market_id) else {
                warn!(position = %position.id, market = %position.market_id, "Market missing for position");
                continue;
            };

            if let Some(winner) = market.resolution.winner() {
                let payout = if winner == position.direction {
                    Decimal::ONE
                } else {
                    Decimal::ZERO
                };
                actions.push(ExitAction::Settle {
                    position_id: position.id,
                    payout,
                });
                continue;
            }

            if position.is_closing() {
                actions.push(ExitAction::Poll {
                    position_id: position.id,
                });
                continue;
            }

            let hold_probability = match estimator::estimate(market, feed, now, model) {
                Ok(estimate) => Some(position.direction.side_probability(estimate.probability)),
                Err(e) => {
                    debug!(position = %position.id, error = %e, "No estimate for exit check");
                    None
                }
            };

            if let Some(reason) =
                evaluate_exit(position, &self.rules, market.resolution, hold_probability, now)
            {
                debug!(
                    position = %position.id,
                    reason = %reason,
                    roi = %position.roi_percent(),
                    mark = %position.mark_price,
                    "Exit rule fired"
                );
                actions.push(ExitAction::Sell {
                    reason,
                    request: CloseRequest {
                        position_id: position.id,
                        market_id: position.market_id.clone(),
                        direction: position.direction,
                        shares: position.shares,
                        price: position.mark_price,
                    },
                });
            }
        }

        actions
    }

    /// Record that a close was accepted but not yet filled.
    pub fn mark_closing(&mut self, id: PositionId, reason: ExitReason) -> bool {
        match self.positions.get_mut(&id) {
            Some(position) => position.begin_close(reason),
            None => false,
        }
    }

    /// Close a position, release its risk and archive it.
    ///
    /// Returns the closed position, or `None` if it was not held.
    pub fn finalize(
        &mut self,
        risk: &mut RiskState,
        id: PositionId,
        reason: ExitReason,
        exit_price: Decimal,
        now: OffsetDateTime,
    ) -> Option<Position> {
        let mut position = self.positions.remove(&id)?;
        let realized = position.close(reason, exit_price, now)?;

        risk.release(&position.key(), position.size, realized, now);
        self.stats.record(&position);

        info!(
            position = %position.id,
            market = %position.market_id,
            reason = %reason,
            exit_price = %exit_price,
            realized_pnl = %realized,
            hold_time = %position.hold_time(now),
            "Position closed"
        );

        if self.closed.len() == MAX_ARCHIVED {
            self.closed.pop_front();
        }
        self.closed.push_back(position.clone());
        Some(position)
    }

    /// Position by id, if still held.
    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    /// Open and closing positions.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Closed positions, oldest first.
    pub fn closed(&self) -> impl Iterator<Item = &Position> {
        self.closed.iter()
    }

    /// Number of positions not yet closed.
    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    /// Whether any held position is on `market_id`.
    pub fn holds_market(&self, market_id: &str) -> bool {
        self.positions.values().any(|p| p.market_id == market_id)
    }

    /// Sum of unrealized P&L across held positions.
    pub fn unrealized_pnl(&self) -> Decimal {
        self.positions.values().map(|p| p.unrealized_pnl).sum()
    }

    /// Performance statistics over closed positions.
    pub fn stats(&self) -> &PerformanceStats {
        &self.stats
    }
}
