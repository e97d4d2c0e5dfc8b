//! Process-wide risk state and admission control.
//!
//! Every new position is admitted here first. An accepted [`Admission`]
//! reserves its exposure and its (market, direction) slot until the order is
//! either confirmed with [`RiskState::commit`] or abandoned with
//! [`RiskState::cancel`]. Closed positions are returned through
//! [`RiskState::release`], which also feeds the daily loss breaker.

use std::collections::HashSet;
use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use strum::{Display, IntoStaticStr};
use time::{Date, OffsetDateTime};
use tracing::{info, warn};

use crate::config::Config;
use crate::market::Direction;

/// Limits enforced on admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskLimits {
    /// Cap on the sum of open sizes.
    pub max_total_exposure: Decimal,
    /// Cap on open positions.
    pub max_concurrent_positions: usize,
    /// Daily realized loss that trips the breaker.
    pub max_daily_loss: Decimal,
}

impl RiskLimits {
    /// Extract the limits from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_total_exposure: config.max_total_exposure,
            max_concurrent_positions: config.max_concurrent_positions,
            max_daily_loss: config.max_daily_loss,
        }
    }
}

/// One slot per market and direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PositionKey {
    /// Market identifier.
    pub market_id: String,
    /// Side held.
    pub direction: Direction,
}

impl PositionKey {
    /// Create a new key.
    pub fn new(market_id: impl Into<String>, direction: Direction) -> Self {
        Self {
            market_id: market_id.into(),
            direction,
        }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.market_id, self.direction)
    }
}

/// Why an admission was refused. Expected, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RejectReason {
    /// New admissions are paused by an operator.
    Paused,
    /// Daily loss limit reached; blocked until the next UTC day.
    DailyLossLimit,
    /// Open-position count is at its cap.
    MaxPositions,
    /// The size would push total exposure over its cap.
    ExposureCap,
    /// A position on this market and direction is already open or pending.
    Duplicate,
}

/// Reservation handed out by [`RiskState::admit`].
///
/// Must be passed back to either `commit` or `cancel`.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an admission reserves exposure until committed or cancelled"]
pub struct Admission {
    key: PositionKey,
    size: Decimal,
}

impl Admission {
    /// Reserved slot.
    pub fn key(&self) -> &PositionKey {
        &self.key
    }

    /// Reserved exposure.
    pub fn size(&self) -> Decimal {
        self.size
    }
}

/// Read-only view for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskSnapshot {
    /// Open plus pending positions.
    pub open_positions: usize,
    /// Admissions awaiting a fill.
    pub pending_admissions: usize,
    /// Sum of open and pending sizes.
    pub total_exposure: Decimal,
    /// Exposure still available.
    pub headroom: Decimal,
    /// Realized loss since the last reset.
    pub daily_loss: Decimal,
    /// Whether the daily breaker is tripped.
    pub breaker_tripped: bool,
    /// Whether admissions are paused.
    pub paused: bool,
    /// UTC date the loss counter belongs to.
    pub day: Date,
    /// Configured limits.
    pub limits: RiskLimits,
}

/// Process-wide risk counters.
#[derive(Debug, Clone)]
pub struct RiskState {
    limits: RiskLimits,
    keys: HashSet<PositionKey>,
    pending: usize,
    exposure: Decimal,
    daily_loss: Decimal,
    day: Date,
    paused: bool,
}

impl RiskState {
    /// Fresh state for the UTC day containing `now`.
    pub fn new(limits: RiskLimits, now: OffsetDateTime) -> Self {
        Self {
            limits,
            keys: HashSet::new(),
            pending: 0,
            exposure: Decimal::ZERO,
            daily_loss: Decimal::ZERO,
            day: now.date(),
            paused: false,
        }
    }

    /// Reset the daily loss counter if `now` is on a later UTC day.
    ///
    /// Open positions are unaffected.
    pub fn roll_day(&mut self, now: OffsetDateTime) -> bool {
        let today = now.to_offset(time::UtcOffset::UTC).date();
        if today <= self.day {
            return false;
        }
        info!(
            previous_day = %self.day,
            day = %today,
            daily_loss = %self.daily_loss,
            "Daily risk counters reset"
        );
        self.day = today;
        self.daily_loss = Decimal::ZERO;
        true
    }

    /// Check a candidate position and reserve its exposure if accepted.
    pub fn admit(
        &mut self,
        key: PositionKey,
        size: Decimal,
        now: OffsetDateTime,
    ) -> Result<Admission, RejectReason> {
        self.roll_day(now);

        if self.paused {
            return Err(RejectReason::Paused);
        }
        if self.breaker_tripped() {
            return Err(RejectReason::DailyLossLimit);
        }
        if self.keys.len() >= self.limits.max_concurrent_positions {
            return Err(RejectReason::MaxPositions);
        }
        if size <= Decimal::ZERO || self.exposure + size > self.limits.max_total_exposure {
            return Err(RejectReason::ExposureCap);
        }
        if self.keys.contains(&key) {
            return Err(RejectReason::Duplicate);
        }

        self.keys.insert(key.clone());
        self.pending += 1;
        self.exposure += size;
        Ok(Admission { key, size })
    }

    /// Confirm that an admitted position was filled.
    pub fn commit(&mut self, admission: Admission) -> PositionKey {
        self.pending = self.pending.saturating_sub(1);
        admission.key
    }

    /// Abandon an admission whose order failed.
    pub fn cancel(&mut self, admission: Admission) {
        self.pending = self.pending.saturating_sub(1);
        self.keys.remove(&admission.key);
        self.exposure -= admission.size;
    }

    /// Return a closed position's exposure and record its realized P&L.
    pub fn release(
        &mut self,
        key: &PositionKey,
        size: Decimal,
        realized_pnl: Decimal,
        now: OffsetDateTime,
    ) {
        self.roll_day(now);

        if !self.keys.remove(key) {
            warn!(key = %key, "Released a position the risk state did not track");
            return;
        }
        self.exposure = (self.exposure - size).max(Decimal::ZERO);
        if realized_pnl < Decimal::ZERO {
            self.daily_loss += realized_pnl.abs();
            if self.breaker_tripped() {
                warn!(
                    daily_loss = %self.daily_loss,
                    limit = %self.limits.max_daily_loss,
                    "Daily loss limit reached, admissions blocked until UTC midnight"
                );
            }
        }
    }

    /// Exposure still available under the cap.
    pub fn headroom(&self) -> Decimal {
        (self.limits.max_total_exposure - self.exposure).max(Decimal::ZERO)
    }

    /// Sum of open and pending sizes.
    pub fn exposure(&self) -> Decimal {
        self.exposure
    }

    /// Open plus pending positions.
    pub fn open_count(&self) -> usize {
        self.keys.len()
    }

    /// Realized loss since the last reset.
    pub fn daily_loss(&self) -> Decimal {
        self.daily_loss
    }

    /// Whether the daily loss breaker is tripped.
    pub fn breaker_tripped(&self) -> bool {
        self.daily_loss >= self.limits.max_daily_loss
    }

    /// Whether the slot is taken.
    pub fn is_held(&self, key: &PositionKey) -> bool {
        self.keys.contains(key)
    }

    /// Stop new admissions.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Allow new admissions again.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Whether admissions are paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Configured limits.
    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Reporting view.
    pub fn snapshot(&self) -> RiskSnapshot {
        RiskSnapshot {
            open_positions: self.keys.len(),
            pending_admissions: self.pending,
            total_exposure: self.exposure,
            headroom: self.headroom(),
            daily_loss: self.daily_loss,
            breaker_tripped: self.breaker_tripped(),
            paused: self.paused,
            day: self.day,
            limits: self.limits.clone(),
        }
    }
}
