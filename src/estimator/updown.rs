//! Up/down probability factors.
//!
//! Each factor is a pure function of explicit inputs. The estimator adds them
//! up and caps the result:
//!
//! ```text
//! p(direction) = min(momentum_base + time_boost + persistence, ceiling)
//! ```

use rust_decimal::Decimal;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::market::PriceWindow;

/// Lowest probability the combination may return.
const PROBABILITY_FLOOR: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Ordered `(threshold %, base probability)` pairs plus the fallback below the
/// smallest threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentumTable {
    /// Thresholds in descending order.
    pub steps: Vec<(Decimal, Decimal)>,
    /// Base probability when no threshold is reached.
    pub floor: Decimal,
}

impl Default for MomentumTable {
    fn default() -> Self {
        Self {
            steps: vec![
                (Decimal::new(15, 1), Decimal::new(92, 2)),
                (Decimal::new(10, 1), Decimal::new(88, 2)),
                (Decimal::new(5, 1), Decimal::new(78, 2)),
                (Decimal::new(3, 1), Decimal::new(68, 2)),
            ],
            floor: Decimal::new(58, 2),
        }
    }
}

/// Piecewise-linear time boost over minutes remaining.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBoostCurve {
    /// `(minutes remaining, boost)` points, minutes strictly descending.
    pub points: Vec<(Decimal, Decimal)>,
}

impl Default for TimeBoostCurve {
    fn default() -> Self {
        Self {
            points: vec![
                (Decimal::new(5, 0), Decimal::ZERO),
                (Decimal::new(3, 0), Decimal::new(8, 2)),
                (Decimal::new(1, 0), Decimal::new(12, 2)),
                (Decimal::ZERO, Decimal::new(12, 2)),
            ],
        }
    }
}

/// Persistence rule parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistenceRule {
    /// Bonus added when the rule holds.
    pub bonus: Decimal,
    /// Fraction of samples that must sit on the current side.
    pub threshold: Decimal,
    /// Fewest samples considered.
    pub min_samples: usize,
}

impl Default for PersistenceRule {
    fn default() -> Self {
        Self {
            bonus: Decimal::new(5, 2),
            threshold: Decimal::new(8, 1),
            min_samples: 5,
        }
    }
}

/// Absolute percentage move from `reference` to `current`.
pub fn move_percent(reference: Decimal, current: Decimal) -> Decimal {
    if reference.is_zero() {
        return Decimal::ZERO;
    }
    ((current - reference) / reference * Decimal::ONE_HUNDRED).abs()
}

/// Base probability for a move of `move_pct` percent.
pub fn momentum_base(table: &MomentumTable, move_pct: Decimal) -> Decimal {
    table
        .steps
        .iter()
        .find(|(threshold, _)| move_pct >= *threshold)
        .map_or(table.floor, |(_, probability)| *probability)
}

/// Boost for `remaining` time left, interpolated along the curve.
///
/// Zero before the first point, the last point's value once time runs out.
pub fn time_boost(curve: &TimeBoostCurve, remaining: Duration) -> Decimal {
    let minutes = minutes(remaining);
    let Some(&(first_minutes, first_boost)) = curve.points.first() else {
        return Decimal::ZERO;
    };
    if minutes >= first_minutes {
        return first_boost;
    }

    for pair in curve.points.windows(2) {
        let (upper_minutes, upper_boost) = pair[0];
        let (lower_minutes, lower_boost) = pair[1];
        if minutes >= lower_minutes {
            let span = upper_minutes - lower_minutes;
            if span.is_zero() {
                return lower_boost;
            }
            let progress = (upper_minutes - minutes) / span;
            return upper_boost + (lower_boost - upper_boost) * progress;
        }
    }

    curve
        .points
        .last()
        .map_or(Decimal::ZERO, |(_, boost)| *boost)
}

/// Fixed bonus when enough samples since `since` sit on the same side of the
/// reference as the current move.
pub fn persistence_bonus(
    rule: &PersistenceRule,
    window: Option<&PriceWindow>,
    since: OffsetDateTime,
    reference: Decimal,
    going_up: bool,
) -> Decimal {
    let Some(window) = window else {
        return Decimal::ZERO;
    };

    let (total, on_side) = window.since(since).fold((0usize, 0usize), |(total, on_side), (_, price)| {
        let agrees = if going_up {
            *price > reference
        } else {
            *price < reference
        };
        (total + 1, on_side + usize::from(agrees))
    });

    if total == 0 || total < rule.min_samples {
        return Decimal::ZERO;
    }

    let fraction = Decimal::from(on_side) / Decimal::from(total);
    if fraction >= rule.threshold {
        rule.bonus
    } else {
        Decimal::ZERO
    }
}

/// Sum the factors and cap at `ceiling`, staying inside (0, 1).
pub fn combine(base: Decimal, boost: Decimal, persistence: Decimal, ceiling: Decimal) -> Decimal {
    let upper = ceiling.min(Decimal::ONE - PROBABILITY_FLOOR);
    (base + boost + persistence).clamp(PROBABILITY_FLOOR, upper)
}

/// Heuristic confidence in an up/down estimate.
pub fn confidence(move_pct: Decimal, remaining: Duration) -> Decimal {
    let mut confidence = Decimal::new(6, 1);
    if move_pct >= Decimal::new(5, 1) {
        confidence += Decimal::new(1, 1);
    }
    if move_pct >= Decimal::ONE {
        confidence += Decimal::new(1, 1);
    }
    if remaining <= Duration::minutes(3) {
        confidence += Decimal::new(1, 1);
    }
    confidence.min(Decimal::new(95, 2))
}

/// Duration in fractional minutes.
pub(crate) fn minutes(duration: Duration) -> Decimal {
    let millis = Decimal::from(duration.whole_milliseconds().max(0) as i64);
    millis / Decimal::from(60_000)
}
