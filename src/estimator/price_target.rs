//! Price-target probability model.
//!
//! Treats log price as a driftless random walk with per-minute volatility
//! `sigma`, so the chance of finishing above the target `K` from price `S`
//! with `tau` minutes left is `N(ln(S/K) / (sigma * sqrt(tau)))`.

use rust_decimal::{Decimal, MathematicalOps};
use time::Duration;

use super::updown::minutes;

/// Z-scores beyond this are treated as certain.
const MAX_Z: Decimal = Decimal::from_parts(8, 0, 0, false, 0);

const HALF: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Probability that a price currently at `current` ends above `target`.
///
/// Returns `None` for non-positive prices.
pub fn probability_above(
    current: Decimal,
    target: Decimal,
    remaining: Duration,
    sigma: Decimal,
) -> Option<Decimal> {
    if current <= Decimal::ZERO || target <= Decimal::ZERO {
        return None;
    }

    let z = z_score(current, target, remaining, sigma)?;
    Some(if z >= MAX_Z {
        Decimal::ONE
    } else if z <= -MAX_Z {
        Decimal::ZERO
    } else if z.is_zero() {
        HALF
    } else {
        z.norm_cdf().clamp(Decimal::ZERO, Decimal::ONE)
    })
}

/// Standardized distance to the target. At zero time left the sign decides.
pub fn z_score(current: Decimal, target: Decimal, remaining: Duration, sigma: Decimal) -> Option<Decimal> {
    if current <= Decimal::ZERO || target <= Decimal::ZERO {
        return None;
    }
    let log_ratio = (current / target).checked_ln()?;
    let scale = sigma * minutes(remaining).sqrt()?;

    if scale <= Decimal::ZERO {
        return Some(match current.cmp(&target) {
            std::cmp::Ordering::Greater => MAX_Z,
            std::cmp::Ordering::Less => -MAX_Z,
            std::cmp::Ordering::Equal => Decimal::ZERO,
        });
    }

    Some((log_ratio / scale).clamp(-MAX_Z, MAX_Z))
}

/// Confidence is higher once the price is already past the target.
pub fn confidence(current: Decimal, target: Decimal) -> Decimal {
    if current > target {
        Decimal::new(9, 1)
    } else {
        Decimal::new(7, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SIGMA: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

    #[test]
    fn at_the_target_is_a_coin_flip() {
        let p = probability_above(dec!(103000), dec!(103000), Duration::minutes(30), SIGMA).unwrap();
        assert!((p - dec!(0.5)).abs() < dec!(0.0001));
    }

    #[test]
    fn probability_increases_with_distance() {
        let remaining = Duration::minutes(30);
        let mut previous = Decimal::ZERO;
        for current in [dec!(101000), dec!(102500), dec!(103000), dec!(103200), dec!(104000)] {
            let p = probability_above(current, dec!(103000), remaining, SIGMA).unwrap();
            assert!(p >= previous, "not monotonic at {current}");
            previous = p;
        }
        let below = probability_above(dec!(102900), dec!(103000), remaining, SIGMA).unwrap();
        let above = probability_above(dec!(103100), dec!(103000), remaining, SIGMA).unwrap();
        assert!(below < dec!(0.5) && above > dec!(0.5));
    }

    #[test]
    fn saturates_as_time_runs_out() {
        let far = probability_above(dec!(103100), dec!(103000), Duration::minutes(60), SIGMA).unwrap();
        let near = probability_above(dec!(103100), dec!(103000), Duration::seconds(10), SIGMA).unwrap();
        assert!(near > far);
        assert!(near > dec!(0.95));

        assert_eq!(
            probability_above(dec!(103100), dec!(103000), Duration::ZERO, SIGMA),
            Some(dec!(1))
        );
        assert_eq!(
            probability_above(dec!(102900), dec!(103000), Duration::ZERO, SIGMA),
            Some(dec!(0))
        );
        assert_eq!(
            probability_above(dec!(103000), dec!(103000), Duration::ZERO, SIGMA),
            Some(dec!(0.5))
        );
    }

    #[test]
    fn rejects_non_positive_prices() {
        assert!(probability_above(dec!(0), dec!(103000), Duration::minutes(5), SIGMA).is_none());
        assert!(probability_above(dec!(103000), dec!(-1), Duration::minutes(5), SIGMA).is_none());
    }

    #[test]
    fn confidence_depends_on_side() {
        assert_eq!(confidence(dec!(104000), dec!(103000)), dec!(0.9));
        assert_eq!(confidence(dec!(102000), dec!(103000)), dec!(0.7));
    }
}
