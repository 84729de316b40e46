use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::PricingError;
use crate::types::{Money, Rate, Years};
use crate::PricingResult;

/// Grids wider than this are coarsened rather than walked in unit steps.
const MAX_GRID_STEPS: u32 = 2_000;

/// Payoff at expiry for both sides of a position at one terminal spot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoffPoint {
    pub spot: Money,
    pub long: Money,
    pub short: Money,
}

/// Evenly spaced grid of terminal spot prices, `steps + 1` points.
///
/// Deserialization goes through [`SpotRange::new`], so a range read from
/// JSON is validated like one built in code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpotRangeFields")]
pub struct SpotRange {
    pub low: Money,
    pub high: Money,
    pub steps: u32,
}

#[derive(Deserialize)]
struct SpotRangeFields {
    low: Money,
    high: Money,
    steps: u32,
}

impl TryFrom<SpotRangeFields> for SpotRange {
    type Error = PricingError;

    fn try_from(fields: SpotRangeFields) -> Result<Self, Self::Error> {
        SpotRange::new(fields.low, fields.high, fields.steps)
    }
}

impl SpotRange {
    pub fn new(low: Money, high: Money, steps: u32) -> PricingResult<Self> {
        if low < Decimal::ZERO {
            return Err(PricingError::invalid("low", "Lower spot bound must be non-negative"));
        }
        if high < low {
            return Err(PricingError::invalid(
                "high",
                "Upper spot bound must not be below the lower bound",
            ));
        }
        if steps > MAX_GRID_STEPS {
            return Err(PricingError::InvalidParameter {
                field: "steps".into(),
                reason: format!("At most {MAX_GRID_STEPS} grid steps, got {steps}"),
            });
        }
        Ok(Self { low, high, steps })
    }

    /// Whole-unit grid from floor(low) to floor(high), coarsened past
    /// `MAX_GRID_STEPS` points.
    pub fn unit_steps(low: Money, high: Money) -> Self {
        let low = low.max(Decimal::ZERO).floor();
        let high = high.max(low).floor();
        let width = high - low;
        let steps = width.to_u32().unwrap_or(MAX_GRID_STEPS).min(MAX_GRID_STEPS);
        Self { low, high, steps }
    }

    pub fn points(&self) -> Vec<Money> {
        if self.steps == 0 {
            return vec![self.low];
        }
        let step = (self.high - self.low) / Decimal::from(self.steps);
        (0..=self.steps)
            .map(|i| self.low + step * Decimal::from(i))
            .collect()
    }
}

/// Spot grid the option screens plot: S +/- sigma * S * T / 2, floored at zero.
pub fn option_spot_range(spot: Money, volatility: Rate, time: Years) -> SpotRange {
    let half_width = volatility.saturating_mul(spot).saturating_mul(time) / Decimal::TWO;
    SpotRange::unit_steps(spot.saturating_sub(half_width), spot.saturating_add(half_width))
}

/// Spot grid for forwards: S +/- (20 + 10 T), widened by r * T * S on each
/// side, floored at zero.
pub fn forward_spot_range(spot: Money, rate: Rate, maturity: Years) -> SpotRange {
    let width = dec!(20)
        .saturating_add(dec!(10).saturating_mul(maturity))
        .saturating_add(rate.saturating_mul(maturity).saturating_mul(spot));
    SpotRange::unit_steps(spot.saturating_sub(width), spot.saturating_add(width))
}

/// Evaluate a long-side payoff over the grid. The short side is its negation.
pub fn payoff_table<F>(range: &SpotRange, long_payoff: F) -> Vec<PayoffPoint>
where
    F: Fn(Money) -> Money,
{
    range
        .points()
        .into_iter()
        .map(|spot| {
            let long = long_payoff(spot);
            PayoffPoint {
                spot,
                long,
                short: -long,
            }
        })
        .collect()
}

/// Spots where the long side's profit (payoff minus `premium`) crosses zero,
/// linearly interpolated between grid points.
pub fn find_breakevens(table: &[PayoffPoint], premium: Money) -> Vec<Money> {
    let mut breakevens: Vec<Money> = Vec::new();
    let profit = |p: &PayoffPoint| p.long - premium;

    for (i, curr) in table.iter().enumerate() {
        if profit(curr).is_zero() {
            if !breakevens.contains(&curr.spot) {
                breakevens.push(curr.spot);
            }
            continue;
        }
        if i == 0 {
            continue;
        }
        let prev = &table[i - 1];
        let (p0, p1) = (profit(prev), profit(curr));
        if p0.is_zero() || (p0 > Decimal::ZERO) == (p1 > Decimal::ZERO) {
            continue;
        }
        let t = -p0 / (p1 - p0);
        let be = prev.spot + t * (curr.spot - prev.spot);
        if !breakevens.contains(&be) {
            breakevens.push(be);
        }
    }

    breakevens.sort();
    breakevens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_range_matches_dashboard_bounds() {
        // 100 +/- 0.2 * 100 * 1 / 2 = [90, 110]
        let range = option_spot_range(dec!(100), dec!(0.20), dec!(1));
        assert_eq!(range.low, dec!(90));
        assert_eq!(range.high, dec!(110));
        assert_eq!(range.steps, 20);
        assert_eq!(range.points().len(), 21);
    }

    #[test]
    fn test_forward_range_floors_at_zero() {
        // width = 20 + 10 + 0.05 * 1 * 10 = 30.5
        let range = forward_spot_range(dec!(10), dec!(0.05), dec!(1));
        assert_eq!(range.low, Decimal::ZERO);
        assert_eq!(range.high, dec!(40));
    }

    #[test]
    fn test_zero_width_range_is_single_point() {
        let range = option_spot_range(dec!(100), dec!(0.2), Decimal::ZERO);
        assert_eq!(range.points(), vec![dec!(100)]);
    }

    #[test]
    fn test_wide_range_is_coarsened() {
        let range = SpotRange::unit_steps(Decimal::ZERO, dec!(100000));
        assert_eq!(range.steps, MAX_GRID_STEPS);
        assert_eq!(*range.points().last().unwrap(), dec!(100000));
    }

    #[test]
    fn test_invalid_range() {
        assert!(SpotRange::new(dec!(10), dec!(5), 4).is_err());
        assert!(SpotRange::new(dec!(-1), dec!(5), 4).is_err());
        assert!(SpotRange::new(dec!(0), dec!(5), MAX_GRID_STEPS + 1).is_err());
        assert!(SpotRange::new(dec!(0), dec!(5), MAX_GRID_STEPS).is_ok());
    }

    #[test]
    fn test_deserialized_range_is_validated() {
        let ok: SpotRange =
            serde_json::from_str(r#"{"low": "80", "high": "120", "steps": 8}"#).unwrap();
        assert_eq!(ok, SpotRange::new(dec!(80), dec!(120), 8).unwrap());

        for json in [
            r#"{"low": "-50", "high": "-100", "steps": 3}"#,
            r#"{"low": "120", "high": "80", "steps": 3}"#,
            r#"{"low": "0", "high": "100", "steps": 4000000000}"#,
        ] {
            let err = serde_json::from_str::<SpotRange>(json).unwrap_err();
            assert!(err.to_string().contains("Invalid parameter"), "{json}: {err}");
        }
    }

    #[test]
    fn test_default_ranges_saturate_instead_of_overflowing() {
        let huge = dec!(10000000000000000000000000000);
        let range = option_spot_range(huge, dec!(100), dec!(100));
        assert_eq!(range.low, Decimal::ZERO);
        assert_eq!(range.steps, MAX_GRID_STEPS);
        let range = forward_spot_range(huge, dec!(50), dec!(50));
        assert_eq!(range.low, Decimal::ZERO);
    }

    #[test]
    fn test_payoff_table_short_is_negation() {
        let range = SpotRange::new(dec!(90), dec!(110), 4).unwrap();
        let table = payoff_table(&range, |s| (s - dec!(100)).max(Decimal::ZERO));
        assert_eq!(table.len(), 5);
        assert_eq!(table[4].long, dec!(10));
        assert_eq!(table[4].short, dec!(-10));
        assert_eq!(table[0].long, Decimal::ZERO);
    }

    #[test]
    fn test_breakevens_interpolated() {
        // Straddle at K=100 with premium 10 breaks even at 90 and 110
        let range = SpotRange::new(dec!(80), dec!(120), 8).unwrap();
        let table = payoff_table(&range, |s| (s - dec!(100)).abs());
        let be = find_breakevens(&table, dec!(10));
        assert_eq!(be, vec![dec!(90), dec!(110)]);

        let range = SpotRange::new(dec!(100), dec!(120), 4).unwrap();
        let table = payoff_table(&range, |s| (s - dec!(100)).max(Decimal::ZERO));
        let be = find_breakevens(&table, dec!(7));
        assert_eq!(be, vec![dec!(107)]);
    }
}
