use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PricingError;
use crate::math::{ln_decimal, sqrt_decimal};
use crate::types::*;
use crate::PricingResult;

/// Trading days per year used to annualise daily closes.
pub const TRADING_DAYS_PER_YEAR: u32 = 252;

fn default_periods_per_year() -> u32 {
    TRADING_DAYS_PER_YEAR
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityInput {
    /// Closing prices, oldest first.
    pub closes: Vec<Money>,
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: u32,
    /// Implied vols quoted on the call side of the nearest expiry.
    #[serde(default)]
    pub call_ivs: Vec<Rate>,
    #[serde(default)]
    pub put_ivs: Vec<Rate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityEstimate {
    pub spot_price: Money,
    pub historical_vol: Rate,
    pub implied_vol: Option<Rate>,
    pub observations: usize,
}

fn sample_stdev(values: &[Decimal]) -> Decimal {
    let n = Decimal::from(values.len() as u64);
    if n <= Decimal::ONE {
        return Decimal::ZERO;
    }
    let mean = values.iter().copied().sum::<Decimal>() / n;
    let var = values
        .iter()
        .map(|v| {
            let d = *v - mean;
            d * d
        })
        .sum::<Decimal>()
        / (n - Decimal::ONE);
    sqrt_decimal(var)
}

fn mean(values: &[Decimal]) -> Decimal {
    values.iter().copied().sum::<Decimal>() / Decimal::from(values.len() as u64)
}

/// Annualised sample standard deviation of log returns.
pub fn historical_volatility(closes: &[Money], periods_per_year: u32) -> PricingResult<Rate> {
    if closes.len() < 3 {
        return Err(PricingError::invalid(
            "closes",
            "At least three closing prices are needed for a sample volatility",
        ));
    }
    if closes.iter().any(|c| *c <= Decimal::ZERO) {
        return Err(PricingError::invalid(
            "closes",
            "Closing prices must be positive",
        ));
    }
    if periods_per_year == 0 {
        return Err(PricingError::invalid(
            "periods_per_year",
            "Must be at least one period per year",
        ));
    }

    let log_returns: Vec<Decimal> = closes
        .windows(2)
        .map(|w| ln_decimal(w[1] / w[0]))
        .collect();

    Ok(sample_stdev(&log_returns) * sqrt_decimal(Decimal::from(periods_per_year)))
}

/// Mean of the call-chain average and the put-chain average.
pub fn average_implied_vol(call_ivs: &[Rate], put_ivs: &[Rate]) -> PricingResult<Rate> {
    if call_ivs.is_empty() || put_ivs.is_empty() {
        return Err(PricingError::DataUnavailable(
            "option chain has no implied volatility quotes on one side".into(),
        ));
    }
    Ok((mean(call_ivs) + mean(put_ivs)) / Decimal::TWO)
}

/// Yield index quotes such as the 13-week T-bill are in percent.
pub fn rate_from_percent_quote(quote: Decimal) -> Rate {
    quote / dec!(100)
}

pub fn analyze_volatility(
    input: &VolatilityInput,
) -> PricingResult<ComputationOutput<VolatilityEstimate>> {
    let start = Instant::now();
    let historical_vol = historical_volatility(&input.closes, input.periods_per_year)?;
    let mut warnings: Vec<String> = Vec::new();

    let implied_vol = if input.call_ivs.is_empty() && input.put_ivs.is_empty() {
        None
    } else {
        Some(average_implied_vol(&input.call_ivs, &input.put_ivs)?)
    };

    if let Some(iv) = implied_vol {
        if (iv - historical_vol).abs() > historical_vol {
            warnings.push(format!(
                "Implied vol {iv} differs from historical vol {historical_vol} by more than 100%"
            ));
        }
    }

    let output = VolatilityEstimate {
        spot_price: input.closes.last().copied().unwrap_or_default(),
        historical_vol,
        implied_vol,
        observations: input.closes.len(),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Close-to-close log return volatility",
        &serde_json::json!({
            "periods_per_year": input.periods_per_year,
            "estimator": "sample standard deviation (n - 1)",
            "implied_vol": "mean of call and put chain averages",
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Decimal, expected: Decimal, tolerance: Decimal) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tolerance,
            "expected ~{expected}, got {actual} (diff {diff})"
        );
    }

    #[test]
    fn test_historical_volatility() {
        let closes = [dec!(100), dec!(101), dec!(99), dec!(102), dec!(100)];
        let vol = historical_volatility(&closes, 252).unwrap();
        assert_close(vol, dec!(0.3869364981), dec!(0.0000001));
    }

    #[test]
    fn test_constant_growth_has_zero_vol() {
        let closes = [dec!(100), dec!(110), dec!(121)];
        let vol = historical_volatility(&closes, 252).unwrap();
        assert_close(vol, Decimal::ZERO, dec!(0.0000001));
    }

    #[test]
    fn test_too_few_closes() {
        match historical_volatility(&[dec!(100), dec!(101)], 252).unwrap_err() {
            PricingError::InvalidParameter { field, .. } => assert_eq!(field, "closes"),
            other => panic!("Expected InvalidParameter, got {other:?}"),
        }
    }

    #[test]
    fn test_non_positive_close() {
        let closes = [dec!(100), Decimal::ZERO, dec!(101)];
        assert!(historical_volatility(&closes, 252).is_err());
    }

    #[test]
    fn test_average_implied_vol() {
        let iv = average_implied_vol(&[dec!(0.20), dec!(0.30)], &[dec!(0.40)]).unwrap();
        assert_eq!(iv, dec!(0.325));
        assert!(matches!(
            average_implied_vol(&[], &[dec!(0.40)]),
            Err(PricingError::DataUnavailable(_))
        ));
    }

    #[test]
    fn test_rate_from_percent_quote() {
        assert_eq!(rate_from_percent_quote(dec!(4.25)), dec!(0.0425));
    }

    #[test]
    fn test_analyze_volatility_defaults() {
        let json = r#"{"closes": ["100", "101", "99", "102", "100"]}"#;
        let input: VolatilityInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.periods_per_year, TRADING_DAYS_PER_YEAR);
        let out = analyze_volatility(&input).unwrap();
        assert_eq!(out.result.spot_price, dec!(100));
        assert_eq!(out.result.observations, 5);
        assert_eq!(out.result.implied_vol, None);
    }
}
