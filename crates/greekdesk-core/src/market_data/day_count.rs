use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::error::PricingError;
use crate::types::*;
use crate::PricingResult;

/// Day-count basis for converting a date span into a year fraction.
///
/// Only the denominator differs between conventions; the numerator is
/// always the actual number of calendar days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayCountConvention {
    /// ACT/ACT approximated with 365.25 days per year
    #[default]
    ActualActual,
    /// ACT/360 money market convention
    Actual360,
    /// ACT/365 fixed
    Actual365,
    /// 30/360
    Thirty360,
}

impl DayCountConvention {
    pub fn denominator(self) -> Decimal {
        match self {
            DayCountConvention::ActualActual => dec!(365.25),
            DayCountConvention::Actual360 | DayCountConvention::Thirty360 => dec!(360),
            DayCountConvention::Actual365 => dec!(365),
        }
    }
}

impl FromStr for DayCountConvention {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "act/act" | "actual/actual" | "actualactual" => Ok(DayCountConvention::ActualActual),
            "act/360" | "actual/360" | "actual360" => Ok(DayCountConvention::Actual360),
            "act/365" | "actual/365" | "actual365" => Ok(DayCountConvention::Actual365),
            "30/360" | "thirty360" => Ok(DayCountConvention::Thirty360),
            other => Err(PricingError::InvalidParameter {
                field: "convention".into(),
                reason: format!("Unsupported day-count convention '{other}'"),
            }),
        }
    }
}

impl fmt::Display for DayCountConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DayCountConvention::ActualActual => "ACT/ACT",
            DayCountConvention::Actual360 => "ACT/360",
            DayCountConvention::Actual365 => "ACT/365",
            DayCountConvention::Thirty360 => "30/360",
        };
        f.write_str(label)
    }
}

/// Years between `valuation` and `maturity`. Maturity on the valuation date
/// is zero; a maturity in the past is a `DomainError`.
pub fn year_fraction(
    valuation: NaiveDate,
    maturity: NaiveDate,
    convention: DayCountConvention,
) -> PricingResult<Years> {
    let days = (maturity - valuation).num_days();
    if days < 0 {
        return Err(PricingError::DomainError(format!(
            "maturity date {maturity} is before valuation date {valuation}"
        )));
    }
    Ok(Decimal::from(days) / convention.denominator())
}

/// A maturity date resolved into a year fraction as of a valuation date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeToMaturity {
    pub valuation_date: NaiveDate,
    pub maturity_date: NaiveDate,
    pub convention: DayCountConvention,
    pub days: i64,
    pub year_fraction: Years,
}

impl TimeToMaturity {
    pub fn new(
        valuation_date: NaiveDate,
        maturity_date: NaiveDate,
        convention: DayCountConvention,
    ) -> PricingResult<Self> {
        let year_fraction = year_fraction(valuation_date, maturity_date, convention)?;
        Ok(Self {
            valuation_date,
            maturity_date,
            convention,
            days: (maturity_date - valuation_date).num_days(),
            year_fraction,
        })
    }

    /// Time to maturity as of today's local date.
    pub fn from_today(maturity_date: NaiveDate, convention: DayCountConvention) -> PricingResult<Self> {
        Self::new(chrono::Local::now().date_naive(), maturity_date, convention)
    }

    pub fn years(&self) -> Years {
        self.year_fraction
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeToMaturityInput {
    pub maturity_date: NaiveDate,
    /// Defaults to today.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuation_date: Option<NaiveDate>,
    #[serde(default)]
    pub convention: DayCountConvention,
}

impl TimeToMaturityInput {
    pub fn resolve(&self) -> PricingResult<TimeToMaturity> {
        match self.valuation_date {
            Some(valuation) => TimeToMaturity::new(valuation, self.maturity_date, self.convention),
            None => TimeToMaturity::from_today(self.maturity_date, self.convention),
        }
    }
}

pub fn analyze_time_to_maturity(
    input: &TimeToMaturityInput,
) -> PricingResult<ComputationOutput<TimeToMaturity>> {
    let start = Instant::now();
    let ttm = input.resolve()?;
    let mut warnings: Vec<String> = Vec::new();
    if ttm.days == 0 {
        warnings.push("Maturity is today; time to maturity is zero".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Actual days over convention denominator",
        &serde_json::json!({
            "convention": ttm.convention.to_string(),
            "denominator": ttm.convention.denominator().to_string(),
        }),
        warnings,
        elapsed,
        ttm,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_year_fraction_by_convention() {
        let (v, m) = (date(2026, 1, 1), date(2026, 7, 1));
        // 181 actual days
        let act_act = year_fraction(v, m, DayCountConvention::ActualActual).unwrap();
        assert_eq!(act_act, dec!(181) / dec!(365.25));
        assert_eq!(
            year_fraction(v, m, DayCountConvention::Actual360).unwrap(),
            dec!(181) / dec!(360)
        );
        assert_eq!(
            year_fraction(v, m, DayCountConvention::Actual365).unwrap(),
            dec!(181) / dec!(365)
        );
        assert_eq!(
            year_fraction(v, m, DayCountConvention::Thirty360).unwrap(),
            dec!(181) / dec!(360)
        );
    }

    #[test]
    fn test_same_day_is_zero() {
        let d = date(2026, 3, 15);
        assert_eq!(
            year_fraction(d, d, DayCountConvention::ActualActual).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_past_maturity_is_domain_error() {
        let err = year_fraction(date(2026, 3, 15), date(2026, 3, 14), DayCountConvention::Actual365)
            .unwrap_err();
        assert!(matches!(err, PricingError::DomainError(_)));
    }

    #[test]
    fn test_time_to_maturity_value() {
        let ttm = TimeToMaturity::new(
            date(2026, 1, 1),
            date(2027, 1, 1),
            DayCountConvention::ActualActual,
        )
        .unwrap();
        assert_eq!(ttm.days, 365);
        assert!(ttm.years() > dec!(0.9993) && ttm.years() < dec!(0.9994));
    }

    #[test]
    fn test_convention_parsing() {
        assert_eq!(
            "ACT/360".parse::<DayCountConvention>().unwrap(),
            DayCountConvention::Actual360
        );
        assert_eq!(
            "30/360".parse::<DayCountConvention>().unwrap(),
            DayCountConvention::Thirty360
        );
        assert!("bus/252".parse::<DayCountConvention>().is_err());
    }

    #[test]
    fn test_input_defaults() {
        let json = r#"{"maturity_date": "2030-06-30", "valuation_date": "2026-06-30"}"#;
        let input: TimeToMaturityInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.convention, DayCountConvention::ActualActual);
        let out = analyze_time_to_maturity(&input).unwrap();
        assert_eq!(out.result.days, 1461);
        assert_eq!(out.result.year_fraction, dec!(4));
    }
}
