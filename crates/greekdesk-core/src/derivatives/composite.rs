use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::derivatives::options::{EuropeanOption, Greeks, OptionKind, OptionSpec};
use crate::derivatives::payoff::{find_breakevens, payoff_table, PayoffPoint, SpotRange};
use crate::error::PricingError;
use crate::types::*;
use crate::PricingResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Market inputs shared by every leg of a packaged strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegMarket {
    pub spot: Money,
    pub time_to_maturity: Years,
    pub risk_free_rate: Rate,
    pub volatility: Rate,
}

impl LegMarket {
    fn option_spec(&self, strike: Money) -> OptionSpec {
        OptionSpec {
            spot: self.spot,
            strike,
            time_to_maturity: self.time_to_maturity,
            risk_free_rate: self.risk_free_rate,
            volatility: self.volatility,
            transaction_price: None,
        }
    }
}

fn default_sign() -> Decimal {
    Decimal::ONE
}

/// One leg of a custom composite, as read from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegSpec {
    pub option: OptionSpec,
    pub kind: OptionKind,
    /// +1 bought, -1 sold.
    #[serde(default = "default_sign")]
    pub sign: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum CompositeSpec {
    Straddle {
        market: LegMarket,
        strike: Money,
    },
    Strangle {
        market: LegMarket,
        call_strike: Money,
        put_strike: Money,
    },
    CallSpread {
        market: LegMarket,
        long_strike: Money,
        short_strike: Money,
    },
    Custom {
        #[serde(default)]
        name: Option<String>,
        legs: Vec<LegSpec>,
    },
}

impl CompositeSpec {
    pub fn build(&self) -> PricingResult<CompositeInstrument> {
        match self {
            CompositeSpec::Straddle { market, strike } => {
                CompositeInstrument::straddle(market, *strike)
            }
            CompositeSpec::Strangle {
                market,
                call_strike,
                put_strike,
            } => CompositeInstrument::strangle(market, *call_strike, *put_strike),
            CompositeSpec::CallSpread {
                market,
                long_strike,
                short_strike,
            } => CompositeInstrument::call_spread(market, *long_strike, *short_strike),
            CompositeSpec::Custom { name, legs } => {
                let built = legs
                    .iter()
                    .map(|leg| {
                        let option = EuropeanOption::new(leg.option.clone(), leg.kind)?;
                        CompositeLeg::new(option, leg.sign)
                    })
                    .collect::<PricingResult<Vec<_>>>()?;
                let mut instrument = CompositeInstrument::from_legs(built)?;
                if let Some(name) = name {
                    instrument.name = name.clone();
                }
                Ok(instrument)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeAnalysisInput {
    pub instrument: CompositeSpec,
    #[serde(default)]
    pub position: Position,
    /// Terminal spot grid; defaults to spot +/- 30% of the first leg's spot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payoff_range: Option<SpotRange>,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegValuation {
    pub kind: OptionKind,
    pub strike: Money,
    pub sign: Decimal,
    pub price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeAnalysis {
    pub strategy_name: String,
    pub position: Position,
    /// Signed sum of leg prices; the net premium of a long position.
    pub price: Money,
    pub greeks: Greeks,
    pub legs: Vec<LegValuation>,
    pub payoff_table: Vec<PayoffPoint>,
    /// Terminal spots where the long side's payoff equals the premium.
    pub breakeven_points: Vec<Money>,
}

// ---------------------------------------------------------------------------
// Instrument
// ---------------------------------------------------------------------------

/// An option leg held with a fixed sign.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeLeg {
    option: EuropeanOption,
    sign: Decimal,
}

impl CompositeLeg {
    pub fn new(option: EuropeanOption, sign: Decimal) -> PricingResult<Self> {
        if sign != Decimal::ONE && sign != Decimal::NEGATIVE_ONE {
            return Err(PricingError::InvalidParameter {
                field: "sign".into(),
                reason: format!("Leg sign must be +1 or -1, got {sign}"),
            });
        }
        Ok(Self { option, sign })
    }

    pub fn bought(option: EuropeanOption) -> Self {
        Self {
            option,
            sign: Decimal::ONE,
        }
    }

    pub fn sold(option: EuropeanOption) -> Self {
        Self {
            option,
            sign: Decimal::NEGATIVE_ONE,
        }
    }

    pub fn option(&self) -> &EuropeanOption {
        &self.option
    }

    pub fn sign(&self) -> Decimal {
        self.sign
    }
}

/// Ordered list of signed option legs. Every aggregate is the signed sum of
/// the per-leg values.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeInstrument {
    name: String,
    legs: Vec<CompositeLeg>,
}

impl CompositeInstrument {
    /// Long call plus long put at the same strike.
    pub fn straddle(market: &LegMarket, strike: Money) -> PricingResult<Self> {
        let call = EuropeanOption::call(market.option_spec(strike))?;
        let put = EuropeanOption::put(market.option_spec(strike))?;
        Ok(Self::named(
            "Straddle",
            vec![CompositeLeg::bought(call), CompositeLeg::bought(put)],
        ))
    }

    /// Long call and long put at different strikes.
    pub fn strangle(market: &LegMarket, call_strike: Money, put_strike: Money) -> PricingResult<Self> {
        let call = EuropeanOption::call(market.option_spec(call_strike))?;
        let put = EuropeanOption::put(market.option_spec(put_strike))?;
        Ok(Self::named(
            "Strangle",
            vec![CompositeLeg::bought(call), CompositeLeg::bought(put)],
        ))
    }

    /// Long call at `long_strike`, short call at the higher `short_strike`.
    pub fn call_spread(
        market: &LegMarket,
        long_strike: Money,
        short_strike: Money,
    ) -> PricingResult<Self> {
        let long = EuropeanOption::call(market.option_spec(long_strike))?;
        let short = EuropeanOption::call(market.option_spec(short_strike))?;
        if long_strike >= short_strike {
            return Err(PricingError::InvalidParameter {
                field: "long_strike".into(),
                reason: "long strike must be below short strike".into(),
            });
        }
        Ok(Self::named(
            "Call Spread",
            vec![CompositeLeg::bought(long), CompositeLeg::sold(short)],
        ))
    }

    pub fn from_legs(legs: Vec<CompositeLeg>) -> PricingResult<Self> {
        if legs.is_empty() {
            return Err(PricingError::invalid(
                "legs",
                "A composite needs at least one leg",
            ));
        }
        Ok(Self::named("Custom", legs))
    }

    fn named(name: &str, legs: Vec<CompositeLeg>) -> Self {
        tracing::debug!(name, legs = legs.len(), "composite instrument constructed");
        Self {
            name: name.to_string(),
            legs,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn legs(&self) -> &[CompositeLeg] {
        &self.legs
    }

    fn signed_sum<F>(&self, value: F) -> Decimal
    where
        F: Fn(&EuropeanOption) -> Decimal,
    {
        self.legs
            .iter()
            .fold(Decimal::ZERO, |acc, leg| acc + leg.sign * value(&leg.option))
    }

    pub fn price(&self) -> Money {
        self.signed_sum(|o| o.price())
    }

    pub fn payoff_long(&self, spot_at_expiry: Money) -> Money {
        self.signed_sum(|o| o.payoff_long(spot_at_expiry))
    }

    pub fn payoff_short(&self, spot_at_expiry: Money) -> Money {
        self.signed_sum(|o| o.payoff_short(spot_at_expiry))
    }

    pub fn payoff(&self, spot_at_expiry: Money, position: Position) -> Money {
        self.signed_sum(|o| o.payoff(spot_at_expiry, position))
    }

    pub fn delta(&self, position: Position) -> Decimal {
        self.signed_sum(|o| o.delta(position))
    }

    pub fn gamma(&self, position: Position) -> Decimal {
        self.signed_sum(|o| o.gamma(position))
    }

    pub fn vega(&self, position: Position) -> Decimal {
        self.signed_sum(|o| o.vega(position))
    }

    pub fn theta(&self, position: Position) -> Decimal {
        self.signed_sum(|o| o.theta(position))
    }

    pub fn rho(&self, position: Position) -> Decimal {
        self.signed_sum(|o| o.rho(position))
    }

    pub fn greeks(&self, position: Position) -> Greeks {
        self.legs.iter().fold(Greeks::default(), |acc, leg| {
            acc.add_scaled(leg.option.greeks(position), leg.sign)
        })
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn price_composite(legs: Vec<CompositeLeg>) -> PricingResult<Money> {
    Ok(CompositeInstrument::from_legs(legs)?.price())
}

fn default_range(instrument: &CompositeInstrument) -> SpotRange {
    let spot = instrument
        .legs()
        .first()
        .map(|leg| leg.option().spec().spot)
        .unwrap_or_default();
    let band = spot * dec!(0.30);
    SpotRange::unit_steps(spot - band, spot.saturating_add(band))
}

/// Premium, aggregated Greeks, expiry payoff profile and breakevens for a
/// packaged or custom multi-leg position.
pub fn analyze_composite(
    input: &CompositeAnalysisInput,
) -> PricingResult<ComputationOutput<CompositeAnalysis>> {
    let start = Instant::now();
    let instrument = input.instrument.build()?;
    let mut warnings: Vec<String> = Vec::new();

    if instrument.legs().iter().any(|leg| leg.option().is_expired()) {
        warnings.push("At least one leg is at expiry; its value is intrinsic".into());
    }

    let price = instrument.price();
    let range = input.payoff_range.unwrap_or_else(|| default_range(&instrument));
    let payoff_table = payoff_table(&range, |s| instrument.payoff_long(s));
    let breakeven_points = find_breakevens(&payoff_table, price);

    let legs = instrument
        .legs()
        .iter()
        .map(|leg| LegValuation {
            kind: leg.option().kind(),
            strike: leg.option().strike(),
            sign: leg.sign(),
            price: leg.option().price(),
        })
        .collect();

    let output = CompositeAnalysis {
        strategy_name: instrument.name().to_string(),
        position: input.position,
        price,
        greeks: instrument.greeks(input.position),
        legs,
        payoff_table,
        breakeven_points,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Signed sum of Black-Scholes legs",
        &serde_json::json!({
            "strategy": instrument.name(),
            "num_legs": instrument.legs().len(),
            "position": format!("{:?}", input.position),
            "price_range": format!("{} - {}", range.low, range.high),
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
