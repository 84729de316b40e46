use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::derivatives::payoff::{forward_spot_range, payoff_table, PayoffPoint, SpotRange};
use crate::error::PricingError;
use crate::math::exp_decimal;
use crate::types::*;
use crate::PricingResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Forward on an asset with a continuous dividend yield.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardSpec {
    /// Current spot price of the underlying.
    pub spot: Money,
    /// Time to delivery in years.
    pub maturity: Years,
    /// Continuously compounded risk-free rate.
    pub interest_rate: Rate,
    /// Continuous dividend yield; zero when absent.
    #[serde(default)]
    pub dividend_yield: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardAnalysisInput {
    pub forward: ForwardSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payoff_range: Option<SpotRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardAnalysis {
    /// F = S * exp((r - q) * T).
    pub forward_price: Money,
    /// Net carry rate r - q.
    pub cost_of_carry: Rate,
    /// F - S.
    pub basis: Money,
    pub payoff_table: Vec<PayoffPoint>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Cost-of-carry forward. The price is fixed at construction; a carry that
/// grows past the Decimal range is a `DomainError` from `new`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardEngine {
    spec: ForwardSpec,
    forward_price: Money,
}

impl ForwardEngine {
    pub fn new(spec: ForwardSpec) -> PricingResult<Self> {
        validate_spec(&spec)?;
        let forward_price = carry_forward(&spec)?;
        tracing::debug!(
            spot = %spec.spot,
            maturity = %spec.maturity,
            interest_rate = %spec.interest_rate,
            %forward_price,
            "forward engine constructed"
        );
        Ok(Self {
            spec,
            forward_price,
        })
    }

    pub fn spec(&self) -> &ForwardSpec {
        &self.spec
    }

    pub fn cost_of_carry(&self) -> Rate {
        self.spec.interest_rate - self.spec.dividend_yield
    }

    pub fn price(&self) -> Money {
        self.forward_price
    }

    pub fn payoff_long(&self, spot_at_expiry: Money) -> Money {
        spot_at_expiry - self.price()
    }

    pub fn payoff_short(&self, spot_at_expiry: Money) -> Money {
        self.price() - spot_at_expiry
    }

    pub fn payoff(&self, spot_at_expiry: Money, position: Position) -> Money {
        match position {
            Position::Long => self.payoff_long(spot_at_expiry),
            Position::Short => self.payoff_short(spot_at_expiry),
        }
    }
}

/// S * exp((r - q) * T)
fn carry_forward(spec: &ForwardSpec) -> PricingResult<Money> {
    let out_of_range = || {
        PricingError::DomainError(format!(
            "forward price for spot {} over {} years at carry {} is outside the decimal range",
            spec.spot,
            spec.maturity,
            spec.interest_rate - spec.dividend_yield
        ))
    };
    let exponent = (spec.interest_rate - spec.dividend_yield)
        .checked_mul(spec.maturity)
        .ok_or_else(out_of_range)?;
    let growth = exp_decimal(exponent).map_err(|_| out_of_range())?;
    spec.spot.checked_mul(growth).ok_or_else(out_of_range)
}

fn validate_spec(spec: &ForwardSpec) -> PricingResult<()> {
    let checks = [
        ("spot", spec.spot),
        ("maturity", spec.maturity),
        ("interest_rate", spec.interest_rate),
        ("dividend_yield", spec.dividend_yield),
    ];
    for (field, value) in checks {
        if value < Decimal::ZERO {
            return Err(PricingError::InvalidParameter {
                field: field.into(),
                reason: format!("{field} must be non-negative, got {value}"),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn price_forward(spec: &ForwardSpec) -> PricingResult<Money> {
    Ok(ForwardEngine::new(spec.clone())?.price())
}

pub fn forward_payoff_long(spec: &ForwardSpec, spot_at_expiry: Money) -> PricingResult<Money> {
    Ok(ForwardEngine::new(spec.clone())?.payoff_long(spot_at_expiry))
}

pub fn forward_payoff_short(spec: &ForwardSpec, spot_at_expiry: Money) -> PricingResult<Money> {
    Ok(ForwardEngine::new(spec.clone())?.payoff_short(spot_at_expiry))
}

/// Cost-of-carry forward price with basis and a long/short payoff profile.
pub fn analyze_forward(
    input: &ForwardAnalysisInput,
) -> PricingResult<ComputationOutput<ForwardAnalysis>> {
    let start = Instant::now();
    let engine = ForwardEngine::new(input.forward.clone())?;
    let spec = engine.spec();

    let forward_price = engine.price();
    let range = input.payoff_range.unwrap_or_else(|| {
        forward_spot_range(spec.spot, spec.interest_rate, spec.maturity)
    });

    let output = ForwardAnalysis {
        forward_price,
        cost_of_carry: engine.cost_of_carry(),
        basis: forward_price - spec.spot,
        payoff_table: payoff_table(&range, |s| engine.payoff_long(s)),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Forward pricing via continuous cost-of-carry",
        &serde_json::json!({
            "spot": spec.spot.to_string(),
            "interest_rate": spec.interest_rate.to_string(),
            "dividend_yield": spec.dividend_yield.to_string(),
            "maturity": spec.maturity.to_string(),
        }),
        Vec::new(),
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
