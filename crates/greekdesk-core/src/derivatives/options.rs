use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::derivatives::payoff::{option_spot_range, payoff_table, PayoffPoint, SpotRange};
use crate::error::PricingError;
use crate::math::{exp_decimal, ln_decimal, norm_cdf, norm_pdf, sqrt_decimal};
use crate::types::*;
use crate::PricingResult;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionKind {
    Call,
    Put,
}

/// Scalar Black-Scholes inputs for a single European option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub spot: Money,
    pub strike: Money,
    /// Years to expiry; zero means the option expires now.
    pub time_to_maturity: Years,
    pub risk_free_rate: Rate,
    pub volatility: Rate,
    /// Premium paid or received when the position was opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_price: Option<Money>,
}

/// The five first/second order sensitivities, as raw partial derivatives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: Decimal,
    pub gamma: Decimal,
    pub vega: Decimal,
    pub theta: Decimal,
    pub rho: Decimal,
}

impl Greeks {
    /// Signed accumulation used by composite instruments.
    pub fn add_scaled(self, other: Greeks, sign: Decimal) -> Greeks {
        Greeks {
            delta: self.delta + sign * other.delta,
            gamma: self.gamma + sign * other.gamma,
            vega: self.vega + sign * other.vega,
            theta: self.theta + sign * other.theta,
            rho: self.rho + sign * other.rho,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionAnalysisInput {
    pub option: OptionSpec,
    pub kind: OptionKind,
    #[serde(default)]
    pub position: Position,
    /// Terminal spot grid for the payoff table; defaults to S +/- sigma*S*T/2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payoff_range: Option<SpotRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionAnalysis {
    pub kind: OptionKind,
    pub position: Position,
    pub price: Money,
    pub intrinsic_value: Money,
    pub time_value: Money,
    pub greeks: Greeks,
    pub pnl: Option<Money>,
    pub moneyness: String,
    pub breakeven: Money,
    /// Price of the opposite kind implied by put-call parity.
    pub put_call_parity_price: Money,
    pub payoff_table: Vec<PayoffPoint>,
}

// ---------------------------------------------------------------------------
// Black-Scholes internals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct BsParams {
    d1: Decimal,
    d2: Decimal,
    sqrt_t: Decimal,
    /// K * exp(-rT)
    discounted_strike: Money,
    /// S * sigma * sqrt(T), the gamma denominator
    spot_vol: Decimal,
}

fn out_of_range(what: &str) -> PricingError {
    PricingError::DomainError(format!("{what} is outside the decimal range"))
}

fn compute_bs_params(spec: &OptionSpec) -> PricingResult<BsParams> {
    let (s, k, t) = (spec.spot, spec.strike, spec.time_to_maturity);
    let (r, sigma) = (spec.risk_free_rate, spec.volatility);
    let sqrt_t = sqrt_decimal(t);
    let sigma_sqrt_t = sigma
        .checked_mul(sqrt_t)
        .ok_or_else(|| out_of_range("sigma * sqrt(T)"))?;
    if sigma_sqrt_t.is_zero() {
        return Err(PricingError::DivisionByZero {
            context: "d1: volatility * sqrt(T) rounds to zero".into(),
        });
    }

    let moneyness = s.checked_div(k).ok_or_else(|| out_of_range("spot / strike"))?;
    let drift = sigma
        .checked_mul(sigma)
        .and_then(|var| r.checked_add(var / Decimal::TWO))
        .and_then(|mu| mu.checked_mul(t))
        .ok_or_else(|| out_of_range("(r + sigma^2 / 2) * T"))?;
    let d1 = ln_decimal(moneyness)
        .checked_add(drift)
        .and_then(|num| num.checked_div(sigma_sqrt_t))
        .ok_or_else(|| out_of_range("d1"))?;

    let rt = r.checked_mul(t).ok_or_else(|| out_of_range("r * T"))?;
    let discounted_strike = k
        .checked_mul(exp_decimal(-rt)?)
        .ok_or_else(|| out_of_range("K * exp(-rT)"))?;

    let spot_vol = s
        .checked_mul(sigma_sqrt_t)
        .ok_or_else(|| out_of_range("S * sigma * sqrt(T)"))?;
    if spot_vol.is_zero() {
        return Err(PricingError::DivisionByZero {
            context: "gamma: spot * volatility * sqrt(T) rounds to zero".into(),
        });
    }

    let d2 = d1.checked_sub(sigma_sqrt_t).ok_or_else(|| out_of_range("d2"))?;

    Ok(BsParams {
        d1,
        d2,
        sqrt_t,
        discounted_strike,
        spot_vol,
    })
}

fn validate_spec(spec: &OptionSpec) -> PricingResult<()> {
    if spec.strike <= Decimal::ZERO {
        return Err(PricingError::invalid("strike", "Strike must be positive"));
    }
    if spec.volatility <= Decimal::ZERO {
        return Err(PricingError::invalid("volatility", "Volatility must be positive"));
    }
    if spec.time_to_maturity < Decimal::ZERO {
        return Err(PricingError::invalid(
            "time_to_maturity",
            "Time to maturity must be non-negative",
        ));
    }
    if spec.spot < Decimal::ZERO {
        return Err(PricingError::invalid("spot", "Spot must be non-negative"));
    }
    if spec.spot.is_zero() && spec.time_to_maturity > Decimal::ZERO {
        return Err(PricingError::invalid(
            "spot",
            "Spot must be positive before expiry (ln(S/K) is undefined)",
        ));
    }
    if let Some(premium) = spec.transaction_price {
        if premium < Decimal::ZERO {
            return Err(PricingError::invalid(
                "transaction_price",
                "Transaction price must be non-negative",
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// European call or put under Black-Scholes.
///
/// d1, d2 and the discounted strike are computed once in `new`, so inputs
/// that leave the Decimal range fail there and every accessor after it is
/// infallible. At `time_to_maturity == 0` the price is the intrinsic value,
/// delta is the limiting step and the remaining Greeks are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct EuropeanOption {
    spec: OptionSpec,
    kind: OptionKind,
    /// `None` at expiry.
    params: Option<BsParams>,
}

impl EuropeanOption {
    pub fn new(spec: OptionSpec, kind: OptionKind) -> PricingResult<Self> {
        validate_spec(&spec)?;
        let params = if spec.time_to_maturity.is_zero() {
            None
        } else {
            Some(compute_bs_params(&spec)?)
        };
        tracing::debug!(
            ?kind,
            spot = %spec.spot,
            strike = %spec.strike,
            time_to_maturity = %spec.time_to_maturity,
            "option engine constructed"
        );
        Ok(Self { spec, kind, params })
    }

    pub fn call(spec: OptionSpec) -> PricingResult<Self> {
        Self::new(spec, OptionKind::Call)
    }

    pub fn put(spec: OptionSpec) -> PricingResult<Self> {
        Self::new(spec, OptionKind::Put)
    }

    pub fn spec(&self) -> &OptionSpec {
        &self.spec
    }

    pub fn kind(&self) -> OptionKind {
        self.kind
    }

    pub fn strike(&self) -> Money {
        self.spec.strike
    }

    pub fn is_expired(&self) -> bool {
        self.spec.time_to_maturity.is_zero()
    }

    /// Same contract under new market inputs (spot, rate, volatility).
    pub fn with_market(&self, spot: Money, rate: Rate, volatility: Rate) -> PricingResult<Self> {
        let spec = OptionSpec {
            spot,
            risk_free_rate: rate,
            volatility,
            ..self.spec.clone()
        };
        Self::new(spec, self.kind)
    }

    /// K * exp(-rT); the strike itself at expiry.
    pub fn discounted_strike(&self) -> Money {
        match &self.params {
            Some(p) => p.discounted_strike,
            None => self.spec.strike,
        }
    }

    /// (d1, d2). Undefined at expiry.
    pub fn d1_d2(&self) -> PricingResult<(Decimal, Decimal)> {
        match &self.params {
            Some(p) => Ok((p.d1, p.d2)),
            None => Err(PricingError::invalid(
                "time_to_maturity",
                "d1/d2 are undefined at expiry (T = 0)",
            )),
        }
    }

    pub fn price(&self) -> Money {
        let Some(p) = &self.params else {
            return self.payoff_long(self.spec.spot);
        };
        let (s, dk) = (self.spec.spot, p.discounted_strike);
        match self.kind {
            OptionKind::Call => s * norm_cdf(p.d1) - dk * norm_cdf(p.d2),
            OptionKind::Put => dk * norm_cdf(-p.d2) - s * norm_cdf(-p.d1),
        }
    }

    /// Intrinsic value at the current spot.
    pub fn intrinsic_value(&self) -> Money {
        self.payoff_long(self.spec.spot)
    }

    pub fn payoff_long(&self, spot_at_expiry: Money) -> Money {
        let k = self.spec.strike;
        match self.kind {
            OptionKind::Call => (spot_at_expiry - k).max(Decimal::ZERO),
            OptionKind::Put => (k - spot_at_expiry).max(Decimal::ZERO),
        }
    }

    pub fn payoff_short(&self, spot_at_expiry: Money) -> Money {
        -self.payoff_long(spot_at_expiry)
    }

    pub fn payoff(&self, spot_at_expiry: Money, position: Position) -> Money {
        position.apply(self.payoff_long(spot_at_expiry))
    }

    /// Mark-to-model PnL against the transaction price, if one was recorded.
    pub fn pnl(&self, position: Position) -> Option<Money> {
        self.spec
            .transaction_price
            .map(|paid| position.apply(self.price() - paid))
    }

    pub fn delta(&self, position: Position) -> Decimal {
        let long = match &self.params {
            Some(p) => match self.kind {
                OptionKind::Call => norm_cdf(p.d1),
                OptionKind::Put => norm_cdf(p.d1) - Decimal::ONE,
            },
            None => self.expiry_delta(),
        };
        position.apply(long)
    }

    /// Sign-invariant: the same for Long and Short.
    pub fn gamma(&self, _position: Position) -> Decimal {
        match &self.params {
            Some(p) => norm_pdf(p.d1) / p.spot_vol,
            None => Decimal::ZERO,
        }
    }

    pub fn vega(&self, position: Position) -> Decimal {
        match &self.params {
            Some(p) => position.apply(self.spec.spot * norm_pdf(p.d1) * p.sqrt_t),
            None => Decimal::ZERO,
        }
    }

    pub fn theta(&self, position: Position) -> Decimal {
        let Some(p) = &self.params else {
            return Decimal::ZERO;
        };
        let (s, r) = (self.spec.spot, self.spec.risk_free_rate);
        let decay = -s * norm_pdf(p.d1) * self.spec.volatility / (Decimal::TWO * p.sqrt_t);
        let carry = match self.kind {
            OptionKind::Call => r * p.discounted_strike * norm_cdf(p.d2),
            OptionKind::Put => r * p.discounted_strike * norm_cdf(-p.d2),
        };
        position.apply(decay - carry)
    }

    pub fn rho(&self, position: Position) -> Decimal {
        let Some(p) = &self.params else {
            return Decimal::ZERO;
        };
        let kt_df = p.discounted_strike * self.spec.time_to_maturity;
        let long = match self.kind {
            OptionKind::Call => kt_df * norm_cdf(p.d2),
            OptionKind::Put => -kt_df * norm_cdf(-p.d2),
        };
        position.apply(long)
    }

    pub fn greeks(&self, position: Position) -> Greeks {
        Greeks {
            delta: self.delta(position),
            gamma: self.gamma(position),
            vega: self.vega(position),
            theta: self.theta(position),
            rho: self.rho(position),
        }
    }

    fn expiry_delta(&self) -> Decimal {
        let (s, k) = (self.spec.spot, self.spec.strike);
        match self.kind {
            OptionKind::Call if s > k => Decimal::ONE,
            OptionKind::Put if s < k => Decimal::NEGATIVE_ONE,
            _ => Decimal::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Moneyness and breakeven helpers
// ---------------------------------------------------------------------------

fn classify_moneyness(s: Decimal, k: Decimal, kind: OptionKind) -> String {
    let ratio = s / k;
    // ATM band: within 1% of strike
    let atm_lo = dec!(0.99);
    let atm_hi = dec!(1.01);
    let label = if ratio >= atm_lo && ratio <= atm_hi {
        "ATM"
    } else {
        match (kind, ratio > atm_hi) {
            (OptionKind::Call, true) | (OptionKind::Put, false) => "ITM",
            _ => "OTM",
        }
    };
    label.into()
}

fn breakeven(k: Decimal, premium: Decimal, kind: OptionKind) -> Decimal {
    match kind {
        OptionKind::Call => k + premium,
        OptionKind::Put => k - premium,
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn price_option(spec: &OptionSpec, kind: OptionKind) -> PricingResult<Money> {
    Ok(EuropeanOption::new(spec.clone(), kind)?.price())
}

/// Price, Greeks, PnL and payoff profile of a single option position.
pub fn analyze_option(
    input: &OptionAnalysisInput,
) -> PricingResult<ComputationOutput<OptionAnalysis>> {
    let start = Instant::now();
    let option = EuropeanOption::new(input.option.clone(), input.kind)?;
    let spec = option.spec();
    let mut warnings: Vec<String> = Vec::new();

    if option.is_expired() {
        tracing::warn!(kind = ?input.kind, "option priced at expiry; reporting intrinsic value");
        warnings.push(
            "Time to maturity is zero: price is intrinsic value and Greeks are limiting values"
                .into(),
        );
    }

    let price = option.price();
    let intrinsic_value = option.intrinsic_value();

    // C - P = S - K * e^(-rT)
    let forward_gap = spec.spot - option.discounted_strike();
    let put_call_parity_price = match input.kind {
        OptionKind::Call => price - forward_gap,
        OptionKind::Put => price + forward_gap,
    };

    let range = input.payoff_range.unwrap_or_else(|| {
        option_spot_range(spec.spot, spec.volatility, spec.time_to_maturity)
    });
    let payoff_table = payoff_table(&range, |s| option.payoff_long(s));

    let output = OptionAnalysis {
        kind: input.kind,
        position: input.position,
        price,
        intrinsic_value,
        time_value: price - intrinsic_value,
        greeks: option.greeks(input.position),
        pnl: option.pnl(input.position),
        moneyness: classify_moneyness(spec.spot, spec.strike, input.kind),
        breakeven: breakeven(spec.strike, price, input.kind),
        put_call_parity_price,
        payoff_table,
    };

    let assumptions = serde_json::json!({
        "model": "Black-Scholes (no dividends)",
        "risk_free_rate": spec.risk_free_rate.to_string(),
        "volatility": spec.volatility.to_string(),
        "position": format!("{:?}", input.position),
        "greeks": "raw partial derivatives (annual theta, vega per unit vol, rho per unit rate)",
    });

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Black-Scholes (closed-form)",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
