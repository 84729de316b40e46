use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::error::PricingError;
use crate::math::{exp_decimal, pow_decimal};
use crate::types::{with_metadata, ComputationOutput, Money, Rate, Years};
use crate::PricingResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Compounding convention used to discount coupon payments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compounding {
    #[serde(alias = "continuous")]
    Continuous,
    #[default]
    #[serde(alias = "discrete")]
    Discrete,
}

impl FromStr for Compounding {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continuous" | "continue" => Ok(Compounding::Continuous),
            "discrete" | "discrète" | "discrete-compounding" => Ok(Compounding::Discrete),
            other => Err(PricingError::InvalidParameter {
                field: "compounding".into(),
                reason: format!("unsupported compounding mode '{other}'; use continuous or discrete"),
            }),
        }
    }
}

impl fmt::Display for Compounding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compounding::Continuous => write!(f, "continuous"),
            Compounding::Discrete => write!(f, "discrete"),
        }
    }
}

/// Fixed-coupon bullet bond.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondSpec {
    /// Par / face value of the bond (e.g. 1000)
    pub face_value: Money,
    /// Annual coupon rate as a decimal (0.05 = 5%)
    pub coupon_rate: Rate,
    /// Yield to maturity as a decimal
    pub ytm: Rate,
    /// Years remaining until maturity
    pub maturity: Years,
    /// Coupon payments per year: 1, 2, 4 or 12
    #[serde(default = "default_frequency")]
    pub frequency: u8,
    #[serde(default)]
    pub compounding: Compounding,
}

fn default_frequency() -> u8 {
    1
}

/// One scheduled bond payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondCashFlow {
    /// Payment time in years
    pub time: Years,
    pub amount: Money,
    pub present_value: Money,
}

/// Full set of bond analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondAnalytics {
    pub price: Money,
    pub macaulay_duration: Decimal,
    pub modified_duration: Decimal,
    pub convexity: Decimal,
    pub coupon_periods: u32,
    pub cash_flows: Vec<BondCashFlow>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Discounted cash-flow engine for a validated [`BondSpec`].
///
/// Coupons are discounted with the selected compounding convention; the face
/// value is always discounted with annual compounding, `F / (1 + ytm)^T`.
/// Coupon periods are `floor(maturity * frequency)`; any fractional remainder
/// is settled with the face value at maturity.
///
/// The discounted schedule is built once in `new`. A yield and maturity whose
/// discount factor leaves the Decimal range is a `DomainError` there.
#[derive(Debug, Clone)]
pub struct BondEngine {
    spec: BondSpec,
    /// (t, PV) for each coupon date t = k / frequency.
    coupons: Vec<(Years, Money)>,
    face_pv: Money,
}

impl BondEngine {
    pub fn new(spec: BondSpec) -> PricingResult<Self> {
        validate_spec(&spec)?;
        let mut engine = Self {
            spec,
            coupons: Vec::new(),
            face_pv: Decimal::ZERO,
        };
        engine.coupons = engine.discount_coupons()?;
        engine.face_pv = engine.discount_face_value()?;
        tracing::debug!(
            face_value = %engine.spec.face_value,
            ytm = %engine.spec.ytm,
            maturity = %engine.spec.maturity,
            frequency = engine.spec.frequency,
            compounding = %engine.spec.compounding,
            "bond engine constructed"
        );
        Ok(engine)
    }

    pub fn spec(&self) -> &BondSpec {
        &self.spec
    }

    /// Number of whole coupon periods, floor(maturity * frequency).
    pub fn coupon_periods(&self) -> u32 {
        self.coupons.len() as u32
    }

    /// Coupon paid each period.
    pub fn coupon_amount(&self) -> Money {
        self.spec.coupon_rate * self.spec.face_value / self.frequency()
    }

    /// Present value of `cash_flow` paid at time `t` (years).
    pub fn discount(&self, cash_flow: Money, t: Years) -> PricingResult<Money> {
        let ytm = self.spec.ytm;
        match self.spec.compounding {
            Compounding::Continuous => {
                let rate_time = ytm.checked_mul(t).ok_or_else(|| discount_out_of_range(t))?;
                Ok(cash_flow * exp_decimal(-rate_time)?)
            }
            Compounding::Discrete => {
                let freq = self.frequency();
                // k/f * f can come back as 0.99..96; snap it so whole periods use pow_int
                let periods = (freq * t).round_dp(18);
                let growth = (ytm / freq)
                    .checked_add(Decimal::ONE)
                    .ok_or_else(|| discount_out_of_range(t))
                    .and_then(|base| pow_decimal(base, periods))
                    .map_err(|_| discount_out_of_range(t))?;
                Ok(cash_flow / growth)
            }
        }
    }

    /// Face value discounted with annual compounding.
    pub fn discounted_face_value(&self) -> Money {
        self.face_pv
    }

    pub fn price(&self) -> Money {
        let coupons: Money = self.discounted_coupons().map(|(_, pv)| pv).sum();
        coupons + self.face_pv
    }

    /// Macaulay duration: present-value-weighted average time of cash flows.
    pub fn duration(&self) -> PricingResult<Decimal> {
        let weighted: Decimal = self.discounted_coupons().map(|(t, pv)| t * pv).sum();
        let numerator = weighted + self.spec.maturity * self.discounted_face_value();
        self.per_unit_price(numerator, "Macaulay duration")
    }

    pub fn modified_duration(&self) -> PricingResult<Decimal> {
        let macaulay = self.duration()?;
        match self.spec.compounding {
            Compounding::Continuous => Ok(macaulay),
            Compounding::Discrete => {
                Ok(macaulay / (Decimal::ONE + self.spec.ytm / self.frequency()))
            }
        }
    }

    /// Convexity: t^2 weights under continuous compounding, t*(t+1) under
    /// discrete compounding, divided by price.
    pub fn convexity(&self) -> PricingResult<Decimal> {
        let weight = |t: Decimal| match self.spec.compounding {
            Compounding::Continuous => t * t,
            Compounding::Discrete => t * (t + Decimal::ONE),
        };
        let coupons: Decimal = self.discounted_coupons().map(|(t, pv)| weight(t) * pv).sum();
        let numerator = coupons + weight(self.spec.maturity) * self.discounted_face_value();
        self.per_unit_price(numerator, "convexity")
    }

    /// Payment schedule matching `price()`: one entry per coupon date, with
    /// the face value folded into the final coupon when it falls on maturity
    /// and paid as a separate entry otherwise.
    pub fn cash_flows(&self) -> Vec<BondCashFlow> {
        let coupon = self.coupon_amount();
        let mut flows: Vec<BondCashFlow> = self
            .discounted_coupons()
            .map(|(time, present_value)| BondCashFlow {
                time,
                amount: coupon,
                present_value,
            })
            .collect();

        let face = self.spec.face_value;
        let face_pv = self.discounted_face_value();
        match flows.last_mut() {
            Some(last) if last.time == self.spec.maturity => {
                last.amount += face;
                last.present_value += face_pv;
            }
            _ => flows.push(BondCashFlow {
                time: self.spec.maturity,
                amount: face,
                present_value: face_pv,
            }),
        }
        flows
    }

    fn frequency(&self) -> Decimal {
        Decimal::from(self.spec.frequency)
    }

    fn discounted_coupons(&self) -> impl Iterator<Item = (Years, Money)> + '_ {
        self.coupons.iter().copied()
    }

    fn discount_coupons(&self) -> PricingResult<Vec<(Years, Money)>> {
        let freq = self.frequency();
        let coupon = self.coupon_amount();
        let periods = (self.spec.maturity * freq)
            .floor()
            .to_u32()
            .ok_or_else(|| PricingError::invalid("maturity", "Too many coupon periods."))?;
        (1..=periods)
            .map(|k| -> PricingResult<(Years, Money)> {
                let t = Decimal::from(k) / freq;
                Ok((t, self.discount(coupon, t)?))
            })
            .collect()
    }

    fn discount_face_value(&self) -> PricingResult<Money> {
        let maturity = self.spec.maturity;
        let growth = self
            .spec
            .ytm
            .checked_add(Decimal::ONE)
            .ok_or_else(|| discount_out_of_range(maturity))
            .and_then(|base| pow_decimal(base, maturity))
            .map_err(|_| discount_out_of_range(maturity))?;
        Ok(self.spec.face_value / growth)
    }

    fn per_unit_price(&self, numerator: Decimal, context: &str) -> PricingResult<Decimal> {
        let price = self.price();
        if price.is_zero() {
            return Err(PricingError::DivisionByZero {
                context: format!("{context}: bond price is zero"),
            });
        }
        Ok(numerator / price)
    }
}

fn discount_out_of_range(t: Years) -> PricingError {
    PricingError::DomainError(format!(
        "discount factor at t = {t} is outside the decimal range; yield or maturity too large"
    ))
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn price_bond(spec: &BondSpec) -> PricingResult<Money> {
    Ok(BondEngine::new(spec.clone())?.price())
}

pub fn bond_duration(spec: &BondSpec) -> PricingResult<Decimal> {
    BondEngine::new(spec.clone())?.duration()
}

pub fn bond_modified_duration(spec: &BondSpec) -> PricingResult<Decimal> {
    BondEngine::new(spec.clone())?.modified_duration()
}

pub fn bond_convexity(spec: &BondSpec) -> PricingResult<Decimal> {
    BondEngine::new(spec.clone())?.convexity()
}

/// Price, duration, convexity and payment schedule in one envelope.
pub fn analyze_bond(spec: &BondSpec) -> PricingResult<ComputationOutput<BondAnalytics>> {
    let start = Instant::now();
    let engine = BondEngine::new(spec.clone())?;
    let mut warnings: Vec<String> = Vec::new();

    let periods_exact = spec.maturity * Decimal::from(spec.frequency);
    if !periods_exact.fract().is_zero() {
        tracing::warn!(%periods_exact, "fractional coupon period count");
        warnings.push(format!(
            "maturity x frequency = {periods_exact} is fractional; the remainder is settled at maturity"
        ));
    }

    let output = BondAnalytics {
        price: engine.price(),
        macaulay_duration: engine.duration()?,
        modified_duration: engine.modified_duration()?,
        convexity: engine.convexity()?,
        coupon_periods: engine.coupon_periods(),
        cash_flows: engine.cash_flows(),
    };

    let assumptions = serde_json::json!({
        "compounding": spec.compounding.to_string(),
        "frequency": spec.frequency,
        "face_value_discounting": "annual compounding, F / (1 + ytm)^T",
        "settlement": "assumed on a coupon date (no accrued interest)",
    });

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Discounted cash flow bond pricing with Macaulay/modified duration and convexity",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_spec(spec: &BondSpec) -> PricingResult<()> {
    if spec.face_value <= Decimal::ZERO {
        return Err(PricingError::invalid("face_value", "Face value must be positive."));
    }
    if spec.coupon_rate < Decimal::ZERO {
        return Err(PricingError::invalid(
            "coupon_rate",
            "Coupon rate must be non-negative.",
        ));
    }
    if spec.ytm < Decimal::ZERO {
        return Err(PricingError::invalid("ytm", "Yield to maturity must be non-negative."));
    }
    if spec.maturity <= Decimal::ZERO {
        return Err(PricingError::invalid("maturity", "Maturity must be positive."));
    }
    if !matches!(spec.frequency, 1 | 2 | 4 | 12) {
        return Err(PricingError::invalid(
            "frequency",
            "Coupon frequency must be 1, 2, 4, or 12.",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
