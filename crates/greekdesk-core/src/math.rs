//! Decimal math helpers shared by the pricing modules.
//!
//! Everything stays in `Decimal`; no round-trips through f64.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::PricingError;
use crate::PricingResult;

const LN2: Decimal = dec!(0.6931471805599453094172321215);
const SQRT_TWO_PI: Decimal = dec!(2.5066282746310002416123552393);
const PDF_CUTOFF: Decimal = dec!(40);

fn overflow(op: &str, arg: Decimal) -> PricingError {
    PricingError::DomainError(format!("{op}({arg}) overflows the decimal range"))
}

/// Taylor series exp(x) with range reduction.
///
/// For large |x| we use exp(x) = exp(x/2^k)^(2^k) to bring the argument into
/// [-2, 2], where 25 Taylor terms are plenty, then square the result k times.
/// Large negative arguments underflow to zero; large positive ones are a
/// `DomainError` rather than a panic.
pub fn exp_decimal(x: Decimal) -> PricingResult<Decimal> {
    let mut k: u32 = 0;
    let mut reduced = x;
    while reduced.abs() > Decimal::TWO {
        reduced /= Decimal::TWO;
        k += 1;
    }

    let mut sum = exp_taylor(reduced);
    for _ in 0..k {
        sum = sum
            .checked_mul(sum)
            .ok_or_else(|| overflow("exp", x))?;
    }
    Ok(sum)
}

/// 25-term Taylor sum; only called with |x| <= 2.
fn exp_taylor(x: Decimal) -> Decimal {
    let mut sum = Decimal::ONE;
    let mut term = Decimal::ONE;
    for n in 1..=25u64 {
        term *= x / Decimal::from(n);
        sum += term;
    }
    sum
}

/// Natural logarithm.
///
/// x is scaled by powers of two into [1, 2), so ln(x) = k*ln2 + ln(m), and
/// ln(m) comes from Newton's method on f(y) = exp(y) - m:
///
///   y_{n+1} = y_n - 1 + m / exp(y_n)
///
/// Callers validate positivity; non-positive input returns zero.
pub fn ln_decimal(x: Decimal) -> Decimal {
    if x <= Decimal::ZERO || x == Decimal::ONE {
        return Decimal::ZERO;
    }

    let mut scale = Decimal::ZERO;
    let mut m = x;
    while m >= Decimal::TWO {
        m /= Decimal::TWO;
        scale += LN2;
    }
    while m < Decimal::ONE {
        m *= Decimal::TWO;
        scale -= LN2;
    }

    let mut guess = Decimal::ZERO;
    for _ in 0..40 {
        let next = guess - Decimal::ONE + m / exp_taylor(guess);
        if next == guess {
            break;
        }
        guess = next;
    }

    scale + guess
}

/// Newton's method square root, iterated until the estimate stops moving.
pub fn sqrt_decimal(x: Decimal) -> Decimal {
    if x <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    if x == Decimal::ONE {
        return Decimal::ONE;
    }

    // Start above the root so the iteration decreases monotonically.
    let mut guess = if x > Decimal::ONE { x } else { Decimal::ONE };
    for _ in 0..200 {
        let next = (guess + x / guess) / Decimal::TWO;
        if next >= guess {
            break;
        }
        guess = next;
    }
    guess
}

/// Integer power via exponentiation by squaring (avoids powd precision drift).
pub fn pow_int(base: Decimal, exp: u32) -> PricingResult<Decimal> {
    let mut result = Decimal::ONE;
    let mut b = base;
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result = result
                .checked_mul(b)
                .ok_or_else(|| overflow("pow", base))?;
        }
        e >>= 1;
        if e > 0 {
            b = b.checked_mul(b).ok_or_else(|| overflow("pow", base))?;
        }
    }
    Ok(result)
}

/// base^exponent for a positive base and any real exponent.
///
/// Whole non-negative exponents go through `pow_int`; everything else uses
/// exp(exponent * ln(base)).
pub fn pow_decimal(base: Decimal, exponent: Decimal) -> PricingResult<Decimal> {
    if exponent.is_zero() || base == Decimal::ONE {
        return Ok(Decimal::ONE);
    }
    if exponent.fract().is_zero() && exponent > Decimal::ZERO {
        if let Some(n) = exponent.to_u32() {
            return pow_int(base, n);
        }
    }
    let log = exponent
        .checked_mul(ln_decimal(base))
        .ok_or_else(|| overflow("pow", base))?;
    exp_decimal(log)
}

/// Standard normal PDF: phi(x) = exp(-x^2/2) / sqrt(2*pi)
///
/// Zero once |x| passes `PDF_CUTOFF`, where the density is below the
/// smallest Decimal anyway and x^2 could overflow.
pub fn norm_pdf(x: Decimal) -> Decimal {
    if x.abs() > PDF_CUTOFF {
        return Decimal::ZERO;
    }
    // non-positive argument: exp cannot overflow
    exp_decimal(-(x * x) / Decimal::TWO).unwrap_or(Decimal::ZERO) / SQRT_TWO_PI
}

/// Standard normal CDF using the Abramowitz & Stegun 26.2.17 approximation.
///
/// Phi(x) = 1 - phi(x) * (b1*t + b2*t^2 + b3*t^3 + b4*t^4 + b5*t^5),
/// t = 1 / (1 + 0.2316419 * |x|), and Phi(x) = 1 - Phi(-x) for x < 0.
pub fn norm_cdf(x: Decimal) -> Decimal {
    let b1 = dec!(0.319381530);
    let b2 = dec!(-0.356563782);
    let b3 = dec!(1.781477937);
    let b4 = dec!(-1.821255978);
    let b5 = dec!(1.330274429);
    let p = dec!(0.2316419);

    let abs_x = x.abs();
    let t = Decimal::ONE / (Decimal::ONE + p * abs_x);
    let poly = t * (b1 + t * (b2 + t * (b3 + t * (b4 + t * b5))));
    let cdf_pos = Decimal::ONE - norm_pdf(abs_x) * poly;

    if x < Decimal::ZERO {
        Decimal::ONE - cdf_pos
    } else {
        cdf_pos
    }
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
    fn test_exp_decimal() {
        assert_eq!(exp_decimal(Decimal::ZERO).unwrap(), Decimal::ONE);
        assert_close(exp_decimal(dec!(1)).unwrap(), dec!(2.718281828459045), dec!(0.000000001));
        assert_close(exp_decimal(dec!(-0.05)).unwrap(), dec!(0.951229424500714), dec!(0.000000001));
        assert_close(exp_decimal(dec!(5)).unwrap(), dec!(148.4131591025766), dec!(0.0000001));
    }

    #[test]
    fn test_exp_decimal_large_negative_underflows_to_zero() {
        assert!(exp_decimal(dec!(-100000)).unwrap() < dec!(0.0000000001));
    }

    #[test]
    fn test_exp_decimal_overflow_is_domain_error() {
        assert!(exp_decimal(dec!(60)).is_ok());
        assert!(matches!(exp_decimal(dec!(70)), Err(PricingError::DomainError(_))));
        assert!(matches!(exp_decimal(dec!(100000000000000000000)), Err(PricingError::DomainError(_))));
    }

    #[test]
    fn test_ln_decimal() {
        assert_eq!(ln_decimal(Decimal::ONE), Decimal::ZERO);
        assert_close(ln_decimal(dec!(2.718281828459045)), dec!(1), dec!(0.000000001));
        assert_close(ln_decimal(dec!(1.1)), dec!(0.0953101798043249), dec!(0.000000001));
        assert_close(ln_decimal(dec!(0.5)), dec!(-0.6931471805599453), dec!(0.000000001));
        assert_close(ln_decimal(dec!(1024)), dec!(6.931471805599453), dec!(0.000000001));
    }

    #[test]
    fn test_ln_decimal_near_decimal_max() {
        // ln(7.9e28) = 66.5393...
        assert_close(ln_decimal(dec!(79000000000000000000000000000)), dec!(66.539), dec!(0.001));
    }

    #[test]
    fn test_sqrt_decimal() {
        assert_close(sqrt_decimal(dec!(4)), dec!(2), dec!(0.0000000001));
        assert_close(sqrt_decimal(dec!(0.04)), dec!(0.2), dec!(0.0000000001));
        assert_close(sqrt_decimal(dec!(0.0000000001)), dec!(0.00001), dec!(0.0000000001));
        assert_eq!(sqrt_decimal(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_pow_int_and_fraction() {
        assert_eq!(pow_int(dec!(1.03), 0).unwrap(), Decimal::ONE);
        assert_close(pow_int(dec!(1.03), 10).unwrap(), dec!(1.343916379), dec!(0.000000001));
        assert_close(pow_decimal(dec!(1.03), dec!(10)).unwrap(), dec!(1.343916379), dec!(0.000000001));
        // 1.05^2.5 = 1.129726...
        assert_close(pow_decimal(dec!(1.05), dec!(2.5)).unwrap(), dec!(1.129726322), dec!(0.000000001));
    }

    #[test]
    fn test_pow_overflow_is_domain_error() {
        // 2^96 > Decimal::MAX
        assert!(matches!(pow_int(dec!(2), 100), Err(PricingError::DomainError(_))));
        assert!(matches!(pow_decimal(dec!(2), dec!(100.5)), Err(PricingError::DomainError(_))));
        assert!(pow_int(dec!(2), 90).is_ok());
    }

    #[test]
    fn test_norm_cdf() {
        assert_close(norm_cdf(Decimal::ZERO), dec!(0.5), dec!(0.0000001));
        assert_close(norm_cdf(dec!(1.96)), dec!(0.9750021), dec!(0.000001));
        assert_close(norm_cdf(dec!(-1.96)), dec!(0.0249979), dec!(0.000001));
        assert!(norm_cdf(dec!(8)) > dec!(0.9999999));
        // Symmetry holds by construction
        assert_close(
            norm_cdf(dec!(0.35)) + norm_cdf(dec!(-0.35)),
            Decimal::ONE,
            dec!(0.00000000000000000001),
        );
    }

    #[test]
    fn test_norm_pdf() {
        assert_close(norm_pdf(Decimal::ZERO), dec!(0.3989422804), dec!(0.0000000001));
        assert_close(norm_pdf(dec!(1)), dec!(0.2419707245), dec!(0.0000000001));
    }

    #[test]
    fn test_norm_tails_with_huge_arguments() {
        let far = dec!(1400000000000000);
        assert_eq!(norm_pdf(far), Decimal::ZERO);
        assert_eq!(norm_cdf(far), Decimal::ONE);
        assert_eq!(norm_cdf(-far), Decimal::ZERO);
    }
}
