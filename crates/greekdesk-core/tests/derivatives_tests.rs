use greekdesk_core::derivatives::composite::{
    CompositeAnalysisInput, CompositeInstrument, CompositeLeg, LegMarket, price_composite,
};
use greekdesk_core::derivatives::forwards::{self, ForwardAnalysisInput, ForwardSpec};
use greekdesk_core::derivatives::options::{
    self, EuropeanOption, OptionAnalysisInput, OptionKind, OptionSpec,
};
use greekdesk_core::math::exp_decimal;
use greekdesk_core::{Position, PricingError};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn spec(spot: Decimal, strike: Decimal, t: Decimal, r: Decimal, sigma: Decimal) -> OptionSpec {
    OptionSpec {
        spot,
        strike,
        time_to_maturity: t,
        risk_free_rate: r,
        volatility: sigma,
        transaction_price: None,
    }
}

fn market() -> LegMarket {
    LegMarket {
        spot: dec!(100),
        time_to_maturity: dec!(1),
        risk_free_rate: dec!(0.05),
        volatility: dec!(0.20),
    }
}

// ===========================================================================
// Options
// ===========================================================================

#[test]
fn test_reference_call() {
    let call = EuropeanOption::call(spec(dec!(100), dec!(100), dec!(1), dec!(0.05), dec!(0.20)))
        .unwrap();
    assert!((call.price() - dec!(10.45)).abs() <= dec!(0.01));
    assert!((call.delta(Position::Long) - dec!(0.637)).abs() <= dec!(0.01));
}

#[test]
fn test_put_call_parity_across_strikes() {
    for strike in [dec!(80), dec!(95), dec!(100), dec!(120)] {
        let s = spec(dec!(100), strike, dec!(0.75), dec!(0.04), dec!(0.30));
        let c = options::price_option(&s, OptionKind::Call).unwrap();
        let p = options::price_option(&s, OptionKind::Put).unwrap();
        let rhs = dec!(100) - strike * exp_decimal(dec!(-0.03)).unwrap();
        assert!(
            (c - p - rhs).abs() <= dec!(0.000001),
            "parity broken at K={strike}: C-P={}, rhs={rhs}",
            c - p
        );
    }
}

#[test]
fn test_immediate_expiry() {
    let s = spec(dec!(110), dec!(100), Decimal::ZERO, dec!(0.05), dec!(0.20));
    assert_eq!(options::price_option(&s, OptionKind::Call).unwrap(), dec!(10));
}

#[test]
fn test_short_greeks_mirror_long() {
    let put = EuropeanOption::put(spec(dec!(95), dec!(100), dec!(0.5), dec!(0.03), dec!(0.25)))
        .unwrap();
    let long = put.greeks(Position::Long);
    let short = put.greeks(Position::Short);
    assert_eq!(short.gamma, long.gamma);
    assert_eq!(short.delta, -long.delta);
    assert_eq!(short.theta, -long.theta);
}

// ===========================================================================
// Forwards
// ===========================================================================

#[test]
fn test_forward_payoff_symmetry() {
    let f = ForwardSpec {
        spot: dec!(50),
        maturity: dec!(2),
        interest_rate: dec!(0.03),
        dividend_yield: dec!(0.01),
    };
    for s_t in [dec!(30), dec!(52), dec!(80)] {
        let long = forwards::forward_payoff_long(&f, s_t).unwrap();
        let short = forwards::forward_payoff_short(&f, s_t).unwrap();
        assert_eq!(long + short, Decimal::ZERO);
    }
}

// ===========================================================================
// Composites
// ===========================================================================

#[test]
fn test_straddle_delta_is_sum_of_legs() {
    let straddle = CompositeInstrument::straddle(&market(), dec!(100)).unwrap();
    let call = EuropeanOption::call(spec(dec!(100), dec!(100), dec!(1), dec!(0.05), dec!(0.20)))
        .unwrap();
    let put = EuropeanOption::put(spec(dec!(100), dec!(100), dec!(1), dec!(0.05), dec!(0.20)))
        .unwrap();
    assert_eq!(
        straddle.delta(Position::Long),
        call.delta(Position::Long) + put.delta(Position::Long)
    );
}

#[test]
fn test_call_spread_within_bounds() {
    let spread = CompositeInstrument::call_spread(&market(), dec!(95), dec!(105)).unwrap();
    let price = spread.price();
    let upper = dec!(10) * exp_decimal(dec!(-0.05)).unwrap();
    assert!(price >= Decimal::ZERO && price <= upper, "spread price {price}");
}

#[test]
fn test_call_spread_rejects_swapped_strikes() {
    let err = CompositeInstrument::call_spread(&market(), dec!(105), dec!(95)).unwrap_err();
    assert!(matches!(err, PricingError::InvalidParameter { .. }));
}

#[test]
fn test_price_composite_matches_packaged_strangle() {
    let strangle = CompositeInstrument::strangle(&market(), dec!(110), dec!(90)).unwrap();
    let legs = vec![
        CompositeLeg::new(
            EuropeanOption::call(spec(dec!(100), dec!(110), dec!(1), dec!(0.05), dec!(0.20)))
                .unwrap(),
            Decimal::ONE,
        )
        .unwrap(),
        CompositeLeg::new(
            EuropeanOption::put(spec(dec!(100), dec!(90), dec!(1), dec!(0.05), dec!(0.20)))
                .unwrap(),
            Decimal::ONE,
        )
        .unwrap(),
    ];
    assert_eq!(price_composite(legs).unwrap(), strangle.price());
}

// ===========================================================================
// Extreme inputs
// ===========================================================================

#[test]
fn test_overflowing_inputs_return_errors() {
    let forward = ForwardSpec {
        spot: dec!(100),
        maturity: dec!(70),
        interest_rate: dec!(1),
        dividend_yield: Decimal::ZERO,
    };
    assert!(matches!(
        forwards::price_forward(&forward),
        Err(PricingError::DomainError(_))
    ));

    let tiny_vol = spec(dec!(110), dec!(100), dec!(1), dec!(0.05), dec!(0.0000000000000001));
    let price = options::price_option(&tiny_vol, OptionKind::Call).unwrap();
    let floor = dec!(110) - dec!(100) * exp_decimal(dec!(-0.05)).unwrap();
    assert_eq!(price, floor);

    let rate_overflow = spec(dec!(100), dec!(100), dec!(100), dec!(-1), dec!(0.2));
    assert!(matches!(
        options::price_option(&rate_overflow, OptionKind::Put),
        Err(PricingError::DomainError(_))
    ));
}

#[test]
fn test_payoff_range_from_json_is_validated() {
    let option = r#"{
        "option": {"spot": "100", "strike": "100", "time_to_maturity": "1",
                   "risk_free_rate": "0.05", "volatility": "0.2"},
        "kind": "Call",
        "payoff_range": {"low": "-50", "high": "-100", "steps": 3}
    }"#;
    assert!(serde_json::from_str::<OptionAnalysisInput>(option).is_err());

    let forward = r#"{
        "forward": {"spot": "100", "maturity": "1", "interest_rate": "0.05"},
        "payoff_range": {"low": "0", "high": "200", "steps": 4000000000}
    }"#;
    assert!(serde_json::from_str::<ForwardAnalysisInput>(forward).is_err());

    let composite = r#"{
        "instrument": {
            "strategy": "straddle",
            "market": {"spot": "100", "time_to_maturity": "1",
                       "risk_free_rate": "0.05", "volatility": "0.2"},
            "strike": "100"
        },
        "payoff_range": {"low": "120", "high": "80", "steps": 4}
    }"#;
    assert!(serde_json::from_str::<CompositeAnalysisInput>(composite).is_err());

    let valid = option.replace(r#""low": "-50", "high": "-100""#, r#""low": "50", "high": "150""#);
    let input: OptionAnalysisInput = serde_json::from_str(&valid).unwrap();
    let out = options::analyze_option(&input).unwrap();
    assert_eq!(out.result.payoff_table.len(), 4);
    assert_eq!(out.result.payoff_table[0].spot, dec!(50));
    assert!((out.result.payoff_table[3].spot - dec!(150)).abs() < dec!(0.000001));
}
