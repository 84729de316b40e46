use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

use crate::derivatives::options::{
    analyze_option, OptionAnalysis, OptionAnalysisInput, OptionKind, OptionSpec,
};
use crate::error::PricingError;
use crate::market_data::day_count::TimeToMaturityInput;
use crate::market_data::volatility::{
    average_implied_vol, historical_volatility, TRADING_DAYS_PER_YEAR,
};
use crate::types::*;
use crate::PricingResult;

/// Observed state of one underlying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Last close.
    pub spot_price: Money,
    pub historical_vol: Rate,
    pub implied_vol: Rate,
}

impl MarketSnapshot {
    /// Build a snapshot from daily closes (oldest first) and the implied vol
    /// quotes of the nearest option expiry.
    pub fn from_history(
        name: Option<String>,
        closes: &[Money],
        call_ivs: &[Rate],
        put_ivs: &[Rate],
    ) -> PricingResult<Self> {
        let historical_vol = historical_volatility(closes, TRADING_DAYS_PER_YEAR)?;
        let implied_vol = average_implied_vol(call_ivs, put_ivs)?;
        let spot_price = closes
            .last()
            .copied()
            .ok_or_else(|| PricingError::DataUnavailable("no closing prices".into()))?;
        Ok(Self {
            name,
            spot_price,
            historical_vol,
            implied_vol,
        })
    }
}

/// Source of spot, volatility and risk-free rate.
///
/// Retrieval failures surface as `DataUnavailable`; implementations never
/// substitute defaults for missing data.
pub trait MarketDataProvider: Send + Sync {
    fn snapshot(&self, ticker: &str) -> PricingResult<MarketSnapshot>;

    fn risk_free_rate(&self) -> PricingResult<Rate>;
}

/// In-memory provider, typically loaded from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticMarketData {
    #[serde(default)]
    pub risk_free_rate: Option<Rate>,
    #[serde(default)]
    pub underlyings: HashMap<String, MarketSnapshot>,
}

impl StaticMarketData {
    pub fn new(risk_free_rate: Rate) -> Self {
        Self {
            risk_free_rate: Some(risk_free_rate),
            underlyings: HashMap::new(),
        }
    }

    pub fn with_snapshot(mut self, ticker: impl Into<String>, snapshot: MarketSnapshot) -> Self {
        self.underlyings.insert(ticker.into(), snapshot);
        self
    }
}

impl MarketDataProvider for StaticMarketData {
    fn snapshot(&self, ticker: &str) -> PricingResult<MarketSnapshot> {
        self.underlyings
            .get(ticker)
            .cloned()
            .ok_or_else(|| PricingError::DataUnavailable(format!("no market data for '{ticker}'")))
    }

    fn risk_free_rate(&self) -> PricingResult<Rate> {
        self.risk_free_rate
            .ok_or_else(|| PricingError::DataUnavailable("no risk-free rate loaded".into()))
    }
}

/// Map a snapshot plus time and rate onto option inputs, pricing off the
/// implied volatility.
pub fn to_option_spec(
    underlying: &MarketSnapshot,
    strike: Money,
    time_to_maturity: Years,
    rate: Rate,
    transaction_price: Option<Money>,
) -> OptionSpec {
    OptionSpec {
        spot: underlying.spot_price,
        strike,
        time_to_maturity,
        risk_free_rate: rate,
        volatility: underlying.implied_vol,
        transaction_price,
    }
}

/// An option on a listed underlying, resolved through market data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOptionInput {
    pub market: StaticMarketData,
    pub ticker: String,
    pub kind: OptionKind,
    pub strike: Money,
    pub maturity: TimeToMaturityInput,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_price: Option<Money>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOptionAnalysis {
    pub ticker: String,
    pub snapshot: MarketSnapshot,
    pub risk_free_rate: Rate,
    pub time_to_maturity: Years,
    pub analysis: OptionAnalysis,
}

/// Resolve spot, vol, rate and time from the provider, then run the
/// single-option analysis.
pub fn analyze_market_option(
    provider: &dyn MarketDataProvider,
    input: &MarketOptionInput,
) -> PricingResult<ComputationOutput<MarketOptionAnalysis>> {
    let start = Instant::now();
    let snapshot = provider.snapshot(&input.ticker)?;
    let rate = provider.risk_free_rate()?;
    let ttm = input.maturity.resolve()?;
    tracing::debug!(
        ticker = %input.ticker,
        spot = %snapshot.spot_price,
        implied_vol = %snapshot.implied_vol,
        rate = %rate,
        "market data resolved"
    );

    let option = to_option_spec(
        &snapshot,
        input.strike,
        ttm.years(),
        rate,
        input.transaction_price,
    );
    let inner = analyze_option(&OptionAnalysisInput {
        option,
        kind: input.kind,
        position: input.position,
        payoff_range: None,
    })?;

    let mut warnings = inner.warnings;
    if snapshot.historical_vol > Decimal::ZERO
        && (snapshot.implied_vol - snapshot.historical_vol).abs() > snapshot.historical_vol
    {
        warnings.push(format!(
            "Implied vol {} is far from historical vol {}",
            snapshot.implied_vol, snapshot.historical_vol
        ));
    }

    let output = MarketOptionAnalysis {
        ticker: input.ticker.clone(),
        snapshot,
        risk_free_rate: rate,
        time_to_maturity: ttm.years(),
        analysis: inner.result,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Black-Scholes on market snapshot (implied volatility)",
        &serde_json::json!({
            "volatility_source": "implied",
            "day_count": ttm.convention.to_string(),
            "valuation_date": ttm.valuation_date.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::day_count::DayCountConvention;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            name: Some("Example Corp".into()),
            spot_price: dec!(100),
            historical_vol: dec!(0.18),
            implied_vol: dec!(0.20),
        }
    }

    fn provider() -> StaticMarketData {
        StaticMarketData::new(dec!(0.05)).with_snapshot("EXM", snapshot())
    }

    #[test]
    fn test_static_provider_lookup() {
        let p = provider();
        assert_eq!(p.snapshot("EXM").unwrap().spot_price, dec!(100));
        assert_eq!(p.risk_free_rate().unwrap(), dec!(0.05));
    }

    #[test]
    fn test_unknown_ticker_is_unavailable() {
        match provider().snapshot("NOPE").unwrap_err() {
            PricingError::DataUnavailable(msg) => assert!(msg.contains("NOPE")),
            other => panic!("Expected DataUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_rate_is_unavailable() {
        let p = StaticMarketData::default();
        assert!(matches!(
            p.risk_free_rate(),
            Err(PricingError::DataUnavailable(_))
        ));
    }

    #[test]
    fn test_to_option_spec_uses_implied_vol() {
        let spec = to_option_spec(&snapshot(), dec!(105), dec!(0.5), dec!(0.04), Some(dec!(3)));
        assert_eq!(spec.spot, dec!(100));
        assert_eq!(spec.volatility, dec!(0.20));
        assert_eq!(spec.strike, dec!(105));
        assert_eq!(spec.transaction_price, Some(dec!(3)));
    }

    #[test]
    fn test_snapshot_from_history() {
        let closes = [dec!(100), dec!(101), dec!(99), dec!(102), dec!(100)];
        let snap = MarketSnapshot::from_history(None, &closes, &[dec!(0.2)], &[dec!(0.3)]).unwrap();
        assert_eq!(snap.spot_price, dec!(100));
        assert_eq!(snap.implied_vol, dec!(0.25));
        assert!(snap.historical_vol > dec!(0.38) && snap.historical_vol < dec!(0.39));
    }

    #[test]
    fn test_analyze_market_option() {
        let input = MarketOptionInput {
            market: provider(),
            ticker: "EXM".into(),
            kind: OptionKind::Call,
            strike: dec!(100),
            maturity: TimeToMaturityInput {
                maturity_date: NaiveDate::from_ymd_opt(2030, 6, 30).unwrap(),
                valuation_date: NaiveDate::from_ymd_opt(2029, 6, 30),
                convention: DayCountConvention::Actual365,
            },
            position: Position::Long,
            transaction_price: None,
        };
        let out = analyze_market_option(&input.market, &input).unwrap();
        assert_eq!(out.result.time_to_maturity, Decimal::ONE);
        let price = out.result.analysis.price;
        assert!((price - dec!(10.450584)).abs() < dec!(0.0001), "price {price}");
    }
}
