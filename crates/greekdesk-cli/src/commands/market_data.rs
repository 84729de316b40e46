use chrono::NaiveDate;
use clap::Args;
use serde_json::Value;

use greekdesk_core::market_data::day_count::{self, DayCountConvention, TimeToMaturityInput};
use greekdesk_core::market_data::provider::{self, MarketOptionInput};
use greekdesk_core::market_data::volatility::{self, VolatilityInput};

use crate::input;

/// Arguments for volatility estimation
#[derive(Args)]
pub struct HistVolArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_hist_vol(args: HistVolArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let vol_input: VolatilityInput =
        input::read_input(args.input.as_deref(), "volatility estimation")?;
    let result = volatility::analyze_volatility(&vol_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for time to maturity
#[derive(Args)]
pub struct TtmArgs {
    /// Maturity date (YYYY-MM-DD); without it, JSON input is read
    #[arg(long)]
    pub maturity: Option<NaiveDate>,
    /// Valuation date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub valuation: Option<NaiveDate>,
    /// Day-count convention: act/act, act/360, act/365 or 30/360
    #[arg(long)]
    pub convention: Option<String>,
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_ttm(args: TtmArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let ttm_input = match args.maturity {
        Some(maturity_date) => TimeToMaturityInput {
            maturity_date,
            valuation_date: args.valuation,
            convention: match args.convention.as_deref() {
                Some(label) => label.parse::<DayCountConvention>()?,
                None => DayCountConvention::default(),
            },
        },
        None => input::read_input(args.input.as_deref(), "time to maturity")?,
    };
    let result = day_count::analyze_time_to_maturity(&ttm_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for pricing an option off a market data snapshot
#[derive(Args)]
pub struct MarketOptionArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_market_option(args: MarketOptionArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mkt_input: MarketOptionInput =
        input::read_input(args.input.as_deref(), "market option pricing")?;
    let result = provider::analyze_market_option(&mkt_input.market, &mkt_input)?;
    Ok(serde_json::to_value(result)?)
}
