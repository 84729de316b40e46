use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use greekdesk_core::derivatives::composite::{
    self, CompositeAnalysisInput, CompositeSpec, LegMarket,
};
use greekdesk_core::derivatives::forwards::{self, ForwardAnalysisInput};
use greekdesk_core::derivatives::options::{self, OptionAnalysisInput};
use greekdesk_core::Position;

use crate::input;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum PositionArg {
    #[default]
    Long,
    Short,
}

impl From<PositionArg> for Position {
    fn from(arg: PositionArg) -> Self {
        match arg {
            PositionArg::Long => Position::Long,
            PositionArg::Short => Position::Short,
        }
    }
}

/// Market inputs shared by the packaged strategy commands
#[derive(Args)]
pub struct MarketArgs {
    /// Spot price of the underlying
    #[arg(long)]
    pub spot: Decimal,
    /// Time to maturity in years
    #[arg(long)]
    pub ttm: Decimal,
    /// Risk-free rate as a decimal (0.05 = 5%)
    #[arg(long)]
    pub rate: Decimal,
    /// Volatility as a decimal (0.20 = 20%)
    #[arg(long)]
    pub vol: Decimal,
    /// Side of the position
    #[arg(long, value_enum, default_value_t = PositionArg::Long)]
    pub position: PositionArg,
}

impl MarketArgs {
    fn leg_market(&self) -> LegMarket {
        LegMarket {
            spot: self.spot,
            time_to_maturity: self.ttm,
            risk_free_rate: self.rate,
            volatility: self.vol,
        }
    }
}

fn run_packaged(
    instrument: CompositeSpec,
    position: PositionArg,
) -> Result<Value, Box<dyn std::error::Error>> {
    let input = CompositeAnalysisInput {
        instrument,
        position: position.into(),
        payoff_range: None,
    };
    let result = composite::analyze_composite(&input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for forward pricing
#[derive(Args)]
pub struct ForwardArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_forward(args: ForwardArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let fwd_input: ForwardAnalysisInput =
        input::read_input(args.input.as_deref(), "forward pricing")?;
    let result = forwards::analyze_forward(&fwd_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for single option analysis
#[derive(Args)]
pub struct OptionArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_option(args: OptionArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let opt_input: OptionAnalysisInput =
        input::read_input(args.input.as_deref(), "option pricing")?;
    let result = options::analyze_option(&opt_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for a straddle
#[derive(Args)]
pub struct StraddleArgs {
    #[command(flatten)]
    pub market: MarketArgs,
    /// Strike shared by the call and the put
    #[arg(long)]
    pub strike: Decimal,
}

pub fn run_straddle(args: StraddleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let instrument = CompositeSpec::Straddle {
        market: args.market.leg_market(),
        strike: args.strike,
    };
    run_packaged(instrument, args.market.position)
}

/// Arguments for a strangle
#[derive(Args)]
pub struct StrangleArgs {
    #[command(flatten)]
    pub market: MarketArgs,
    /// Call strike
    #[arg(long)]
    pub call_strike: Decimal,
    /// Put strike
    #[arg(long)]
    pub put_strike: Decimal,
}

pub fn run_strangle(args: StrangleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let instrument = CompositeSpec::Strangle {
        market: args.market.leg_market(),
        call_strike: args.call_strike,
        put_strike: args.put_strike,
    };
    run_packaged(instrument, args.market.position)
}

/// Arguments for a call spread
#[derive(Args)]
pub struct CallSpreadArgs {
    #[command(flatten)]
    pub market: MarketArgs,
    /// Strike of the bought call (lower)
    #[arg(long)]
    pub long_strike: Decimal,
    /// Strike of the sold call (higher)
    #[arg(long)]
    pub short_strike: Decimal,
}

pub fn run_call_spread(args: CallSpreadArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let instrument = CompositeSpec::CallSpread {
        market: args.market.leg_market(),
        long_strike: args.long_strike,
        short_strike: args.short_strike,
    };
    run_packaged(instrument, args.market.position)
}

/// Arguments for a custom composite
#[derive(Args)]
pub struct CompositeArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_composite(args: CompositeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let comp_input: CompositeAnalysisInput =
        input::read_input(args.input.as_deref(), "composite pricing")?;
    let result = composite::analyze_composite(&comp_input)?;
    Ok(serde_json::to_value(result)?)
}
