mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::derivatives::{
    CallSpreadArgs, CompositeArgs, ForwardArgs, OptionArgs, StraddleArgs, StrangleArgs,
};
use commands::fixed_income::BondArgs;
use commands::market_data::{HistVolArgs, MarketOptionArgs, TtmArgs};

/// Bond, forward and Black-Scholes option analytics
#[derive(Parser)]
#[command(
    name = "greekdesk",
    version,
    about = "Bond, forward and Black-Scholes option analytics",
    long_about = "Prices fixed-coupon bonds, cost-of-carry forwards and European options \
                  with decimal precision. Reports duration and convexity, option Greeks \
                  by position side, composite strategies (straddle, strangle, call spread) \
                  and expiry payoff profiles. Inputs are JSON, from --input or stdin."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log debug events to stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Price a bond with duration, convexity and cash flow schedule
    Bond(BondArgs),
    /// Price a forward and its long/short payoff profile
    Forward(ForwardArgs),
    /// Price a European option with Greeks, PnL and payoff profile
    Option(OptionArgs),
    /// Long call plus long put at one strike
    Straddle(StraddleArgs),
    /// Long call and long put at two strikes
    Strangle(StrangleArgs),
    /// Long call at the lower strike, short call at the higher strike
    CallSpread(CallSpreadArgs),
    /// Arbitrary signed list of option legs
    Composite(CompositeArgs),
    /// Historical and implied volatility from closes and option quotes
    HistVol(HistVolArgs),
    /// Year fraction to a maturity date
    Ttm(TtmArgs),
    /// Price an option on a ticker from a market data snapshot
    MarketOption(MarketOptionArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let log_level = if verbose { "debug" } else { "warn" };
    let filter = if verbose {
        EnvFilter::new(log_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
    };
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Bond(args) => commands::fixed_income::run_bond(args),
        Commands::Forward(args) => commands::derivatives::run_forward(args),
        Commands::Option(args) => commands::derivatives::run_option(args),
        Commands::Straddle(args) => commands::derivatives::run_straddle(args),
        Commands::Strangle(args) => commands::derivatives::run_strangle(args),
        Commands::CallSpread(args) => commands::derivatives::run_call_spread(args),
        Commands::Composite(args) => commands::derivatives::run_composite(args),
        Commands::HistVol(args) => commands::market_data::run_hist_vol(args),
        Commands::Ttm(args) => commands::market_data::run_ttm(args),
        Commands::MarketOption(args) => commands::market_data::run_market_option(args),
        Commands::Version => {
            println!("greekdesk {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
