use clap::Args;
use serde_json::Value;

use greekdesk_core::fixed_income::bonds::{self, BondSpec, Compounding};

use crate::input;

/// Arguments for bond analytics
#[derive(Args)]
pub struct BondArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the compounding mode in the input (continuous or discrete)
    #[arg(long)]
    pub compounding: Option<String>,
}

pub fn run_bond(args: BondArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut spec: BondSpec = input::read_input(args.input.as_deref(), "bond analytics")?;
    if let Some(mode) = args.compounding.as_deref() {
        spec.compounding = mode.parse::<Compounding>()?;
    }
    let result = bonds::analyze_bond(&spec)?;
    Ok(serde_json::to_value(result)?)
}
