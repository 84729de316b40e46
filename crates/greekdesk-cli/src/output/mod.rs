pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use colored::Colorize;
use serde_json::Value;

use crate::OutputFormat;

/// Render a pricing envelope in the requested format.
///
/// JSON carries the whole envelope. The other formats only render the
/// result; envelope warnings (expiry, fractional coupon periods, vol
/// divergence) go to stderr.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => return json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
    for warning in envelope_warnings(value) {
        eprintln!("{}: {}", "warning".yellow().bold(), warning);
    }
}

fn envelope_warnings(value: &Value) -> impl Iterator<Item = &str> {
    value
        .get("warnings")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}
