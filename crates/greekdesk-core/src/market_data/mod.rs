pub mod day_count;
pub mod provider;
pub mod volatility;
