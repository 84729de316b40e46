pub mod derivatives;
pub mod fixed_income;
pub mod market_data;
