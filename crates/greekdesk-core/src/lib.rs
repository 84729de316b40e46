pub mod error;
pub mod math;
pub mod types;

#[cfg(feature = "fixed_income")]
pub mod fixed_income;

#[cfg(feature = "derivatives")]
pub mod derivatives;

#[cfg(feature = "market_data")]
pub mod market_data;

pub use error::PricingError;
pub use types::*;

/// Standard result type for all greekdesk operations
pub type PricingResult<T> = Result<T, PricingError>;
