use thiserror::Error;

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("Invalid parameter: {field} — {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Domain error: {0}")]
    DomainError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PricingError {
    pub(crate) fn invalid(field: &str, reason: &str) -> Self {
        PricingError::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for PricingError {
    fn from(e: serde_json::Error) -> Self {
        PricingError::SerializationError(e.to_string())
    }
}
