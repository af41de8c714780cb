use thiserror::Error;

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("failed to read price table: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse price table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid price for model '{model}': {reason}")]
    InvalidPrice { model: String, reason: String },
}
