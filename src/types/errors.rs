use thiserror::Error;

#[derive(Debug, Error)]
pub enum AmountError {
    #[error("Amount error: value is an empty string")]
    Empty,
    #[error("Amount error: [{value}] is not a valid decimal: {reason}")]
    InvalidFormat {
        value: String,
        reason: String
    }
}
