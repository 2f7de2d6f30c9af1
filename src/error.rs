// src/error.rs
use rust_decimal::Decimal;
use thiserror::Error;

/// Result alias used throughout the bot.
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Error taxonomy for the trading agent.
///
/// `Network` is the only broadly retryable class; a retry of a write call
/// must reuse the original clientOid so the venue can deduplicate it.
#[derive(Error, Debug)]
pub enum SentinelError {
    /// Missing or invalid startup configuration. Fatal, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Timeout, connection reset, 5xx, rate-limit. Retryable with backoff.
    #[error("network error: {0}")]
    Network(String),

    /// The venue understood the request and said no.
    #[error("venue rejected request (code {code}): {message}")]
    Venue { code: String, message: String },

    /// A venue response that could not be decoded into the expected shape.
    #[error("invalid venue response: {0}")]
    InvalidResponse(String),

    /// Local truth and exchange truth disagree. Fail safe, re-query next tick.
    #[error("state inconsistency: {0}")]
    StateInconsistency(String),

    /// Pre-submission sizing check failed. Never sent to the venue.
    #[error("insufficient funds: required margin {required} exceeds available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    /// Computed order/trigger price failed local validation.
    #[error("invalid computed price: {0}")]
    InvalidPrice(Decimal),
}

impl SentinelError {
    /// Whether the call site may retry the same request. Venue rejections
    /// are semantic answers, not transport noise, and are never blindly
    /// retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SentinelError::Network(_))
    }
}

impl From<reqwest::Error> for SentinelError {
    fn from(err: reqwest::Error) -> Self {
        SentinelError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SentinelError {
    fn from(err: serde_json::Error) -> Self {
        SentinelError::InvalidResponse(err.to_string())
    }
}
