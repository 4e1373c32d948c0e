//! Error taxonomy shared by every stage of a run

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while fetching, computing, deciding or executing.
///
/// Classification drives the pipeline: [`DcaError::is_retryable`] selects the
/// errors worth a bounded backoff, [`DcaError::consumes_day`] decides whether a
/// `Failed` record blocks further attempts on the same calendar day.
#[derive(Debug, Clone, Error)]
pub enum DcaError {
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("computation error: {0}")]
    Computation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("venue error on {venue}: {reason}")]
    Venue { venue: String, reason: String },

    #[error("order rejected by {venue}: {reason}")]
    VenueRejected { venue: String, reason: String },

    #[error("insufficient balance on {venue} for {required}: {detail}")]
    InsufficientBalance {
        venue: String,
        required: Decimal,
        detail: String,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("record store error: {0}")]
    Store(String),

    #[error("run cancelled: {0}")]
    Cancelled(String),
}

impl DcaError {
    /// Transient failures that a later attempt may get past.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DcaError::Network(_))
    }

    /// Whether a `Failed` record carrying this error marks the day as done.
    ///
    /// Exhausted network retries and shutdowns leave the day open so a later
    /// scheduled or manual run may still succeed.
    pub fn consumes_day(&self) -> bool {
        !matches!(self, DcaError::Network(_) | DcaError::Cancelled(_))
    }

    /// Short machine-friendly label used in logs and records.
    pub fn kind(&self) -> &'static str {
        match self {
            DcaError::DataUnavailable(_) => "data_unavailable",
            DcaError::Computation(_) => "computation",
            DcaError::Network(_) => "network",
            DcaError::Venue { .. } => "venue",
            DcaError::VenueRejected { .. } => "venue_rejected",
            DcaError::InsufficientBalance { .. } => "insufficient_balance",
            DcaError::Config(_) => "config",
            DcaError::Store(_) => "store",
            DcaError::Cancelled(_) => "cancelled",
        }
    }
}

impl From<std::io::Error> for DcaError {
    fn from(err: std::io::Error) -> Self {
        DcaError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for DcaError {
    fn from(err: serde_json::Error) -> Self {
        DcaError::Store(format!("serialization: {}", err))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DcaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_errors_are_retryable() {
        assert!(DcaError::Network("timeout".into()).is_retryable());
        assert!(!DcaError::DataUnavailable("short".into()).is_retryable());
        assert!(!DcaError::VenueRejected {
            venue: "binance".into(),
            reason: "bad".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_day_consumption() {
        assert!(!DcaError::Network("reset".into()).consumes_day());
        assert!(!DcaError::Cancelled("shutdown".into()).consumes_day());
        assert!(DcaError::Computation("nan".into()).consumes_day());
        assert!(DcaError::InsufficientBalance {
            venue: "okx".into(),
            required: Decimal::from(100),
            detail: "free 5".into(),
        }
        .consumes_day());
    }
}
