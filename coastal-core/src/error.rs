use thiserror::Error;

/// Errors that abort an evaluation.
///
/// Per-channel delivery problems are not part of this enum: they are
/// folded into the dispatch counts and never fail an evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Unknown metric: {metric}. Available metrics: {}", available.join(", "))]
    UnknownMetric {
        metric: String,
        available: Vec<String>,
    },

    #[error("Invalid value: {0} is not a finite number")]
    InvalidValue(f64),

    #[error("Invalid threshold table: {0}")]
    InvalidThresholds(String),

    #[error("Contact directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Alert store unavailable: {0}")]
    StoreUnavailable(String),
}

impl EngineError {
    /// True for errors caused by the caller's input (nothing was written).
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownMetric { .. }
                | EngineError::InvalidValue(_)
                | EngineError::InvalidThresholds(_)
        )
    }

    pub fn directory(message: impl Into<String>) -> Self {
        Self::DirectoryUnavailable(message.into())
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreUnavailable(message.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Failure of a single (contact, channel) send attempt.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[cfg(feature = "http-notifiers")]
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[cfg(feature = "smtp")]
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Provider rejected message: HTTP {status} - {body}")]
    Rejected { status: u16, body: String },

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Delivery failed: {0}")]
    Other(String),
}
