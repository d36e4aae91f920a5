use thiserror::Error;

/// Why a subscriber could not be installed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A level, directive or format did not parse.
    #[error("invalid logging configuration: {0}")]
    ConfigError(String),

    /// A global subscriber is already set.
    #[error("failed to install subscriber: {0}")]
    InitError(String),

    /// The log directory could not be created.
    #[error("log directory: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result alias for this crate.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
