//! Error types for ecplug
//!
//! This module defines the common error type shared by the ecplug crates.

use thiserror::Error;

/// Common result type for ecplug operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for ecplug
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Erasure coding errors
    #[error("insufficient units for reconstruction: have {available}, need {required}")]
    InsufficientUnits { available: usize, required: usize },

    #[error("erasure coding error: {0}")]
    ErasureCoding(String),

    // Schema errors
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("unknown codec: {0}")]
    UnknownCodec(String),

    // Internal errors
    #[error("internal error: {0}")]
    Internal(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if this error comes from a misconfigured deployment
    ///
    /// Configuration errors are never retryable: the same configuration will
    /// fail the same way.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::InvalidSchema(_) | Self::UnknownCodec(_)
        )
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Deserialization(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
