//! Error types for sink operations.

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Sink configuration missing or invalid
    E001InvalidConfig,
    /// E002: Batch could not be serialized
    E002EncodeFailure,
    /// E003: Write operation failed
    E003WriteFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001InvalidConfig => "E001",
            Self::E002EncodeFailure => "E002",
            Self::E003WriteFailure => "E003",
        }
    }
}

/// Errors that can occur while flushing a batch
#[derive(Debug, Error)]
pub enum WriterError {
    /// Invalid configuration provided
    #[error("[{code}] Invalid sink configuration: {message}")]
    InvalidConfig { code: &'static str, message: String },

    /// Serialization of the batch failed
    #[error("[{code}] Failed to encode batch: {message}")]
    Encode { code: &'static str, message: String },

    /// Write operation failed
    #[error("[{code}] Write operation failed: {message}")]
    WriteFailure { code: &'static str, message: String },
}

impl WriterError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::E001InvalidConfig.as_str(),
            message: message.into(),
        }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            code: ErrorCode::E002EncodeFailure.as_str(),
            message: message.into(),
        }
    }

    pub fn write_failure(message: impl Into<String>) -> Self {
        Self::WriteFailure {
            code: ErrorCode::E003WriteFailure.as_str(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidConfig { .. } => ErrorCode::E001InvalidConfig,
            Self::Encode { .. } => ErrorCode::E002EncodeFailure,
            Self::WriteFailure { .. } => ErrorCode::E003WriteFailure,
        }
    }
}

/// Result type alias for WriterError
pub type Result<T> = std::result::Result<T, WriterError>;
