//! Error types for the tone detection engine

use std::fmt;

/// Errors that can occur during tone detection, decoding or stripping
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Invalid input parameters (bad configuration, zero sample rate, ...)
    InvalidInput(String),

    /// Audio decoding error
    DecodingError(String),

    /// Audio encoding error (malformed filter graph, encoder process failure)
    EncodingError(String),

    /// Tone set configuration could not be parsed or serialized
    ConfigError(String),

    /// Processing error during analysis
    ProcessingError(String),

    /// A blocking external operation did not finish in time
    Timeout(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AnalysisError::DecodingError(msg) => write!(f, "Decoding error: {}", msg),
            AnalysisError::EncodingError(msg) => write!(f, "Encoding error: {}", msg),
            AnalysisError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AnalysisError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
            AnalysisError::Timeout(msg) => write!(f, "Timed out: {}", msg),
        }
    }
}

impl std::error::Error for AnalysisError {}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::ConfigError(err.to_string())
    }
}

impl From<symphonia::core::errors::Error> for AnalysisError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        AnalysisError::DecodingError(err.to_string())
    }
}
