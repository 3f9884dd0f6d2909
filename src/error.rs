//! Error types for photo normalization operations

use thiserror::Error;

/// Result type alias for photo normalization operations
pub type Result<T> = std::result::Result<T, PhotoNormError>;

/// Error types for photo normalization operations
#[derive(Error, Debug)]
pub enum PhotoNormError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable or invalid image bytes; surfaced immediately, never retried
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// Image encoding errors
    #[error("failed to encode image: {0}")]
    Encode(String),

    /// No face found after the full detection retry ladder
    #[error("no subject detected in image")]
    NoSubjectDetected,

    /// Segmentation could not run on the requested region
    #[error("segmentation failed: {0}")]
    SegmentationFailed(String),

    /// A replacement layer does not match the source dimensions
    #[error("dimension mismatch: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}")]
    DimensionMismatch {
        /// Required width in pixels
        expected_width: u32,
        /// Required height in pixels
        expected_height: u32,
        /// Width actually produced
        actual_width: u32,
        /// Height actually produced
        actual_height: u32,
    },

    /// Detection model loading or initialization errors
    #[error("model error: {0}")]
    Model(String),

    /// Invalid configuration or parameters
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PhotoNormError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new segmentation error
    pub fn segmentation<S: Into<String>>(msg: S) -> Self {
        Self::SegmentationFailed(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a dimension mismatch error from an expected and an actual size
    pub fn dimension_mismatch(expected: (u32, u32), actual: (u32, u32)) -> Self {
        Self::DimensionMismatch {
            expected_width: expected.0,
            expected_height: expected.1,
            actual_width: actual.0,
            actual_height: actual.1,
        }
    }

    /// Create a configuration error with the valid range spelled out
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "invalid {parameter}: {value} (valid range: {valid_range})"
        ))
    }
}
