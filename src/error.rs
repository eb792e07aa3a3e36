//! Error types for APK Depot.

use thiserror::Error;

/// Common error type for APK Depot.
#[derive(Error, Debug)]
pub enum DepotError {
    /// I/O error from the blob directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The metadata document could not be read, parsed or written.
    #[error("metadata store error: {0}")]
    Metadata(String),

    /// Validation error for client input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The upload did not contain the expected file field.
    #[error("no file uploaded")]
    MissingFile,

    /// Declared media type rejected by the strict upload policy.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Upload exceeded the configured size limit.
    #[error("upload exceeds the limit of {0} bytes")]
    TooLarge(u64),

    /// The upload stream failed before it was fully received.
    #[error("upload stream error: {0}")]
    Upload(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Target name already taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for DepotError {
    fn from(e: serde_json::Error) -> Self {
        DepotError::Metadata(e.to_string())
    }
}

/// Result type alias for APK Depot operations.
pub type Result<T> = std::result::Result<T, DepotError>;
