//! Error types for voxel source operations

use crate::roi::Roi;
use crate::types::DataKind;
use thiserror::Error;

/// Main error type for source setup and batch requests
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Ground-truth mask '{key}' contains no positive elements")]
    EmptyMask { key: String },

    #[error("Source cannot provide {kind}")]
    Capability { kind: DataKind },

    #[error("{label} ROI {requested} outside of source ROI {available}")]
    OutOfBounds {
        label: &'static str,
        requested: Roi,
        available: Roi,
    },

    #[error("Source has not been set up")]
    NotInitialized,

    #[error("Storage read error: {0}")]
    StorageRead(String),

    #[error("Dimension mismatch: expected {expected} axes, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Decompression error: {0}")]
    Decompression(String),
}

impl SourceError {
    /// Whether repeating the whole request could succeed.
    ///
    /// The provider never retries by itself; this is a hint for the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::StorageRead(_) | SourceError::Io(_))
    }
}

/// Specialized Result type for source operations
pub type Result<T> = std::result::Result<T, SourceError>;

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Serialization(err.to_string())
    }
}
