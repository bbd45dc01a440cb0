//! Error types shared by the hashing and duplicate detection code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    /// The input could not be read or parsed as an image.
    #[error("Failed to decode image '{source_id}': {message}")]
    Decode { source_id: String, message: String },

    /// Incompatible bit widths, unknown algorithm, or out-of-range parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A hash string that is not valid hexadecimal.
    #[error("Malformed hash: {0}")]
    MalformedHash(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl HashError {
    pub fn decode(source_id: impl Into<String>, message: impl ToString) -> Self {
        HashError::Decode { source_id: source_id.into(), message: message.to_string() }
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, HashError::Decode { .. })
    }
}

pub type Result<T> = std::result::Result<T, HashError>;
