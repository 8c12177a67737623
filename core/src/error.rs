use thiserror::Error;

#[derive(Debug, Error)]
pub enum MkfatError {
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Link {link} points at {target}, which has not been declared")]
    UnresolvedLinkTarget { link: String, target: String },

    #[error("Write of {len} bytes at offset {offset} failed: {source}")]
    MediumWriteFailure {
        offset: u64,
        len: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Content source produced {actual} bytes but reported {expected}")]
    SourceLengthMismatch { expected: u64, actual: u64 },

    #[error("Content source already consumed: {0}")]
    SourceConsumed(String),

    #[error("Entry already exists: {0}")]
    DuplicateEntry(String),

    #[error("Parent directory not declared: {0}")]
    MissingParent(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl MkfatError {
    pub fn write_failure(offset: u64, len: usize, source: std::io::Error) -> Self {
        MkfatError::MediumWriteFailure { offset, len, source }
    }
}
