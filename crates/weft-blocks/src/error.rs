use weft_types::{ContentAddress, TypeError};

/// Errors from datastore and block store operations.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    /// The supplied key does not match the hash of the supplied data.
    #[error("address mismatch: expected {expected}, computed {computed}")]
    AddressMismatch {
        expected: ContentAddress,
        computed: ContentAddress,
    },

    /// The requested block is not stored locally.
    #[error("block not found: {0}")]
    NotFound(ContentAddress),

    /// A datastore key is malformed.
    #[error("invalid datastore key: {0}")]
    InvalidKey(String),

    /// A stored key could not be decoded into a content address.
    #[error("invalid content address: {0}")]
    InvalidAddress(#[from] TypeError),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for block store operations.
pub type BlockResult<T> = Result<T, BlockError>;
