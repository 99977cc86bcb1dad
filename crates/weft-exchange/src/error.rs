use std::time::Duration;

use weft_blocks::BlockError;
use weft_types::ContentAddress;

/// Errors from exchange operations.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// No peer or provider could be asked for the block.
    #[error("block unavailable: {0}")]
    Unavailable(ContentAddress),

    /// Peers were asked but did not answer within the retry policy.
    #[error("timed out after {0:?} waiting for blocks")]
    Timeout(Duration),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Local block store failure.
    #[error("block store error: {0}")]
    Block(#[from] BlockError),

    /// A message could not be delivered.
    #[error("transport error: {0}")]
    Transport(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Content routing failure.
    #[error("routing error: {0}")]
    Routing(String),
}

/// Result alias for exchange operations.
pub type ExchangeResult<T> = Result<T, ExchangeError>;
