//! Error types for DAG operations.

use weft_blocks::BlockError;
use weft_exchange::ExchangeError;
use weft_types::ContentAddress;

/// Errors that can occur during DAG operations.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// The node is neither stored locally nor retrievable through the exchange.
    #[error("node not found: {0:?}")]
    NotFound(ContentAddress),

    /// Two links of one node share a name.
    #[error("duplicate link name: {0:?}")]
    DuplicateLinkName(String),

    /// A path segment names no link of the node it is resolved against.
    #[error("no link named {name:?} in node {node:?}")]
    LinkNotFound {
        /// Node the segment was looked up in.
        node: ContentAddress,
        /// The missing link name.
        name: String,
    },

    /// Paths in this namespace cannot be resolved by the DAG layer.
    #[error("unsupported namespace: /ipns/{0}")]
    UnsupportedNamespace(String),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Node bytes could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Block store failure other than a miss.
    #[error("block store error: {0}")]
    Block(#[source] BlockError),

    /// Exchange failure other than a miss or cancellation.
    #[error("exchange error: {0}")]
    Exchange(#[source] ExchangeError),
}

impl From<BlockError> for DagError {
    fn from(e: BlockError) -> Self {
        match e {
            BlockError::NotFound(key) => Self::NotFound(key),
            other => Self::Block(other),
        }
    }
}

impl From<ExchangeError> for DagError {
    fn from(e: ExchangeError) -> Self {
        match e {
            ExchangeError::Cancelled => Self::Cancelled,
            ExchangeError::Unavailable(key) => Self::NotFound(key),
            ExchangeError::Block(b) => b.into(),
            other => Self::Exchange(other),
        }
    }
}

/// Convenience alias for DAG results.
pub type DagResult<T> = Result<T, DagError>;
