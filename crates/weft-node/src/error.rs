use std::path::PathBuf;

use weft_blocks::BlockError;
use weft_dag::DagError;
use weft_exchange::ExchangeError;
use weft_record::RecordError;

/// Errors from opening or operating a node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// No repository exists at the path.
    #[error("no weft repository at {0}")]
    NotInitialized(PathBuf),

    /// A repository already exists at the path.
    #[error("weft repository already exists at {0}")]
    AlreadyInitialized(PathBuf),

    /// The configuration file could not be read or written.
    #[error("config error: {0}")]
    Config(String),

    /// The identity key file is malformed.
    #[error("identity error: {0}")]
    Identity(String),

    /// Filesystem failure outside the datastore.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("block error: {0}")]
    Block(#[from] BlockError),

    #[error("dag error: {0}")]
    Dag(#[from] DagError),

    #[error("record error: {0}")]
    Record(#[from] RecordError),

    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),
}

/// Result alias for node operations.
pub type NodeResult<T> = Result<T, NodeError>;
