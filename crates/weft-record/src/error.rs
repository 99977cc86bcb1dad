use weft_blocks::BlockError;
use weft_crypto::SignatureError;
use weft_dag::DagError;

/// Errors from record operations.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// A signed record failed verification.
    #[error("signature invalid")]
    SignatureInvalid,

    /// A validator refused the record.
    #[error("record rejected: {0}")]
    Rejected(String),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Malformed record bytes.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Failure of a distributed backing store.
    #[error("dht error: {0}")]
    Dht(String),

    /// Local storage failure.
    #[error("storage error: {0}")]
    Storage(#[from] BlockError),

    /// Failure loading or storing record nodes.
    #[error("dag error: {0}")]
    Dag(#[source] DagError),
}

impl From<SignatureError> for RecordError {
    fn from(_: SignatureError) -> Self {
        Self::SignatureInvalid
    }
}

impl From<DagError> for RecordError {
    fn from(e: DagError) -> Self {
        match e {
            DagError::Cancelled => Self::Cancelled,
            other => Self::Dag(other),
        }
    }
}

/// Result alias for record operations.
pub type RecordResult<T> = Result<T, RecordError>;
