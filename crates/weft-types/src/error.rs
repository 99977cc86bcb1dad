use thiserror::Error;

/// Errors produced when parsing or decoding foundation types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("unsupported hash algorithm tag: {0:#x}")]
    UnsupportedAlgorithm(u64),

    #[error("invalid digest length for {algorithm}: expected {expected}, got {actual}")]
    InvalidLength {
        algorithm: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("malformed varint")]
    InvalidVarint,

    #[error("truncated content address: expected {expected} digest bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("{0} trailing bytes after content address")]
    TrailingBytes(usize),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}
