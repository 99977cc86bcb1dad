//! Versioned records for weft.
//!
//! A [`Record`] is an immutable, versioned payload. Peers may publish several
//! records under one logical key without coordinating; [`order`] resolves
//! them to the same current value everywhere, given a [`Validator`].
//!
//! # Key Types
//!
//! - [`Record`] -- version, value and validity data, with canonical bytes
//! - [`Validator`] -- acceptance and tie-breaking ([`AcceptAll`], [`SignatureValidator`])
//! - [`RecordChain`] -- Merkle-linked record history stored as DAG nodes
//! - [`SignedRecord`] -- a record authenticated by a public key

pub mod chain;
pub mod error;
pub mod record;
pub mod signed;
pub mod validator;

pub use chain::RecordChain;
pub use error::{RecordError, RecordResult};
pub use record::{marshal, unmarshal, Record};
pub use signed::SignedRecord;
pub use validator::{best, check, order, AcceptAll, SignatureValidator, Validator};
