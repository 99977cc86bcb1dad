use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use weft_dag::Node;

use crate::error::{RecordError, RecordResult};

/// A versioned, immutable unit of data.
///
/// `value` is the payload; `data` carries whatever a [`Validator`] needs to
/// judge validity (signatures, timestamps). Records have no order of their
/// own; see [`order`].
///
/// [`Validator`]: crate::Validator
/// [`order`]: crate::order
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    version: u64,
    value: Vec<u8>,
    data: Vec<u8>,
}

impl Record {
    pub fn new(version: u64, value: impl Into<Vec<u8>>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            version,
            value: value.into(),
            data: data.into(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Validity-relevant data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Canonical bytes.
    pub fn marshal(&self) -> RecordResult<Vec<u8>> {
        marshal(self)
    }

    /// The record as a leaf DAG node holding its canonical bytes.
    pub fn to_node(&self) -> RecordResult<Node> {
        Ok(Node::leaf(self.marshal()?))
    }

    pub fn from_node(node: &Node) -> RecordResult<Self> {
        unmarshal(node.data())
    }
}

/// Canonical serialization of a record.
pub fn marshal(record: &Record) -> RecordResult<Vec<u8>> {
    bincode::serialize(record).map_err(|e| RecordError::Serialization(e.to_string()))
}

/// Inverse of [`marshal`]. Input with bytes left over after the record is
/// rejected, so every record has exactly one byte form.
pub fn unmarshal(bytes: &[u8]) -> RecordResult<Record> {
    decode_exact(bytes)
}

/// Decode the legacy bincode layout, refusing trailing bytes.
pub(crate) fn decode_exact<T: DeserializeOwned>(bytes: &[u8]) -> RecordResult<T> {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .deserialize(bytes)
        .map_err(|e| RecordError::Serialization(e.to_string()))
}
