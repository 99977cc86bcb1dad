use serde::{Deserialize, Serialize};
use weft_blocks::Block;
use weft_types::{ContentAddress, PeerId};

use crate::error::{ExchangeError, ExchangeResult};

/// Exchange protocol message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// The sender wants these blocks. The receiver answers with the ones it
    /// has and remembers the rest until they arrive or are cancelled.
    Want { keys: Vec<ContentAddress> },
    /// The sender no longer wants these blocks.
    Cancel { keys: Vec<ContentAddress> },
    /// Block payloads. Receivers verify each block before storing it.
    Blocks { blocks: Vec<Block> },
}

impl Message {
    /// Binary form for byte-oriented transports.
    pub fn to_bytes(&self) -> ExchangeResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| ExchangeError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> ExchangeResult<Self> {
        bincode::deserialize(bytes).map_err(|e| ExchangeError::Serialization(e.to_string()))
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Want { .. } => "want",
            Self::Cancel { .. } => "cancel",
            Self::Blocks { .. } => "blocks",
        }
    }
}

/// A message together with its sender.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub from: PeerId,
    pub message: Message,
}
