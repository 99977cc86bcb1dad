use std::sync::Arc;

use serde::{Deserialize, Serialize};
use weft_crypto::ContentHasher;
use weft_types::ContentAddress;

/// An immutable byte payload and its content address.
///
/// Block data is reference-counted, so cloning a block (to hand it to several
/// peers or listeners) never copies the bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    key: ContentAddress,
    data: Arc<[u8]>,
}

impl Block {
    /// Hash `data` with the default algorithm.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self::with_hasher(&ContentHasher::default(), data)
    }

    /// Hash `data` with a specific hasher.
    pub fn with_hasher(hasher: &ContentHasher, data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        Self {
            key: hasher.hash(&data),
            data: data.into(),
        }
    }

    /// Pair untrusted data with a claimed key without hashing.
    ///
    /// Use [`Block::verify`] before trusting the pairing; block stores do so on put.
    pub fn with_key(key: ContentAddress, data: impl Into<Vec<u8>>) -> Self {
        Self {
            key,
            data: data.into().into(),
        }
    }

    pub fn key(&self) -> &ContentAddress {
        &self.key
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the key is the hash of the data, under the key's algorithm.
    pub fn verify(&self) -> bool {
        ContentHasher::verify(&self.data, &self.key)
    }

    /// The address the data actually hashes to, under the key's algorithm.
    pub fn computed_key(&self) -> ContentAddress {
        ContentHasher::new(self.key.algorithm()).hash(&self.data)
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("key", &self.key)
            .field("len", &self.data.len())
            .finish()
    }
}
