use sha2::Digest;
use weft_types::{ContentAddress, HashAlgorithm};

/// Hashes bytes into self-describing content addresses.
///
/// The hasher's algorithm is only used when producing new addresses.
/// Verification always uses the algorithm named inside the expected address,
/// so data hashed under any supported algorithm can be checked by any hasher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContentHasher {
    algorithm: HashAlgorithm,
}

impl ContentHasher {
    /// Hasher producing BLAKE3 addresses.
    pub const BLAKE3: Self = Self {
        algorithm: HashAlgorithm::Blake3,
    };
    /// Hasher producing SHA2-256 addresses.
    pub const SHA2_256: Self = Self {
        algorithm: HashAlgorithm::Sha2_256,
    };

    pub const fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Hash raw bytes.
    pub fn hash(&self, data: &[u8]) -> ContentAddress {
        ContentAddress::from_digest(self.algorithm, Self::raw_hash(self.algorithm, data))
    }

    /// Verify that data produces the expected address under the address's own algorithm.
    pub fn verify(data: &[u8], expected: &ContentAddress) -> bool {
        Self::raw_hash(expected.algorithm(), data).as_slice() == expected.digest()
    }

    /// Raw 32-byte digest without the self-describing prefix.
    pub fn raw_hash(algorithm: HashAlgorithm, data: &[u8]) -> [u8; 32] {
        match algorithm {
            HashAlgorithm::Blake3 => *blake3::hash(data).as_bytes(),
            HashAlgorithm::Sha2_256 => sha2::Sha256::digest(data).into(),
        }
    }

    /// The algorithm used for new addresses.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}
