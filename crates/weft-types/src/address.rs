use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Hash algorithm named by the tag of a [`ContentAddress`].
///
/// Tags follow the multihash table so addresses stay interoperable. New
/// algorithms are added here; existing tags never change meaning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashAlgorithm {
    /// SHA2-256, tag `0x12`.
    Sha2_256,
    /// BLAKE3 with a 32-byte output, tag `0x1e`.
    #[default]
    Blake3,
}

impl HashAlgorithm {
    /// Every supported algorithm.
    pub const ALL: [Self; 2] = [Self::Sha2_256, Self::Blake3];

    /// The self-describing tag written in front of the digest.
    pub const fn code(&self) -> u64 {
        match self {
            Self::Sha2_256 => 0x12,
            Self::Blake3 => 0x1e,
        }
    }

    /// Look up an algorithm by tag.
    pub fn from_code(code: u64) -> Result<Self, TypeError> {
        match code {
            0x12 => Ok(Self::Sha2_256),
            0x1e => Ok(Self::Blake3),
            other => Err(TypeError::UnsupportedAlgorithm(other)),
        }
    }

    /// Digest length in bytes.
    pub const fn digest_len(&self) -> usize {
        match self {
            Self::Sha2_256 | Self::Blake3 => 32,
        }
    }

    /// Canonical lowercase name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha2_256 => "sha2-256",
            Self::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha2-256" | "sha256" => Ok(Self::Sha2_256),
            "blake3" => Ok(Self::Blake3),
            other => Err(TypeError::InvalidPath(format!("unknown hash algorithm {other:?}"))),
        }
    }
}

impl Serialize for HashAlgorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for HashAlgorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Self-describing digest used as the universal storage key.
///
/// Encoded as `varint(tag) || varint(len) || digest`. Equal content hashed
/// with the same algorithm always yields an equal address. The address never
/// hashes anything itself; hashing lives in `weft-crypto`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentAddress {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl ContentAddress {
    /// Wrap a pre-computed digest.
    pub fn new(algorithm: HashAlgorithm, digest: Vec<u8>) -> Result<Self, TypeError> {
        if digest.len() != algorithm.digest_len() {
            return Err(TypeError::InvalidLength {
                algorithm: algorithm.name(),
                expected: algorithm.digest_len(),
                actual: digest.len(),
            });
        }
        Ok(Self { algorithm, digest })
    }

    /// Wrap a 32-byte digest. Every supported algorithm produces 32 bytes.
    pub fn from_digest(algorithm: HashAlgorithm, digest: [u8; 32]) -> Self {
        debug_assert_eq!(algorithm.digest_len(), 32);
        Self {
            algorithm,
            digest: digest.to_vec(),
        }
    }

    /// The algorithm that produced the digest.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The raw digest bytes.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Self-describing byte encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.digest.len() + 4);
        write_varint(self.algorithm.code(), &mut out);
        write_varint(self.digest.len() as u64, &mut out);
        out.extend_from_slice(&self.digest);
        out
    }

    /// Decode a self-describing byte encoding. The whole slice must be consumed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        let (code, rest) = read_varint(bytes)?;
        let algorithm = HashAlgorithm::from_code(code)?;
        let (len, rest) = read_varint(rest)?;
        let len = usize::try_from(len).map_err(|_| TypeError::InvalidVarint)?;
        if len != algorithm.digest_len() {
            return Err(TypeError::InvalidLength {
                algorithm: algorithm.name(),
                expected: algorithm.digest_len(),
                actual: len,
            });
        }
        if rest.len() < len {
            return Err(TypeError::Truncated {
                expected: len,
                actual: rest.len(),
            });
        }
        if rest.len() > len {
            return Err(TypeError::TrailingBytes(rest.len() - len));
        }
        Ok(Self {
            algorithm,
            digest: rest.to_vec(),
        })
    }

    /// Hex-encoded string of the full self-describing encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Short hex of the digest (first 8 characters), for logs.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.digest[..4.min(self.digest.len())])
    }

    /// Parse from the hex form produced by [`ContentAddress::to_hex`].
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentAddress({}:{})", self.algorithm, self.short_hex())
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for ContentAddress {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ContentAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for ContentAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Unsigned LEB128
// ---------------------------------------------------------------------------

fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Only minimal encodings are accepted: a multi-byte varint may not end in a
/// zero byte.
fn read_varint(bytes: &[u8]) -> Result<(u64, &[u8]), TypeError> {
    let mut value: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            if i > 0 && byte == 0 {
                return Err(TypeError::InvalidVarint);
            }
            return Ok((value, &bytes[i + 1..]));
        }
    }
    Err(TypeError::InvalidVarint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(alg: HashAlgorithm, fill: u8) -> ContentAddress {
        ContentAddress::new(alg, vec![fill; alg.digest_len()]).unwrap()
    }

    #[test]
    fn encoding_is_tag_len_digest() {
        let a = addr(HashAlgorithm::Sha2_256, 0xaa);
        let bytes = a.to_bytes();
        assert_eq!(bytes[0], 0x12);
        assert_eq!(bytes[1], 32);
        assert_eq!(&bytes[2..], &[0xaa; 32]);
    }

    #[test]
    fn bytes_roundtrip_for_every_algorithm() {
        for alg in [HashAlgorithm::Sha2_256, HashAlgorithm::Blake3] {
            let a = addr(alg, 7);
            assert_eq!(ContentAddress::from_bytes(&a.to_bytes()).unwrap(), a);
        }
    }

    #[test]
    fn rejects_unknown_tag() {
        let err = ContentAddress::from_bytes(&[0x55, 0x01, 0x00]).unwrap_err();
        assert_eq!(err, TypeError::UnsupportedAlgorithm(0x55));
    }

    #[test]
    fn rejects_truncated_and_trailing() {
        let mut bytes = addr(HashAlgorithm::Blake3, 1).to_bytes();
        bytes.push(0);
        assert_eq!(
            ContentAddress::from_bytes(&bytes).unwrap_err(),
            TypeError::TrailingBytes(1)
        );
        bytes.truncate(10);
        assert!(matches!(
            ContentAddress::from_bytes(&bytes).unwrap_err(),
            TypeError::Truncated { expected: 32, actual: 8 }
        ));
    }

    #[test]
    fn rejects_wrong_digest_length() {
        assert!(ContentAddress::new(HashAlgorithm::Blake3, vec![0; 20]).is_err());
        assert!(ContentAddress::from_bytes(&[0x1e, 20]).is_err());
    }

    #[test]
    fn rejects_unterminated_varint() {
        assert_eq!(
            ContentAddress::from_bytes(&[0x80, 0x80]).unwrap_err(),
            TypeError::InvalidVarint
        );
    }

    #[test]
    fn rejects_non_minimal_varint() {
        assert_eq!(read_varint(&[0x92, 0x00]).unwrap_err(), TypeError::InvalidVarint);
        let canonical = addr(HashAlgorithm::Sha2_256, 0x01).to_bytes();
        let mut padded = vec![0x92, 0x00];
        padded.extend_from_slice(&canonical[1..]);
        assert_eq!(
            ContentAddress::from_bytes(&padded).unwrap_err(),
            TypeError::InvalidVarint
        );
        assert_eq!(read_varint(&[0x00]).unwrap().0, 0);
    }

    #[test]
    fn varint_multi_byte() {
        let mut out = Vec::new();
        write_varint(300, &mut out);
        assert_eq!(out, vec![0xac, 0x02]);
        assert_eq!(read_varint(&out).unwrap().0, 300);
    }

    #[test]
    fn hex_roundtrip() {
        let a = addr(HashAlgorithm::Blake3, 0x42);
        let parsed: ContentAddress = a.to_hex().parse().unwrap();
        assert_eq!(a, parsed);
        assert!(a.to_hex().starts_with("1e20"));
    }

    #[test]
    fn short_hex_is_8_chars() {
        assert_eq!(addr(HashAlgorithm::Blake3, 1).short_hex().len(), 8);
    }

    #[test]
    fn serde_json_and_bincode_roundtrip() {
        let a = addr(HashAlgorithm::Sha2_256, 9);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(serde_json::from_str::<ContentAddress>(&json).unwrap(), a);
        let bin = bincode::serialize(&a).unwrap();
        assert_eq!(bincode::deserialize::<ContentAddress>(&bin).unwrap(), a);
    }

    #[test]
    fn algorithm_names_parse() {
        assert_eq!("blake3".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Blake3);
        assert_eq!("sha2-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha2_256);
        assert!("md5".parse::<HashAlgorithm>().is_err());
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Blake3);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
                let _ = ContentAddress::from_bytes(&bytes);
            }

            #[test]
            fn any_digest_roundtrips(digest in proptest::collection::vec(any::<u8>(), 32)) {
                let a = ContentAddress::new(HashAlgorithm::Blake3, digest).unwrap();
                prop_assert_eq!(ContentAddress::from_hex(&a.to_hex()).unwrap(), a);
            }
        }
    }
}
