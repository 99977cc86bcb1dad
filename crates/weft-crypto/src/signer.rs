use serde::{Deserialize, Deserializer, Serialize, Serializer};
use weft_types::{HashAlgorithm, PeerId};

use crate::hasher::ContentHasher;

/// Signing capability consumed by records and hosts.
///
/// Callers depend on this trait rather than on a key type, so alternative
/// schemes (hardware keys, remote signers) can be plugged in.
pub trait Signer: Send + Sync {
    /// Sign a message.
    fn sign(&self, message: &[u8]) -> Signature;

    /// The public half of the signing key.
    fn public_key(&self) -> PublicKey;
}

/// Ed25519 signing key (private).
#[derive(Clone)]
pub struct SigningKey(ed25519_dalek::SigningKey);

/// Ed25519 public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(ed25519_dalek::VerifyingKey);

/// Ed25519 signature.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "signature_serde")] ed25519_dalek::Signature);

impl SigningKey {
    /// Generate a new random signing key.
    pub fn generate() -> Self {
        let mut csprng = rand::thread_rng();
        Self(ed25519_dalek::SigningKey::generate(&mut csprng))
    }

    /// Create from raw 32-byte secret.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&bytes))
    }

    /// Raw secret key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

impl Signer for SigningKey {
    fn sign(&self, message: &[u8]) -> Signature {
        use ed25519_dalek::Signer as _;
        Signature(self.0.sign(message))
    }

    fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }
}

impl PublicKey {
    /// Verify a signature on a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), SignatureError> {
        use ed25519_dalek::Verifier;
        self.0
            .verify(message, &signature.0)
            .map_err(|_| SignatureError::InvalidSignature)
    }

    /// The peer identity for this key: the content address of its raw bytes.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id_with(HashAlgorithm::default())
    }

    /// The peer identity under a specific hash algorithm.
    pub fn peer_id_with(&self, algorithm: HashAlgorithm) -> PeerId {
        PeerId::from_address(ContentHasher::new(algorithm).hash(&self.to_bytes()))
    }

    /// Whether `id` is the content address of this key, under the id's algorithm.
    pub fn matches(&self, id: &PeerId) -> bool {
        ContentHasher::verify(&self.to_bytes(), id.as_address())
    }

    /// Raw public key bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Create from raw 32-byte public key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| SignatureError::InvalidKey)?;
        let key =
            ed25519_dalek::VerifyingKey::from_bytes(&arr).map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self(key))
    }
}

impl Signature {
    /// Raw 64-byte signature.
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }

    /// Create from raw bytes; the length must be 64.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| SignatureError::InvalidSignature)?;
        Ok(Self(ed25519_dalek::Signature::from_bytes(&arr)))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey(<redacted>)")
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0.to_bytes()))
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({}...)", hex::encode(&self.0.to_bytes()[..8]))
    }
}

/// Errors from signing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid key")]
    InvalidKey,
}

mod signature_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(sig: &ed25519_dalek::Signature, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&sig.to_bytes())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<ed25519_dalek::Signature, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 64-byte signature"))?;
        Ok(ed25519_dalek::Signature::from_bytes(&arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let sk = SigningKey::generate();
        let pk = sk.public_key();
        let sig = sk.sign(b"hello world");
        assert!(pk.verify(b"hello world", &sig).is_ok());
    }

    #[test]
    fn verify_fails_on_wrong_message() {
        let sk = SigningKey::generate();
        let sig = sk.sign(b"correct message");
        assert_eq!(
            sk.public_key().verify(b"wrong message", &sig),
            Err(SignatureError::InvalidSignature)
        );
    }

    #[test]
    fn verify_fails_with_wrong_key() {
        let sk1 = SigningKey::generate();
        let sk2 = SigningKey::generate();
        let sig = sk1.sign(b"message");
        assert!(sk2.public_key().verify(b"message", &sig).is_err());
    }

    #[test]
    fn peer_id_is_hash_of_key() {
        let pk = SigningKey::generate().public_key();
        let id = pk.peer_id();
        assert_eq!(id, pk.peer_id());
        assert_eq!(id.as_address(), &ContentHasher::BLAKE3.hash(&pk.to_bytes()));
        assert!(pk.matches(&id));
        assert!(pk.matches(&pk.peer_id_with(HashAlgorithm::Sha2_256)));
    }

    #[test]
    fn other_key_does_not_match() {
        let a = SigningKey::generate().public_key();
        let b = SigningKey::generate().public_key();
        assert!(!a.matches(&b.peer_id()));
    }

    #[test]
    fn from_bytes_roundtrip() {
        let sk = SigningKey::generate();
        let sk2 = SigningKey::from_bytes(*sk.as_bytes());
        assert_eq!(sk.public_key(), sk2.public_key());
        let pk = PublicKey::from_bytes(&sk.public_key().to_bytes()).unwrap();
        assert_eq!(pk, sk.public_key());
    }

    #[test]
    fn public_key_rejects_bad_length() {
        assert_eq!(PublicKey::from_bytes(&[0u8; 31]), Err(SignatureError::InvalidKey));
    }

    #[test]
    fn signature_serde_roundtrip() {
        let sig = SigningKey::generate().sign(b"test");
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(serde_json::from_str::<Signature>(&json).unwrap(), sig);
        let raw = Signature::from_bytes(&sig.to_bytes()).unwrap();
        assert_eq!(raw, sig);
    }

    #[test]
    fn public_key_bincode_roundtrip() {
        let pk = SigningKey::generate().public_key();
        let bytes = bincode::serialize(&pk).unwrap();
        assert_eq!(bincode::deserialize::<PublicKey>(&bytes).unwrap(), pk);
    }

    #[test]
    fn debug_redacts_signing_key() {
        let debug = format!("{:?}", SigningKey::generate());
        assert!(debug.contains("redacted"));
    }
}
