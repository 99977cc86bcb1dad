//! Encryption capabilities.
//!
//! weft carries no encryption primitive of its own. Deployments that need
//! confidentiality plug theirs in behind these traits: [`Encrypter`] and
//! [`Decrypter`] for the public/private halves of a key pair, and [`Cipher`]
//! for symmetric keys.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Encrypted bytes. Opaque outside the scheme that produced them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ciphertext(Vec<u8>);

impl Ciphertext {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Ciphertext {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Secret key material for a [`Cipher`]. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey(Vec<u8>);

impl SymmetricKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// A fresh random 32-byte key.
    pub fn generate() -> Self {
        Self(rand::random::<[u8; 32]>().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SymmetricKey({} bytes)", self.0.len())
    }
}

/// Errors from encryption capabilities.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("encryption failed: {0}")]
    Encrypt(String),
    /// Malformed ciphertext, a failed integrity check, or the wrong key.
    #[error("decryption failed: {0}")]
    Decrypt(String),
    #[error("unsupported key: {0}")]
    UnsupportedKey(String),
}

pub type CipherResult<T> = Result<T, CipherError>;

/// Encrypt to the holder of a private key.
pub trait Encrypter: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> CipherResult<Ciphertext>;
}

/// Decrypt what an [`Encrypter`] for the matching public key produced.
pub trait Decrypter: Send + Sync {
    fn decrypt(&self, ciphertext: &Ciphertext) -> CipherResult<Vec<u8>>;
}

/// Symmetric encryption under a caller-supplied key.
pub trait Cipher: Send + Sync {
    fn encrypt(&self, key: &SymmetricKey, plaintext: &[u8]) -> CipherResult<Ciphertext>;

    fn decrypt(&self, key: &SymmetricKey, ciphertext: &Ciphertext) -> CipherResult<Vec<u8>>;
}

impl<E: Encrypter + ?Sized> Encrypter for Arc<E> {
    fn encrypt(&self, plaintext: &[u8]) -> CipherResult<Ciphertext> {
        (**self).encrypt(plaintext)
    }
}

impl<D: Decrypter + ?Sized> Decrypter for Arc<D> {
    fn decrypt(&self, ciphertext: &Ciphertext) -> CipherResult<Vec<u8>> {
        (**self).decrypt(ciphertext)
    }
}

impl<C: Cipher + ?Sized> Cipher for Arc<C> {
    fn encrypt(&self, key: &SymmetricKey, plaintext: &[u8]) -> CipherResult<Ciphertext> {
        (**self).encrypt(key, plaintext)
    }

    fn decrypt(&self, key: &SymmetricKey, ciphertext: &Ciphertext) -> CipherResult<Vec<u8>> {
        (**self).decrypt(key, ciphertext)
    }
}
