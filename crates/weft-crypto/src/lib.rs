//! Cryptographic collaborators for weft.
//!
//! Provides content hashing into self-describing [`ContentAddress`]es,
//! Ed25519 signing/verification behind the [`Signer`] capability, and the
//! [`Host`] capability that ties a peer identity to its key. Encryption is
//! named as capabilities only ([`Encrypter`], [`Decrypter`], [`Cipher`]).
//!
//! All crypto operations wrap established libraries; no custom cryptography.
//!
//! [`ContentAddress`]: weft_types::ContentAddress

pub mod cipher;
pub mod hasher;
pub mod host;
pub mod signer;

pub use cipher::{Cipher, CipherError, CipherResult, Ciphertext, Decrypter, Encrypter, SymmetricKey};
pub use hasher::ContentHasher;
pub use host::{Host, LocalHost};
pub use signer::{PublicKey, Signature, SignatureError, Signer, SigningKey};
