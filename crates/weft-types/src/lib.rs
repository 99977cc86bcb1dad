//! Foundation types for weft.
//!
//! This crate provides the value types every other weft crate builds on.
//! None of them perform I/O or hashing.
//!
//! # Key Types
//!
//! - [`ContentAddress`] -- Self-describing digest used as a storage key
//! - [`HashAlgorithm`] -- Algorithm tag table for content addresses
//! - [`PeerId`] -- Peer identity, the address of a public key
//! - [`NetAddr`] -- Multiaddr-style network address
//! - [`Path`] -- `/ipfs/` and `/ipns/` paths

pub mod address;
pub mod error;
pub mod path;
pub mod peer;

pub use address::{ContentAddress, HashAlgorithm};
pub use error::TypeError;
pub use path::{Namespace, Path};
pub use peer::{NetAddr, PeerId};
