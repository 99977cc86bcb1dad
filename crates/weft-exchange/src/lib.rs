//! Block exchange for weft.
//!
//! Peers ask each other for blocks they are missing and serve the blocks
//! they hold. A peer keeps a per-peer ledger of outstanding wants, so a block
//! that arrives later is pushed to whoever asked for it.
//!
//! # Capabilities
//!
//! - [`ExchangeClient`] -- fetch blocks by content address
//! - [`ExchangeServer`] -- serve a local [`BlockStore`](weft_blocks::BlockStore)
//! - [`ContentRouting`] -- find which peers hold a block
//!
//! [`Peer`] implements both client and server over any [`Transport`];
//! [`MemoryNetwork`] connects peers in-process. [`BlockService`] puts a local
//! store in front of an exchange.
//!
//! # Design Rules
//!
//! 1. Every received block is verified before it is stored or delivered.
//! 2. A fetch stream yields each requested block at most once.
//! 3. Wants are withdrawn when a request completes, times out or is cancelled.

pub mod config;
pub mod error;
pub mod message;
pub mod network;
pub mod peer;
pub mod service;
pub mod traits;

pub use config::ExchangeConfig;
pub use error::{ExchangeError, ExchangeResult};
pub use message::{Envelope, Message};
pub use network::{Inbound, MemoryNetwork, MemoryTransport, Transport};
pub use peer::{Peer, PeerBuilder};
pub use service::BlockService;
pub use traits::{BlockStream, ContentRouting, ExchangeClient, ExchangePeer, ExchangeServer};
