//! Content-addressed block storage for weft.
//!
//! A block is an immutable byte payload keyed by the content address of its
//! data. Block stores verify that pairing on every put, never store a block
//! twice, and announce arrivals and deletions to registered listeners.
//!
//! # Layers
//!
//! - [`Datastore`] -- byte key-value storage ([`InMemoryDatastore`], [`FlatFsDatastore`])
//! - [`BlockStore`] -- verified, content-addressed blocks over a datastore
//! - [`Notifier`] / [`BlockNotifiee`] -- put and delete events
//!
//! # Design Rules
//!
//! 1. Address mismatches are rejected before anything is written.
//! 2. Blocks are immutable; re-putting one is a no-op apart from its event.
//! 3. No implicit eviction: blocks leave the store only on explicit delete.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod block;
pub mod datastore;
pub mod error;
pub mod flatfs;
pub mod notify;
pub mod store;

pub use block::Block;
pub use datastore::{Datastore, DsKey, InMemoryDatastore};
pub use error::{BlockError, BlockResult};
pub use flatfs::FlatFsDatastore;
pub use notify::{BlockNotifiee, Notifier};
pub use store::{AllKeys, BlockStore, DatastoreBlockStore, InMemoryBlockStore};
