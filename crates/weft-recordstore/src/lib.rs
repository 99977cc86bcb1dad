//! Record stores for weft.
//!
//! A [`RecordStore`] keeps any number of records under a logical
//! [`RecordKey`] and streams them back on request. Conflicts between records
//! under one key are resolved by readers, with [`resolve_current`].
//!
//! # Backings
//!
//! - [`DatastoreRecordStore`] -- bounded record sets in a local datastore
//! - [`DhtRecordStore`] -- values spread over a [`Dht`] such as [`MemoryDht`]
//! - [`TieredRecordStore`] -- several stores queried together
//!
//! # Design Rules
//!
//! 1. Puts append; nothing is overwritten.
//! 2. Leaf stores reject records their validator refuses.
//! 3. Reads from untrusted backings drop invalid values instead of failing.

pub mod config;
pub mod datastore;
pub mod dht;
pub mod key;
pub mod resolve;
pub mod store;
pub mod tiered;

pub use config::{DhtConfig, RecordStoreConfig};
pub use datastore::DatastoreRecordStore;
pub use dht::{Dht, DhtRecordStore, MemoryDht, ValueStream};
pub use key::RecordKey;
pub use resolve::{collect_valid, resolve_current};
pub use store::{RecordStore, RecordStream};
pub use tiered::{PutPolicy, TieredRecordStore};
