//! Composition root for weft.
//!
//! A [`Node`] wires the layers together around one identity:
//!
//! - a block store over a datastore (flat files in a repository, or memory)
//! - a DAG service that fetches missing blocks through the exchange peer
//! - a record store that only accepts signed records, optionally tiered with
//!   a shared DHT
//! - provider announcements used as the exchange's content routing
//!
//! Repository nodes persist their settings, identity and data under one
//! directory; see [`repo`] for the layout.

pub mod config;
pub mod error;
pub mod node;
pub mod repo;

pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};
pub use node::{Node, NodeBuilder};
pub use repo::Repo;
