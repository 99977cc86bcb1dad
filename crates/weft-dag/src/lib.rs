//! Merkle DAG for weft.
//!
//! Structured objects are [`Node`]s: a data segment plus an ordered table of
//! named, sized [`Link`]s to other nodes. Each node is stored as one block
//! keyed by the address of its canonical encoding, so the graph is acyclic
//! by construction and identical nodes deduplicate.
//!
//! [`DagService`] stores and fetches nodes, walks paths, and hands out
//! [`NodeGetter`] handles for lazy or batched traversal.

pub mod dag;
pub mod error;
pub mod getter;
pub mod node;

pub use dag::DagService;
pub use error::{DagError, DagResult};
pub use getter::NodeGetter;
pub use node::{Link, Node};
