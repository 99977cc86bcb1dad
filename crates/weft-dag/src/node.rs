//! Merkle DAG nodes and links.
//!
//! A [`Node`] is a data segment plus an ordered table of named links. Its
//! canonical encoding is the bincode form of `(links, data)`, which is stable
//! for a given logical node, so the node's address is stable too. Links can
//! only point at addresses that were computed before the node was built,
//! which keeps the graph acyclic.

use std::collections::HashSet;

use bincode::Options;
use serde::{Deserialize, Serialize};
use weft_blocks::Block;
use weft_crypto::ContentHasher;
use weft_types::ContentAddress;

use crate::error::{DagError, DagResult};

/// A named, sized edge to another node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Name, unique among the links of the owning node.
    pub name: String,
    /// Cumulative size of the target subtree. Informational, never verified.
    pub size: u64,
    /// Address of the target node.
    pub target: ContentAddress,
}

impl Link {
    pub fn new(name: impl Into<String>, size: u64, target: ContentAddress) -> Self {
        Self {
            name: name.into(),
            size,
            target,
        }
    }

    /// Link to `node`, addressed with the default hasher.
    pub fn to_node(name: impl Into<String>, node: &Node) -> DagResult<Self> {
        Self::to_node_with(name, node, &ContentHasher::default())
    }

    /// Link to `node`, addressed with `hasher`.
    pub fn to_node_with(
        name: impl Into<String>,
        node: &Node,
        hasher: &ContentHasher,
    ) -> DagResult<Self> {
        Ok(Self::new(name, node.cumulative_size()?, node.address_with(hasher)?))
    }
}

/// A structured object: data plus an ordered link table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNode")]
pub struct Node {
    links: Vec<Link>,
    data: Vec<u8>,
}

#[derive(Deserialize)]
struct RawNode {
    links: Vec<Link>,
    data: Vec<u8>,
}

impl TryFrom<RawNode> for Node {
    type Error = DagError;

    fn try_from(raw: RawNode) -> DagResult<Self> {
        Node::new(raw.data, raw.links)
    }
}

impl Node {
    /// Build a node. Fails if two links share a name.
    pub fn new(data: impl Into<Vec<u8>>, links: Vec<Link>) -> DagResult<Self> {
        let mut seen = HashSet::with_capacity(links.len());
        for link in &links {
            if !seen.insert(link.name.as_str()) {
                return Err(DagError::DuplicateLinkName(link.name.clone()));
            }
        }
        Ok(Self {
            links,
            data: data.into(),
        })
    }

    /// A node without links.
    pub fn leaf(data: impl Into<Vec<u8>>) -> Self {
        Self {
            links: Vec::new(),
            data: data.into(),
        }
    }

    /// Append a link, keeping declared order.
    pub fn add_link(&mut self, link: Link) -> DagResult<()> {
        if self.link(&link.name).is_some() {
            return Err(DagError::DuplicateLinkName(link.name));
        }
        self.links.push(link);
        Ok(())
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The link with the given name.
    pub fn link(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.name == name)
    }

    // ---------------------------------------------------------------
    // Encoding
    // ---------------------------------------------------------------

    /// Canonical bytes.
    pub fn encode(&self) -> DagResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| DagError::Serialization(e.to_string()))
    }

    /// Parse canonical bytes, rejecting duplicate link names and trailing
    /// bytes.
    pub fn decode(bytes: &[u8]) -> DagResult<Self> {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .reject_trailing_bytes()
            .deserialize(bytes)
            .map_err(|e| DagError::Serialization(e.to_string()))
    }

    /// Address under the default hasher.
    pub fn address(&self) -> DagResult<ContentAddress> {
        self.address_with(&ContentHasher::default())
    }

    pub fn address_with(&self, hasher: &ContentHasher) -> DagResult<ContentAddress> {
        Ok(hasher.hash(&self.encode()?))
    }

    /// Encoded size plus the sizes recorded in the links.
    pub fn cumulative_size(&self) -> DagResult<u64> {
        let own = self.encode()?.len() as u64;
        Ok(self.links.iter().fold(own, |acc, l| acc.saturating_add(l.size)))
    }

    /// The block holding this node's encoding.
    pub fn to_block(&self, hasher: &ContentHasher) -> DagResult<Block> {
        Ok(Block::with_hasher(hasher, self.encode()?))
    }

    pub fn from_block(block: &Block) -> DagResult<Self> {
        Self::decode(block.data())
    }
}
