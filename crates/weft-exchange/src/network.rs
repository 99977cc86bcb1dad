use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::trace;
use weft_types::PeerId;

use crate::error::{ExchangeError, ExchangeResult};
use crate::message::{Envelope, Message};

/// Receiving half of a transport: messages addressed to the local peer.
pub type Inbound = mpsc::UnboundedReceiver<Envelope>;

/// Message transport between exchange peers.
///
/// Connection management, dialing and stream multiplexing live behind this
/// trait. `send` never blocks; delivery is best-effort.
pub trait Transport: Send + Sync {
    /// Identity of the local peer.
    fn local_peer(&self) -> &PeerId;

    /// Currently connected peers, excluding the local one.
    fn peers(&self) -> Vec<PeerId>;

    /// Queue a message for `to`. Peers that are reachable but not connected
    /// (e.g. found through content routing) may still be addressed.
    fn send(&self, to: &PeerId, message: Message) -> ExchangeResult<()>;
}

struct Member {
    sender: mpsc::UnboundedSender<Envelope>,
    listed: bool,
}

/// In-process hub connecting transports, for tests and embedding.
///
/// Every member can send to every other member. Members that joined with
/// [`MemoryNetwork::join`] are also reported by each other's
/// [`Transport::peers`]; members that joined with
/// [`MemoryNetwork::join_unlisted`] are reachable only by id.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    members: Arc<RwLock<HashMap<PeerId, Member>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join as a connected member.
    pub fn join(&self, id: PeerId) -> (Arc<MemoryTransport>, Inbound) {
        self.insert(id, true)
    }

    /// Join without being listed as a connected peer.
    pub fn join_unlisted(&self, id: PeerId) -> (Arc<MemoryTransport>, Inbound) {
        self.insert(id, false)
    }

    fn insert(&self, id: PeerId, listed: bool) -> (Arc<MemoryTransport>, Inbound) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.members
            .write()
            .expect("lock poisoned")
            .insert(id.clone(), Member { sender: tx, listed });
        let transport = Arc::new(MemoryTransport {
            id,
            network: self.clone(),
        });
        (transport, rx)
    }

    /// Remove a member. Its inbound channel closes.
    pub fn leave(&self, id: &PeerId) -> bool {
        self.members
            .write()
            .expect("lock poisoned")
            .remove(id)
            .is_some()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryNetwork")
            .field("members", &self.len())
            .finish()
    }
}

/// A member's handle on a [`MemoryNetwork`].
#[derive(Debug)]
pub struct MemoryTransport {
    id: PeerId,
    network: MemoryNetwork,
}

impl Transport for MemoryTransport {
    fn local_peer(&self) -> &PeerId {
        &self.id
    }

    fn peers(&self) -> Vec<PeerId> {
        let members = self.network.members.read().expect("lock poisoned");
        if !members.get(&self.id).is_some_and(|m| m.listed) {
            return Vec::new();
        }
        members
            .iter()
            .filter(|(id, m)| m.listed && **id != self.id)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn send(&self, to: &PeerId, message: Message) -> ExchangeResult<()> {
        let members = self.network.members.read().expect("lock poisoned");
        let member = members
            .get(to)
            .ok_or_else(|| ExchangeError::Transport(format!("unknown peer {}", to.short_id())))?;
        trace!(from = %self.id.short_id(), to = %to.short_id(), kind = message.kind(), "send");
        member
            .sender
            .send(Envelope {
                from: self.id.clone(),
                message,
            })
            .map_err(|_| ExchangeError::Transport(format!("peer {} closed", to.short_id())))
    }
}
