use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use weft_blocks::{Block, BlockNotifiee, BlockStore};
use weft_types::{ContentAddress, PeerId};

use crate::config::ExchangeConfig;
use crate::error::{ExchangeError, ExchangeResult};
use crate::message::{Envelope, Message};
use crate::network::{Inbound, Transport};
use crate::traits::{BlockStream, ContentRouting, ExchangeClient, ExchangeServer};

/// Per-request channels waiting for a key to arrive locally.
type Waiters = HashMap<ContentAddress, HashMap<u64, mpsc::UnboundedSender<Block>>>;

#[derive(Default)]
struct PeerState {
    waiters: Waiters,
    /// Keys each remote peer asked for that we did not have yet.
    ledgers: HashMap<PeerId, HashSet<ContentAddress>>,
}

struct PeerInner {
    store: Arc<dyn BlockStore>,
    transport: Arc<dyn Transport>,
    routing: Option<Arc<dyn ContentRouting>>,
    config: ExchangeConfig,
    state: Mutex<PeerState>,
    next_request: AtomicU64,
    shutdown: CancellationToken,
}

/// Exchange peer: fetches missing blocks from other peers and serves local ones.
///
/// A `Peer` is a cheap, cloneable handle. It registers itself as a listener
/// on its block store, so blocks stored by anyone (local callers or inbound
/// messages) wake pending fetches and are pushed to peers that asked for them.
#[derive(Clone)]
pub struct Peer {
    inner: Arc<PeerInner>,
}

/// Builder for [`Peer`].
pub struct PeerBuilder {
    store: Arc<dyn BlockStore>,
    config: ExchangeConfig,
    routing: Option<Arc<dyn ContentRouting>>,
}

impl PeerBuilder {
    pub fn config(mut self, config: ExchangeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use content routing to find providers and to announce new blocks.
    pub fn routing(mut self, routing: Arc<dyn ContentRouting>) -> Self {
        self.routing = Some(routing);
        self
    }

    /// Attach to a transport and start the inbound message loop.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(self, transport: Arc<dyn Transport>, inbound: Inbound) -> Peer {
        let inner = Arc::new(PeerInner {
            store: self.store,
            transport,
            routing: self.routing,
            config: self.config,
            state: Mutex::new(PeerState::default()),
            next_request: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        });
        inner.store.notifier().add(&inner);
        tokio::spawn(inbound_loop(
            Arc::downgrade(&inner),
            inbound,
            inner.shutdown.clone(),
        ));
        info!(peer = %inner.transport.local_peer().short_id(), "exchange peer started");
        Peer { inner }
    }
}

impl Peer {
    pub fn builder(store: Arc<dyn BlockStore>) -> PeerBuilder {
        PeerBuilder {
            store,
            config: ExchangeConfig::default(),
            routing: None,
        }
    }

    /// Identity of this peer.
    pub fn id(&self) -> &PeerId {
        self.inner.transport.local_peer()
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.inner.config
    }

    /// Keys this peer is currently waiting for.
    pub fn wantlist(&self) -> Vec<ContentAddress> {
        let state = self.inner.state.lock().expect("lock poisoned");
        state.waiters.keys().cloned().collect()
    }

    /// Keys `peer` asked for that this peer does not have yet.
    pub fn wantlist_for_peer(&self, peer: &PeerId) -> Vec<ContentAddress> {
        let state = self.inner.state.lock().expect("lock poisoned");
        state
            .ledgers
            .get(peer)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Stop handling inbound messages and stop listening to the store.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.store.notifier().remove(&self.inner);
        debug!(peer = %self.id().short_id(), "exchange peer shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("id", self.id())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl Drop for PeerInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn inbound_loop(inner: Weak<PeerInner>, mut inbound: Inbound, shutdown: CancellationToken) {
    loop {
        let envelope = tokio::select! {
            _ = shutdown.cancelled() => break,
            envelope = inbound.recv() => match envelope {
                Some(envelope) => envelope,
                None => break,
            },
        };
        let Some(peer) = inner.upgrade() else {
            break;
        };
        peer.handle(envelope);
    }
    trace!("inbound loop stopped");
}

// ---------------------------------------------------------------------------
// Serving
// ---------------------------------------------------------------------------

impl PeerInner {
    fn handle(&self, envelope: Envelope) {
        let Envelope { from, message } = envelope;
        match message {
            Message::Want { keys } => self.handle_want(from, keys),
            Message::Cancel { keys } => {
                let mut state = self.state.lock().expect("lock poisoned");
                if let Some(ledger) = state.ledgers.get_mut(&from) {
                    for key in &keys {
                        ledger.remove(key);
                    }
                    if ledger.is_empty() {
                        state.ledgers.remove(&from);
                    }
                }
                trace!(peer = %from.short_id(), count = keys.len(), "received cancel");
            }
            Message::Blocks { blocks } => self.handle_blocks(from, blocks),
        }
    }

    fn handle_want(&self, from: PeerId, keys: Vec<ContentAddress>) {
        debug!(peer = %from.short_id(), count = keys.len(), "received want");
        // Check and record under the state lock, so a block stored meanwhile is
        // either found here or seen in the ledger by `push_to_interested`.
        let found = {
            let mut state = self.state.lock().expect("lock poisoned");
            let mut found = Vec::new();
            for key in keys {
                match self.store.get(&key) {
                    Ok(block) => found.push(block),
                    Err(_) => {
                        state.ledgers.entry(from.clone()).or_default().insert(key);
                    }
                }
            }
            found
        };
        if !found.is_empty() {
            debug!(peer = %from.short_id(), count = found.len(), "serving blocks");
            if let Err(e) = self.transport.send(&from, Message::Blocks { blocks: found }) {
                debug!(peer = %from.short_id(), error = %e, "failed to serve blocks");
            }
        }
    }

    fn handle_blocks(&self, from: PeerId, blocks: Vec<Block>) {
        for block in blocks {
            if !block.verify() {
                warn!(
                    peer = %from.short_id(),
                    key = %block.key().short_hex(),
                    "dropping block with mismatched address"
                );
                continue;
            }
            trace!(peer = %from.short_id(), key = %block.key().short_hex(), "received block");
            // Storing fires the notifier, which wakes waiters.
            if let Err(e) = self.store.put(block) {
                warn!(peer = %from.short_id(), error = %e, "failed to store received block");
            }
        }
    }

    fn wake_waiters(&self, block: &Block) {
        let senders = {
            let mut state = self.state.lock().expect("lock poisoned");
            state.waiters.remove(block.key())
        };
        for (_, sender) in senders.into_iter().flatten() {
            let _ = sender.send(block.clone());
        }
    }

    fn push_to_interested(&self, block: &Block) {
        let interested: Vec<PeerId> = {
            let mut state = self.state.lock().expect("lock poisoned");
            let mut interested = Vec::new();
            state.ledgers.retain(|peer, keys| {
                if keys.remove(block.key()) {
                    interested.push(peer.clone());
                }
                !keys.is_empty()
            });
            interested
        };
        for peer in interested {
            debug!(peer = %peer.short_id(), key = %block.key().short_hex(), "pushing wanted block");
            let msg = Message::Blocks {
                blocks: vec![block.clone()],
            };
            if let Err(e) = self.transport.send(&peer, msg) {
                debug!(peer = %peer.short_id(), error = %e, "failed to push block");
            }
        }
    }

    fn announce(&self, key: &ContentAddress) {
        let Some(routing) = self.routing.clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let key = key.clone();
        handle.spawn(async move {
            if let Err(e) = routing.provide(&key).await {
                debug!(key = %key.short_hex(), error = %e, "failed to announce block");
            }
        });
    }
}

impl BlockNotifiee for PeerInner {
    fn block_put(&self, block: &Block) {
        self.wake_waiters(block);
    }

    fn new_block_put(&self, block: &Block) {
        self.push_to_interested(block);
        self.announce(block.key());
    }
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

impl PeerInner {
    fn register(
        &self,
        keys: &HashSet<ContentAddress>,
        sender: &mpsc::UnboundedSender<Block>,
    ) -> u64 {
        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock().expect("lock poisoned");
        for key in keys {
            state
                .waiters
                .entry(key.clone())
                .or_default()
                .insert(id, sender.clone());
        }
        id
    }

    fn unregister(&self, id: u64, keys: &HashSet<ContentAddress>) {
        let mut state = self.state.lock().expect("lock poisoned");
        for key in keys {
            if let Some(by_request) = state.waiters.get_mut(key) {
                by_request.remove(&id);
                if by_request.is_empty() {
                    state.waiters.remove(key);
                }
            }
        }
    }

    fn broadcast(&self, message: &Message) {
        for peer in self.transport.peers() {
            if let Err(e) = self.transport.send(&peer, message.clone()) {
                debug!(peer = %peer.short_id(), error = %e, "failed to send {}", message.kind());
            }
        }
    }

    /// Ask providers found through routing, in the background until `cancel`.
    fn query_providers(&self, keys: &HashSet<ContentAddress>, cancel: &CancellationToken) {
        let Some(routing) = self.routing.clone() else {
            return;
        };
        let local = self.transport.local_peer().clone();
        for key in keys {
            let mut providers = routing
                .find_providers(key, cancel.clone())
                .take(self.config.max_providers);
            let transport = Arc::clone(&self.transport);
            let key = key.clone();
            let local = local.clone();
            tokio::spawn(async move {
                while let Some(provider) = providers.next().await {
                    if provider == local {
                        continue;
                    }
                    trace!(provider = %provider.short_id(), key = %key.short_hex(), "asking provider");
                    let want = Message::Want {
                        keys: vec![key.clone()],
                    };
                    if let Err(e) = transport.send(&provider, want) {
                        debug!(provider = %provider.short_id(), error = %e, "provider unreachable");
                    }
                }
            });
        }
    }

    async fn fetch(
        self: Arc<Self>,
        keys: Vec<ContentAddress>,
        out: mpsc::Sender<ExchangeResult<Block>>,
        cancel: CancellationToken,
    ) {
        let requested: HashSet<ContentAddress> = keys.into_iter().collect();
        let (tx, mut arrivals) = mpsc::unbounded_channel();
        // Register before checking the store so no arrival is missed.
        let request = self.register(&requested, &tx);
        drop(tx);

        let mut pending = requested.clone();
        for key in &requested {
            if let Ok(block) = self.store.get(key) {
                pending.remove(key);
                if out.send(Ok(block)).await.is_err() {
                    self.unregister(request, &requested);
                    return;
                }
            }
        }

        let failure = if pending.is_empty() {
            None
        } else {
            self.await_remote(&mut pending, &mut arrivals, &out, &cancel)
                .await
        };

        self.unregister(request, &requested);
        if !pending.is_empty() {
            self.broadcast(&Message::Cancel {
                keys: pending.into_iter().collect(),
            });
        }
        if let Some(err) = failure {
            let _ = out.send(Err(err)).await;
        }
    }

    /// Wait for `pending` to arrive from peers. Returns the error that ended
    /// the wait early, or `None` once everything arrived or the consumer left.
    async fn await_remote(
        &self,
        pending: &mut HashSet<ContentAddress>,
        arrivals: &mut mpsc::UnboundedReceiver<Block>,
        out: &mpsc::Sender<ExchangeResult<Block>>,
        cancel: &CancellationToken,
    ) -> Option<ExchangeError> {
        if self.transport.peers().is_empty() && self.routing.is_none() {
            return pending
                .iter()
                .next()
                .map(|key| ExchangeError::Unavailable(key.clone()));
        }

        debug!(
            peer = %self.transport.local_peer().short_id(),
            count = pending.len(),
            "requesting blocks"
        );
        self.broadcast(&Message::Want {
            keys: pending.iter().cloned().collect(),
        });
        let lookup = cancel.child_token();
        let _lookup_guard = lookup.clone().drop_guard();
        self.query_providers(pending, &lookup);

        let deadline = tokio::time::sleep(self.config.timeout);
        tokio::pin!(deadline);
        let interval = self.config.rebroadcast_interval;
        let mut rebroadcast =
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        let mut rebroadcasts = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Some(ExchangeError::Cancelled),
                _ = self.shutdown.cancelled() => return Some(ExchangeError::Cancelled),
                _ = &mut deadline => {
                    debug!(missing = pending.len(), "block request timed out");
                    return Some(ExchangeError::Timeout(self.config.timeout));
                }
                _ = out.closed() => return None,
                _ = rebroadcast.tick(), if rebroadcasts < self.config.max_rebroadcasts => {
                    rebroadcasts += 1;
                    trace!(attempt = rebroadcasts, missing = pending.len(), "rebroadcasting wants");
                    self.broadcast(&Message::Want {
                        keys: pending.iter().cloned().collect(),
                    });
                }
                Some(block) = arrivals.recv() => {
                    if pending.remove(block.key()) {
                        if out.send(Ok(block)).await.is_err() || pending.is_empty() {
                            return None;
                        }
                    }
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl ExchangeClient for Peer {
    fn get_blocks(&self, keys: Vec<ContentAddress>, cancel: CancellationToken) -> BlockStream {
        let (tx, rx) = mpsc::channel(keys.len().max(1));
        tokio::spawn(Arc::clone(&self.inner).fetch(keys, tx, cancel));
        ReceiverStream::new(rx).boxed()
    }
}

impl BlockNotifiee for Peer {
    fn block_put(&self, block: &Block) {
        self.inner.block_put(block);
    }

    fn new_block_put(&self, block: &Block) {
        self.inner.new_block_put(block);
    }
}

impl ExchangeServer for Peer {
    fn block_store(&self) -> Arc<dyn BlockStore> {
        Arc::clone(&self.inner.store)
    }
}
