use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use tracing::info;
use weft_blocks::{Block, BlockStore, Datastore, DatastoreBlockStore, InMemoryDatastore};
use weft_crypto::{ContentHasher, Host, LocalHost, SigningKey};
use weft_dag::DagService;
use weft_exchange::{BlockService, ExchangeClient, MemoryNetwork, Peer};
use weft_provide::{find_providers_with, provide, provider_validator, ProviderRecord, RecordRouting};
use weft_record::{Record, SignatureValidator, SignedRecord, Validator};
use weft_recordstore::{
    resolve_current, DatastoreRecordStore, DhtRecordStore, MemoryDht, RecordKey, RecordStore, TieredRecordStore,
};
use weft_types::{ContentAddress, PeerId};

use crate::config::NodeConfig;
use crate::error::NodeResult;
use crate::repo::Repo;

/// Builder for [`Node`].
pub struct NodeBuilder {
    config: NodeConfig,
    root: Option<PathBuf>,
    identity: Option<SigningKey>,
    dht: Option<MemoryDht>,
    network: Option<MemoryNetwork>,
}

impl NodeBuilder {
    /// Use this identity instead of a fresh one. Ignored for repository nodes.
    pub fn identity(mut self, key: SigningKey) -> Self {
        self.identity = Some(key);
        self
    }

    /// Also keep records in a shared DHT, alongside the local datastore.
    pub fn dht(mut self, dht: MemoryDht) -> Self {
        self.dht = Some(dht);
        self
    }

    /// Join a network and fetch missing blocks from its peers.
    pub fn network(mut self, network: MemoryNetwork) -> Self {
        self.network = Some(network);
        self
    }

    /// Assemble the node. Must be called within a Tokio runtime when a
    /// network is set.
    pub fn build(self) -> NodeResult<Node> {
        let datastore: Arc<dyn Datastore> = match &self.root {
            Some(root) => Arc::new(Repo::datastore_at(root)?),
            None => Arc::new(InMemoryDatastore::new()),
        };
        let host = Arc::new(LocalHost::new(
            self.identity.unwrap_or_else(SigningKey::generate),
            Vec::new(),
        ));
        let validator: Arc<dyn Validator> = Arc::new(SignatureValidator);
        let blocks: Arc<dyn BlockStore> = Arc::new(DatastoreBlockStore::with_datastore(Arc::clone(&datastore)));

        let local: Arc<dyn RecordStore> = Arc::new(DatastoreRecordStore::with_config(
            Arc::clone(&datastore),
            Arc::clone(&validator),
            self.config.records.clone(),
        ));
        let records: Arc<dyn RecordStore> = match self.dht {
            Some(dht) => {
                let remote: Arc<dyn RecordStore> = Arc::new(DhtRecordStore::new(dht, validator));
                Arc::new(TieredRecordStore::new(vec![local, remote]))
            }
            None => local,
        };

        let peer = self.network.map(|network| {
            let routing = RecordRouting::with_ttl(Arc::clone(&records), host.clone(), self.config.provider_ttl());
            let (transport, inbound) = network.join(host.id());
            Peer::builder(Arc::clone(&blocks))
                .config(self.config.exchange.clone())
                .routing(Arc::new(routing))
                .start(transport, inbound)
        });
        let service = match &peer {
            Some(peer) => BlockService::new(
                Arc::clone(&blocks),
                Some(Arc::new(peer.clone()) as Arc<dyn ExchangeClient>),
            ),
            None => BlockService::local(Arc::clone(&blocks)),
        };
        let dag = DagService::with_hasher(service, ContentHasher::new(self.config.hash_algorithm));

        info!(
            peer = %host.id().short_id(),
            root = ?self.root,
            online = peer.is_some(),
            "node ready"
        );
        Ok(Node {
            config: self.config,
            root: self.root,
            host,
            blocks,
            records,
            dag,
            peer,
        })
    }
}

/// A weft node: block store, DAG service, record store and identity, with an
/// optional exchange peer.
pub struct Node {
    config: NodeConfig,
    root: Option<PathBuf>,
    host: Arc<LocalHost>,
    blocks: Arc<dyn BlockStore>,
    records: Arc<dyn RecordStore>,
    dag: DagService,
    peer: Option<Peer>,
}

impl Node {
    /// A builder for a node held entirely in memory.
    pub fn builder(config: NodeConfig) -> NodeBuilder {
        NodeBuilder {
            config,
            root: None,
            identity: None,
            dht: None,
            network: None,
        }
    }

    /// A builder for a node over an opened repository.
    pub fn from_repo(repo: Repo) -> NodeBuilder {
        let (root, config, identity) = repo.into_parts();
        NodeBuilder {
            config,
            root: Some(root),
            identity: Some(identity),
            dht: None,
            network: None,
        }
    }

    pub fn in_memory(config: NodeConfig) -> NodeResult<Self> {
        Self::builder(config).build()
    }

    /// Create a repository at `root` and open a node over it.
    pub fn init(root: impl AsRef<Path>, config: NodeConfig) -> NodeResult<Self> {
        Self::from_repo(Repo::init(root, config)?).build()
    }

    /// Open the repository at `root`.
    pub fn open(root: impl AsRef<Path>) -> NodeResult<Self> {
        Self::from_repo(Repo::open(root)?).build()
    }

    pub fn id(&self) -> PeerId {
        self.host.id()
    }

    pub fn host(&self) -> &Arc<LocalHost> {
        &self.host
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Repository directory, or `None` for an in-memory node.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn blocks(&self) -> &Arc<dyn BlockStore> {
        &self.blocks
    }

    pub fn block_service(&self) -> &BlockService {
        self.dag.blocks()
    }

    pub fn dag(&self) -> &DagService {
        &self.dag
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub fn peer(&self) -> Option<&Peer> {
        self.peer.as_ref()
    }

    pub fn is_online(&self) -> bool {
        self.peer.is_some()
    }

    /// Store raw bytes as a block addressed with the configured algorithm.
    pub fn add_block(&self, data: impl Into<Vec<u8>>) -> NodeResult<ContentAddress> {
        let block = Block::with_hasher(self.dag.hasher(), data);
        let key = block.key().clone();
        self.block_service().put(block)?;
        Ok(key)
    }

    /// Read a block, fetching it from peers if the node is online.
    pub async fn get_block(&self, key: &ContentAddress, cancel: CancellationToken) -> NodeResult<Block> {
        Ok(self.block_service().get(key, cancel).await?)
    }

    /// Announce this node as a provider of `key`.
    pub async fn provide(&self, key: &ContentAddress) -> NodeResult<ProviderRecord> {
        Ok(provide(self.records.as_ref(), key, self.host.as_ref()).await?)
    }

    /// Peers with a valid announcement for `key`, this node included.
    pub fn find_providers(&self, key: &ContentAddress, cancel: CancellationToken) -> BoxStream<'static, PeerId> {
        let validator = provider_validator(key, self.config.provider_ttl());
        find_providers_with(self.records.as_ref(), validator, cancel)
    }

    /// Sign `record` with the node's key and store it under `key`.
    pub async fn publish(&self, key: &RecordKey, record: Record) -> NodeResult<SignedRecord> {
        let signed = SignedRecord::sign(record, self.host.signer())?;
        self.records.put(key, signed.to_record()?).await?;
        info!(key = %key, version = signed.record().version(), "published record");
        Ok(signed)
    }

    /// The current signed record under `key`, if any valid one exists.
    pub async fn resolve(&self, key: &RecordKey, cancel: CancellationToken) -> NodeResult<Option<SignedRecord>> {
        let current = resolve_current(self.records.get(key, cancel), &SignatureValidator).await;
        Ok(current.map(|r| SignedRecord::from_record(&r)).transpose()?)
    }

    /// Stop the exchange peer, if any.
    pub fn shutdown(&self) {
        if let Some(peer) = &self.peer {
            peer.shutdown();
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.host.id())
            .field("root", &self.root)
            .field("online", &self.peer.is_some())
            .finish_non_exhaustive()
    }
}
