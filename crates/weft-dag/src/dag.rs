//! The DAG service: nodes stored as blocks.
//!
//! [`DagService`] layers node encoding over a [`BlockService`], so a node
//! missing locally is fetched through the exchange when one is attached.
//! Node bytes live only in the block store; the service keeps no copies.

use std::collections::{HashMap, HashSet};

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use weft_blocks::Block;
use weft_crypto::ContentHasher;
use weft_exchange::BlockService;
use weft_types::{ContentAddress, HashAlgorithm, Namespace, Path};

use crate::error::{DagError, DagResult};
use crate::getter::NodeGetter;
use crate::node::Node;

/// Stores and retrieves [`Node`]s.
#[derive(Clone, Debug)]
pub struct DagService {
    blocks: BlockService,
    hasher: ContentHasher,
}

impl DagService {
    /// A service addressing new nodes with the default hasher.
    pub fn new(blocks: BlockService) -> Self {
        Self::with_hasher(blocks, ContentHasher::default())
    }

    pub fn with_hasher(blocks: BlockService, hasher: ContentHasher) -> Self {
        Self { blocks, hasher }
    }

    pub fn blocks(&self) -> &BlockService {
        &self.blocks
    }

    pub fn hasher(&self) -> &ContentHasher {
        &self.hasher
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    /// Store a node under the address of its encoding.
    pub fn add(&self, node: &Node) -> DagResult<ContentAddress> {
        let block = node.to_block(&self.hasher)?;
        let key = block.key().clone();
        let is_new = self.blocks.put(block)?;
        debug!(node = %key.short_hex(), links = node.links().len(), is_new, "added node");
        Ok(key)
    }

    /// Store a node and every node reachable from it that is not stored yet.
    ///
    /// Link targets missing locally are looked up in `pending`, keyed by
    /// address, and stored depth-first before the nodes linking to them. A
    /// pending node is stored under the link's address, so it must hash to it.
    pub fn add_recursive(
        &self,
        node: &Node,
        pending: &HashMap<ContentAddress, Node>,
    ) -> DagResult<ContentAddress> {
        let mut visited = HashSet::new();
        for link in node.links() {
            self.add_subtree(&link.target, pending, &mut visited)?;
        }
        self.add(node)
    }

    fn add_subtree(
        &self,
        key: &ContentAddress,
        pending: &HashMap<ContentAddress, Node>,
        visited: &mut HashSet<ContentAddress>,
    ) -> DagResult<()> {
        if !visited.insert(key.clone()) || self.blocks.has(key)? {
            return Ok(());
        }
        let node = pending
            .get(key)
            .ok_or_else(|| DagError::NotFound(key.clone()))?;
        for link in node.links() {
            self.add_subtree(&link.target, pending, visited)?;
        }
        self.blocks.put(Block::with_key(key.clone(), node.encode()?))?;
        trace!(node = %key.short_hex(), "added linked node");
        Ok(())
    }

    /// Delete a node's block and return the address it was stored under.
    ///
    /// The service's own algorithm is tried first, then every other one, so
    /// nodes added by a differently configured service are found too. Linked
    /// nodes are left alone.
    pub fn remove(&self, node: &Node) -> DagResult<ContentAddress> {
        let own = node.address_with(&self.hasher)?;
        if self.blocks.has(&own)? {
            self.remove_key(&own)?;
            return Ok(own);
        }
        for algorithm in HashAlgorithm::ALL {
            if algorithm == self.hasher.algorithm() {
                continue;
            }
            let key = node.address_with(&ContentHasher::new(algorithm))?;
            if self.blocks.has(&key)? {
                self.remove_key(&key)?;
                return Ok(key);
            }
        }
        Err(DagError::NotFound(own))
    }

    pub fn remove_key(&self, key: &ContentAddress) -> DagResult<()> {
        self.blocks.delete(key)?;
        debug!(node = %key.short_hex(), "removed node");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// Fetch one node, locally or through the exchange.
    pub async fn get(&self, key: &ContentAddress, cancel: CancellationToken) -> DagResult<Node> {
        if cancel.is_cancelled() {
            return Err(DagError::Cancelled);
        }
        let block = self.blocks.get(key, cancel).await?;
        Node::from_block(&block)
    }

    /// One lazy handle per direct link of `node`, in link order. Nothing is
    /// fetched until a handle is resolved.
    pub fn get_dag(&self, node: &Node, cancel: CancellationToken) -> Vec<NodeGetter> {
        node.links()
            .iter()
            .map(|link| NodeGetter::lazy(link.target.clone(), self.clone(), cancel.clone()))
            .collect()
    }

    /// One handle per address, in input order, with all fetches started at
    /// once. Outside a tokio runtime the handles are lazy instead.
    pub fn get_nodes(&self, keys: &[ContentAddress], cancel: CancellationToken) -> Vec<NodeGetter> {
        let runtime = Handle::try_current().ok();
        keys.iter()
            .map(|key| match &runtime {
                Some(runtime) => {
                    let (tx, rx) = oneshot::channel();
                    let dag = self.clone();
                    let task_key = key.clone();
                    let task_cancel = cancel.clone();
                    runtime.spawn(async move {
                        let _ = tx.send(dag.get(&task_key, task_cancel).await);
                    });
                    NodeGetter::eager(key.clone(), self.clone(), cancel.clone(), rx)
                }
                None => NodeGetter::lazy(key.clone(), self.clone(), cancel.clone()),
            })
            .collect()
    }

    /// Walk a content path link by link and return the final node.
    pub async fn resolve_path(&self, path: &Path, cancel: CancellationToken) -> DagResult<Node> {
        Ok(self.walk(path, cancel).await?.1)
    }

    /// Address of the node a content path points at.
    pub async fn resolve_address(
        &self,
        path: &Path,
        cancel: CancellationToken,
    ) -> DagResult<ContentAddress> {
        Ok(self.walk(path, cancel).await?.0)
    }

    async fn walk(
        &self,
        path: &Path,
        cancel: CancellationToken,
    ) -> DagResult<(ContentAddress, Node)> {
        let mut key = match path.root() {
            Namespace::Content(address) => address.clone(),
            Namespace::Name(name) => return Err(DagError::UnsupportedNamespace(name.clone())),
        };
        let mut node = self.get(&key, cancel.clone()).await?;
        for segment in path.segments() {
            let link = node.link(segment).ok_or_else(|| DagError::LinkNotFound {
                node: key.clone(),
                name: segment.clone(),
            })?;
            key = link.target.clone();
            node = self.get(&key, cancel.clone()).await?;
        }
        Ok((key, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Link;
    use futures::stream::{self, StreamExt};
    use std::sync::Arc;
    use std::time::Duration;
    use weft_blocks::{BlockStore, InMemoryBlockStore};
    use weft_exchange::{BlockStream, ExchangeClient, ExchangeError};

    fn local_dag() -> DagService {
        DagService::new(BlockService::local(Arc::new(InMemoryBlockStore::new())))
    }

    /// Serves fixed blocks, each after its own delay, honouring cancellation.
    struct DelayedClient {
        blocks: HashMap<ContentAddress, (Block, Duration)>,
    }

    #[async_trait::async_trait]
    impl ExchangeClient for DelayedClient {
        fn get_blocks(&self, keys: Vec<ContentAddress>, cancel: CancellationToken) -> BlockStream {
            let entries: Vec<_> = keys
                .iter()
                .filter_map(|k| self.blocks.get(k).cloned())
                .collect();
            stream::iter(entries)
                .then(move |(block, delay)| {
                    let cancel = cancel.clone();
                    async move {
                        tokio::select! {
                            _ = cancel.cancelled() => Err(ExchangeError::Cancelled),
                            _ = tokio::time::sleep(delay) => Ok(block),
                        }
                    }
                })
                .boxed()
        }
    }

    fn remote_dag(nodes: &[(&Node, Duration)]) -> DagService {
        let blocks = nodes
            .iter()
            .map(|(node, delay)| {
                let block = node.to_block(&ContentHasher::default()).unwrap();
                (block.key().clone(), (block, *delay))
            })
            .collect();
        DagService::new(BlockService::new(
            Arc::new(InMemoryBlockStore::new()),
            Some(Arc::new(DelayedClient { blocks })),
        ))
    }

    // ---------------------------------------------------------------
    // Add / get / remove
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn add_then_get() {
        let dag = local_dag();
        let node = Node::leaf(b"hello".to_vec());
        let key = dag.add(&node).unwrap();
        assert_eq!(key, node.address().unwrap());
        assert_eq!(dag.get(&key, CancellationToken::new()).await.unwrap(), node);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let dag = local_dag();
        let key = Node::leaf(b"nope".to_vec()).address().unwrap();
        assert!(matches!(
            dag.get(&key, CancellationToken::new()).await,
            Err(DagError::NotFound(k)) if k == key
        ));
    }

    #[tokio::test]
    async fn remove_does_not_cascade() {
        let dag = local_dag();
        let child = Node::leaf(b"child".to_vec());
        let child_key = dag.add(&child).unwrap();
        let parent = Node::new(b"p".to_vec(), vec![Link::to_node("c", &child).unwrap()]).unwrap();
        let parent_key = dag.add(&parent).unwrap();

        assert_eq!(dag.remove(&parent).unwrap(), parent_key);
        assert!(!dag.blocks().has(&parent_key).unwrap());
        assert!(dag.blocks().has(&child_key).unwrap());
        assert!(matches!(dag.remove(&parent), Err(DagError::NotFound(_))));
    }

    #[tokio::test]
    async fn remove_finds_nodes_under_another_algorithm() {
        let store = Arc::new(InMemoryBlockStore::new());
        let sha = DagService::with_hasher(BlockService::local(store.clone()), ContentHasher::SHA2_256);
        let blake = DagService::new(BlockService::local(store));

        let node = Node::leaf(b"written with sha2".to_vec());
        let key = sha.add(&node).unwrap();
        assert_eq!(blake.remove(&node).unwrap(), key);
        assert!(!blake.blocks().has(&key).unwrap());
        assert!(matches!(blake.remove(&node), Err(DagError::NotFound(k)) if k == node.address().unwrap()));
    }

    #[tokio::test]
    async fn hasher_choice_sets_algorithm() {
        let dag = DagService::with_hasher(
            BlockService::local(Arc::new(InMemoryBlockStore::new())),
            ContentHasher::SHA2_256,
        );
        let node = Node::leaf(b"sha".to_vec());
        let key = dag.add(&node).unwrap();
        assert_eq!(key.algorithm(), weft_types::HashAlgorithm::Sha2_256);
        assert_eq!(dag.get(&key, CancellationToken::new()).await.unwrap(), node);
    }

    // ---------------------------------------------------------------
    // Recursive add
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn add_recursive_stores_whole_tree() {
        let dag = local_dag();
        let leaf_a = Node::leaf(b"a".to_vec());
        let leaf_b = Node::leaf(b"b".to_vec());
        let mid = Node::new(Vec::new(), vec![Link::to_node("a", &leaf_a).unwrap()]).unwrap();
        let root = Node::new(
            b"root".to_vec(),
            vec![
                Link::to_node("mid", &mid).unwrap(),
                Link::to_node("b", &leaf_b).unwrap(),
                // Shared subtree reached twice.
                Link::to_node("a-again", &leaf_a).unwrap(),
            ],
        )
        .unwrap();
        let pending: HashMap<_, _> = [&leaf_a, &leaf_b, &mid]
            .into_iter()
            .map(|n| (n.address().unwrap(), n.clone()))
            .collect();

        let root_key = dag.add_recursive(&root, &pending).unwrap();
        assert_eq!(dag.blocks().store().all_keys().unwrap().len(), 4);
        for node in [&leaf_a, &leaf_b, &mid] {
            assert!(dag.blocks().has(&node.address().unwrap()).unwrap());
        }
        assert_eq!(dag.get(&root_key, CancellationToken::new()).await.unwrap(), root);
    }

    #[test]
    fn add_recursive_skips_present_targets() {
        let dag = local_dag();
        let stored = Node::leaf(b"stored".to_vec());
        dag.add(&stored).unwrap();
        let root = Node::new(Vec::new(), vec![Link::to_node("s", &stored).unwrap()]).unwrap();
        // Nothing pending: the target is already local.
        dag.add_recursive(&root, &HashMap::new()).unwrap();
    }

    #[test]
    fn add_recursive_fails_on_missing_target() {
        let dag = local_dag();
        let ghost = Node::leaf(b"ghost".to_vec());
        let root = Node::new(Vec::new(), vec![Link::to_node("g", &ghost).unwrap()]).unwrap();
        assert!(matches!(
            dag.add_recursive(&root, &HashMap::new()),
            Err(DagError::NotFound(_))
        ));
        assert!(!dag.blocks().has(&root.address().unwrap()).unwrap());
    }

    #[test]
    fn add_recursive_rejects_mislabelled_pending_node() {
        let dag = local_dag();
        let real = Node::leaf(b"real".to_vec());
        let root = Node::new(Vec::new(), vec![Link::to_node("r", &real).unwrap()]).unwrap();
        let pending = HashMap::from([(real.address().unwrap(), Node::leaf(b"other".to_vec()))]);
        assert!(matches!(
            dag.add_recursive(&root, &pending),
            Err(DagError::Block(weft_blocks::BlockError::AddressMismatch { .. }))
        ));
    }

    // ---------------------------------------------------------------
    // Traversal
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn get_dag_is_lazy_and_ordered() {
        let dag = local_dag();
        let children: Vec<Node> = (0..3u8).map(|i| Node::leaf(vec![i])).collect();
        let links = children
            .iter()
            .enumerate()
            .map(|(i, c)| Link::to_node(format!("c{i}"), c).unwrap())
            .collect();
        let root = Node::new(Vec::new(), links).unwrap();

        let mut getters = dag.get_dag(&root, CancellationToken::new());
        assert_eq!(getters.len(), 3);
        assert!(getters.iter().all(|g| !g.is_resolved()));

        // Not stored yet: resolution fails, then succeeds once stored.
        assert!(getters[0].resolve().await.is_err());
        for child in &children {
            dag.add(child).unwrap();
        }
        for (getter, child) in getters.iter_mut().zip(&children) {
            assert_eq!(getter.resolve().await.unwrap(), child);
            assert_eq!(getter.get(), Some(child));
        }
    }

    #[tokio::test]
    async fn get_nodes_keeps_input_order() {
        let a = Node::leaf(b"a".to_vec());
        let b = Node::leaf(b"b".to_vec());
        let c = Node::leaf(b"c".to_vec());
        // b arrives first, a last.
        let dag = remote_dag(&[
            (&a, Duration::from_millis(150)),
            (&b, Duration::ZERO),
            (&c, Duration::from_millis(50)),
        ]);
        let keys: Vec<_> = [&a, &b, &c].iter().map(|n| n.address().unwrap()).collect();
        let getters = dag.get_nodes(&keys, CancellationToken::new());
        assert_eq!(getters.len(), 3);

        let mut resolved = Vec::new();
        for (getter, key) in getters.into_iter().zip(&keys) {
            assert_eq!(getter.key(), key);
            resolved.push(getter.into_node().await.unwrap());
        }
        assert_eq!(resolved, vec![a, b, c]);
    }

    #[tokio::test]
    async fn fetched_nodes_are_committed_locally() {
        let remote = Node::leaf(b"far".to_vec());
        let dag = remote_dag(&[(&remote, Duration::ZERO)]);
        let key = remote.address().unwrap();
        assert!(!dag.blocks().has(&key).unwrap());
        dag.get(&key, CancellationToken::new()).await.unwrap();
        assert!(dag.blocks().has(&key).unwrap());
    }

    #[tokio::test]
    async fn cancellation_fails_promptly() {
        let slow = Node::leaf(b"slow".to_vec());
        let dag = remote_dag(&[(&slow, Duration::from_secs(30))]);
        let key = slow.address().unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let result = tokio::time::timeout(Duration::from_secs(5), dag.get(&key, cancel))
            .await
            .unwrap();
        assert!(matches!(result, Err(DagError::Cancelled)));
        assert!(!dag.blocks().has(&key).unwrap());

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        assert!(matches!(dag.get(&key, cancelled).await, Err(DagError::Cancelled)));
    }

    // ---------------------------------------------------------------
    // Paths
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn resolve_path_walks_links() {
        let dag = local_dag();
        let file = Node::leaf(b"contents".to_vec());
        let dir = Node::new(Vec::new(), vec![Link::to_node("file.txt", &file).unwrap()]).unwrap();
        let root = Node::new(Vec::new(), vec![Link::to_node("docs", &dir).unwrap()]).unwrap();
        for node in [&file, &dir, &root] {
            dag.add(node).unwrap();
        }
        let root_key = root.address().unwrap();

        let path = Path::from_address(root_key.clone()).join("docs").join("file.txt");
        let cancel = CancellationToken::new();
        assert_eq!(dag.resolve_path(&path, cancel.clone()).await.unwrap(), file);
        assert_eq!(
            dag.resolve_address(&path, cancel.clone()).await.unwrap(),
            file.address().unwrap()
        );

        let bare: Path = format!("{}/docs", root_key.to_hex()).parse().unwrap();
        assert_eq!(dag.resolve_path(&bare, cancel.clone()).await.unwrap(), dir);

        let missing = Path::from_address(root_key.clone()).join("nope");
        assert!(matches!(
            dag.resolve_path(&missing, cancel).await,
            Err(DagError::LinkNotFound { name, .. }) if name == "nope"
        ));
    }

    #[tokio::test]
    async fn ipns_paths_are_unsupported() {
        let dag = local_dag();
        let path: Path = "/ipns/example/a".parse().unwrap();
        assert!(matches!(
            dag.resolve_path(&path, CancellationToken::new()).await,
            Err(DagError::UnsupportedNamespace(n)) if n == "example"
        ));
    }
}
