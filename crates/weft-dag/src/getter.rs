use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use weft_types::ContentAddress;

use crate::dag::DagService;
use crate::error::DagResult;
use crate::node::Node;

/// Handle that resolves to one node.
///
/// Lazy handles (from [`DagService::get_dag`]) fetch on first
/// [`resolve`](NodeGetter::resolve); eager handles (from
/// [`DagService::get_nodes`]) already have a fetch in flight. A resolved node
/// is cached; a failed resolution can be retried.
pub struct NodeGetter {
    key: ContentAddress,
    dag: DagService,
    cancel: CancellationToken,
    in_flight: Option<oneshot::Receiver<DagResult<Node>>>,
    node: Option<Node>,
}

impl NodeGetter {
    pub(crate) fn lazy(key: ContentAddress, dag: DagService, cancel: CancellationToken) -> Self {
        Self {
            key,
            dag,
            cancel,
            in_flight: None,
            node: None,
        }
    }

    pub(crate) fn eager(
        key: ContentAddress,
        dag: DagService,
        cancel: CancellationToken,
        in_flight: oneshot::Receiver<DagResult<Node>>,
    ) -> Self {
        Self {
            in_flight: Some(in_flight),
            ..Self::lazy(key, dag, cancel)
        }
    }

    /// Address this handle resolves.
    pub fn key(&self) -> &ContentAddress {
        &self.key
    }

    /// The node, if already resolved.
    pub fn get(&self) -> Option<&Node> {
        self.node.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.node.is_some()
    }

    /// Resolve the node, fetching it if needed.
    pub async fn resolve(&mut self) -> DagResult<&Node> {
        let node = self.take_or_fetch().await?;
        Ok(self.node.insert(node))
    }

    /// Resolve and take the node.
    pub async fn into_node(mut self) -> DagResult<Node> {
        self.take_or_fetch().await
    }

    async fn take_or_fetch(&mut self) -> DagResult<Node> {
        if let Some(node) = self.node.take() {
            return Ok(node);
        }
        if let Some(rx) = self.in_flight.take() {
            // An error here means the fetch task went away without answering.
            if let Ok(result) = rx.await {
                return result;
            }
        }
        self.dag.get(&self.key, self.cancel.clone()).await
    }
}

impl std::fmt::Debug for NodeGetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeGetter")
            .field("key", &self.key)
            .field("resolved", &self.is_resolved())
            .field("in_flight", &self.in_flight.is_some())
            .finish()
    }
}
