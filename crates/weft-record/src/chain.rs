use std::collections::{HashSet, VecDeque};

use tokio_util::sync::CancellationToken;
use tracing::debug;
use weft_dag::{DagService, Link, Node};
use weft_types::ContentAddress;

use crate::error::{RecordError, RecordResult};
use crate::record::Record;

const RECORD_LINK: &str = "record";
const PARENT_PREFIX: &str = "parent-";

/// One entry of a Merkle-linked record history.
///
/// Stored as a DAG node with a `record` link to the sub-record holding the
/// value and `parent-0`, `parent-1`, ... links to earlier chain entries. The
/// parents form a DAG; histories may fork and merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordChain {
    record: ContentAddress,
    parents: Vec<ContentAddress>,
}

impl RecordChain {
    pub fn new(record: ContentAddress, parents: Vec<ContentAddress>) -> Self {
        Self { record, parents }
    }

    /// Address of the sub-record node.
    pub fn record_address(&self) -> &ContentAddress {
        &self.record
    }

    /// Addresses of the parent chain entries, in link order.
    pub fn parents(&self) -> &[ContentAddress] {
        &self.parents
    }

    pub fn is_genesis(&self) -> bool {
        self.parents.is_empty()
    }

    /// The entry as a DAG node. Chain links carry no size.
    pub fn to_node(&self) -> RecordResult<Node> {
        let mut links = Vec::with_capacity(self.parents.len() + 1);
        links.push(Link::new(RECORD_LINK, 0, self.record.clone()));
        links.extend(
            self.parents
                .iter()
                .enumerate()
                .map(|(i, p)| Link::new(format!("{PARENT_PREFIX}{i}"), 0, p.clone())),
        );
        Ok(Node::new(Vec::new(), links)?)
    }

    pub fn from_node(node: &Node) -> RecordResult<Self> {
        let record = node
            .link(RECORD_LINK)
            .ok_or_else(|| RecordError::Serialization("chain node has no record link".into()))?
            .target
            .clone();
        let parents = node
            .links()
            .iter()
            .filter(|l| l.name.starts_with(PARENT_PREFIX))
            .map(|l| l.target.clone())
            .collect();
        Ok(Self { record, parents })
    }

    /// Store `record` and a chain entry pointing at it and at `parents`.
    pub fn store(
        dag: &DagService,
        record: &Record,
        parents: Vec<ContentAddress>,
    ) -> RecordResult<(ContentAddress, Self)> {
        let record_address = dag.add(&record.to_node()?)?;
        let chain = Self::new(record_address, parents);
        let key = dag.add(&chain.to_node()?)?;
        debug!(
            chain = %key.short_hex(),
            version = record.version(),
            parents = chain.parents.len(),
            "stored record chain entry"
        );
        Ok((key, chain))
    }

    pub async fn load(
        dag: &DagService,
        key: &ContentAddress,
        cancel: CancellationToken,
    ) -> RecordResult<Self> {
        Self::from_node(&dag.get(key, cancel).await?)
    }

    /// Fetch the sub-record.
    pub async fn record(&self, dag: &DagService, cancel: CancellationToken) -> RecordResult<Record> {
        Record::from_node(&dag.get(&self.record, cancel).await?)
    }

    /// Every entry reachable from `head`, breadth-first, each once, with its
    /// record. `head` comes first.
    pub async fn history(
        dag: &DagService,
        head: &ContentAddress,
        cancel: CancellationToken,
    ) -> RecordResult<Vec<(ContentAddress, Record)>> {
        let mut seen = HashSet::from([head.clone()]);
        let mut queue = VecDeque::from([head.clone()]);
        let mut entries = Vec::new();
        while let Some(key) = queue.pop_front() {
            if cancel.is_cancelled() {
                return Err(RecordError::Cancelled);
            }
            let chain = Self::load(dag, &key, cancel.clone()).await?;
            let record = chain.record(dag, cancel.clone()).await?;
            for parent in &chain.parents {
                if seen.insert(parent.clone()) {
                    queue.push_back(parent.clone());
                }
            }
            entries.push((key, record));
        }
        Ok(entries)
    }
}
