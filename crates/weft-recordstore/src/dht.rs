//! Distributed hash table backing.
//!
//! [`Dht`] is the interface a record store needs from a DHT: append a value
//! under a key, and stream the values other nodes hold for it. [`MemoryDht`]
//! simulates one in-process: values are placed on the `replication` nodes
//! closest to the key by XOR distance, and lookups walk the nodes from the
//! closest outwards, one hop at a time.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use weft_crypto::ContentHasher;
use weft_record::{unmarshal, Record, RecordResult, Validator};
use weft_types::HashAlgorithm;

use crate::config::DhtConfig;
use crate::key::RecordKey;
use crate::store::{RecordStore, RecordStream};

/// Values stored in a DHT under a key, as lookups discover them.
pub type ValueStream = BoxStream<'static, RecordResult<Vec<u8>>>;

/// Key-value operations of a distributed hash table.
#[async_trait]
pub trait Dht: Send + Sync {
    /// Store `value` under `key` alongside any values already there.
    async fn put_value(&self, key: &[u8], value: Vec<u8>) -> RecordResult<()>;

    /// Values under `key`. Each distinct value is yielded once.
    fn get_values(&self, key: &[u8], cancel: CancellationToken) -> ValueStream;
}

#[async_trait]
impl<H: Dht + ?Sized> Dht for Arc<H> {
    async fn put_value(&self, key: &[u8], value: Vec<u8>) -> RecordResult<()> {
        (**self).put_value(key, value).await
    }

    fn get_values(&self, key: &[u8], cancel: CancellationToken) -> ValueStream {
        (**self).get_values(key, cancel)
    }
}

type Distance = [u8; 32];

fn xor_distance(a: &[u8; 32], b: &[u8; 32]) -> Distance {
    let mut d = [0u8; 32];
    for (i, byte) in d.iter_mut().enumerate() {
        *byte = a[i] ^ b[i];
    }
    d
}

struct DhtNode {
    id: [u8; 32],
    values: RwLock<HashMap<Vec<u8>, Vec<Vec<u8>>>>,
}

struct DhtInner {
    config: DhtConfig,
    nodes: Vec<DhtNode>,
}

/// In-process DHT of simulated nodes. Clones share the same nodes.
#[derive(Clone)]
pub struct MemoryDht {
    inner: Arc<DhtInner>,
}

impl MemoryDht {
    /// A DHT of `node_count` nodes with deterministic ids.
    pub fn new(node_count: usize, config: DhtConfig) -> Self {
        let nodes = (0..node_count)
            .map(|i| DhtNode {
                id: ContentHasher::raw_hash(HashAlgorithm::Blake3, format!("dht-node-{i}").as_bytes()),
                values: RwLock::new(HashMap::new()),
            })
            .collect();
        Self {
            inner: Arc::new(DhtInner { config, nodes }),
        }
    }

    pub fn config(&self) -> &DhtConfig {
        &self.inner.config
    }

    pub fn node_count(&self) -> usize {
        self.inner.nodes.len()
    }

    /// Node indices ordered by XOR distance to `key`, closest first.
    fn closest(&self, key: &[u8]) -> Vec<usize> {
        let target = ContentHasher::raw_hash(HashAlgorithm::Blake3, key);
        let mut order: Vec<usize> = (0..self.inner.nodes.len()).collect();
        order.sort_by_key(|&i| xor_distance(&self.inner.nodes[i].id, &target));
        order
    }

    /// Number of nodes holding at least one value under `key`.
    pub fn replicas(&self, key: &[u8]) -> usize {
        self.inner
            .nodes
            .iter()
            .filter(|n| n.values.read().expect("lock poisoned").contains_key(key))
            .count()
    }
}

impl std::fmt::Debug for MemoryDht {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDht")
            .field("nodes", &self.node_count())
            .field("config", &self.inner.config)
            .finish()
    }
}

#[async_trait]
impl Dht for MemoryDht {
    async fn put_value(&self, key: &[u8], value: Vec<u8>) -> RecordResult<()> {
        let targets = self.closest(key);
        let replication = self.inner.config.replication.max(1);
        for &i in targets.iter().take(replication) {
            let mut values = self.inner.nodes[i].values.write().expect("lock poisoned");
            let entry = values.entry(key.to_vec()).or_default();
            if !entry.contains(&value) {
                entry.push(value.clone());
            }
        }
        trace!(replicas = replication.min(targets.len()), "dht put");
        Ok(())
    }

    fn get_values(&self, key: &[u8], cancel: CancellationToken) -> ValueStream {
        let route = self.closest(key);
        let dht = self.clone();
        let key = key.to_vec();
        let hop_delay = self.inner.config.hop_delay;

        // One hop per node; each hop yields the values not seen before.
        let hops = stream::unfold(
            (route.into_iter().enumerate(), HashSet::<Vec<u8>>::new()),
            move |(mut route, mut seen)| {
                let dht = dht.clone();
                let key = key.clone();
                async move {
                    let (hop, index) = route.next()?;
                    if hop > 0 && !hop_delay.is_zero() {
                        tokio::time::sleep(hop_delay).await;
                    }
                    let fresh: Vec<Vec<u8>> = dht.inner.nodes[index]
                        .values
                        .read()
                        .expect("lock poisoned")
                        .get(&key)
                        .map(|vals| vals.iter().filter(|v| seen.insert((*v).clone())).cloned().collect())
                        .unwrap_or_default();
                    Some((fresh, (route, seen)))
                }
            },
        );
        hops.flat_map(|fresh| stream::iter(fresh.into_iter().map(Ok)))
            .take_until(cancel.cancelled_owned())
            .boxed()
    }
}

/// Record store over a [`Dht`].
///
/// Records are appended under the key's bytes. Invalid records are rejected on
/// put; on get, values that fail to decode or validate are skipped.
pub struct DhtRecordStore<H> {
    dht: H,
    validator: Arc<dyn Validator>,
}

impl<H: Dht> DhtRecordStore<H> {
    pub fn new(dht: H, validator: Arc<dyn Validator>) -> Self {
        Self { dht, validator }
    }

    pub fn dht(&self) -> &H {
        &self.dht
    }
}

#[async_trait]
impl<H: Dht> RecordStore for DhtRecordStore<H> {
    async fn put(&self, key: &RecordKey, record: Record) -> RecordResult<()> {
        weft_record::check(self.validator.as_ref(), &record)?;
        self.dht.put_value(key.as_bytes(), record.marshal()?).await
    }

    fn get(&self, key: &RecordKey, cancel: CancellationToken) -> RecordStream {
        let validator = Arc::clone(&self.validator);
        let key_name = key.to_string();
        self.dht
            .get_values(key.as_bytes(), cancel)
            .filter_map(move |value| {
                let item = match value.and_then(|bytes| unmarshal(&bytes)) {
                    Ok(record) => match validator.valid(&record) {
                        Ok(()) => Some(Ok(record)),
                        Err(e) => {
                            debug!(key = %key_name, error = %e, "skipping invalid dht record");
                            None
                        }
                    },
                    Err(e) => {
                        debug!(key = %key_name, error = %e, "skipping undecodable dht value");
                        None
                    }
                };
                futures::future::ready(item)
            })
            .boxed()
    }
}

impl<H> std::fmt::Debug for DhtRecordStore<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhtRecordStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use weft_record::{AcceptAll, RecordError};

    fn fast_config(replication: usize) -> DhtConfig {
        DhtConfig {
            replication,
            hop_delay: Duration::ZERO,
        }
    }

    #[test]
    fn xor_distance_is_symmetric_and_zero_on_self() {
        let a = [0xAAu8; 32];
        let b = [0x55u8; 32];
        assert_eq!(xor_distance(&a, &b), xor_distance(&b, &a));
        assert_eq!(xor_distance(&a, &a), [0u8; 32]);
        assert_eq!(xor_distance(&a, &b), [0xFFu8; 32]);
    }

    #[tokio::test]
    async fn values_are_replicated_to_closest_nodes() {
        let dht = MemoryDht::new(10, fast_config(3));
        dht.put_value(b"key", b"v1".to_vec()).await.unwrap();
        assert_eq!(dht.replicas(b"key"), 3);

        let closest = dht.closest(b"key");
        for &i in &closest[..3] {
            assert!(dht.inner.nodes[i].values.read().unwrap().contains_key(b"key".as_slice()));
        }
    }

    #[tokio::test]
    async fn replication_is_capped_by_node_count() {
        let dht = MemoryDht::new(2, fast_config(5));
        dht.put_value(b"k", b"v".to_vec()).await.unwrap();
        assert_eq!(dht.replicas(b"k"), 2);
    }

    #[tokio::test]
    async fn get_values_deduplicates_across_nodes() {
        let dht = MemoryDht::new(8, fast_config(4));
        dht.put_value(b"k", b"a".to_vec()).await.unwrap();
        dht.put_value(b"k", b"b".to_vec()).await.unwrap();
        dht.put_value(b"k", b"a".to_vec()).await.unwrap();
        let mut values: Vec<_> = dht
            .get_values(b"k", CancellationToken::new())
            .map(|v| v.unwrap())
            .collect()
            .await;
        values.sort();
        assert_eq!(values, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[tokio::test]
    async fn get_values_stops_on_cancel() {
        let dht = MemoryDht::new(
            50,
            DhtConfig {
                replication: 1,
                hop_delay: Duration::from_millis(50),
            },
        );
        dht.put_value(b"k", b"v".to_vec()).await.unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            trigger.cancel();
        });
        // Walking all 50 hops would take seconds.
        let values = tokio::time::timeout(
            Duration::from_secs(2),
            dht.get_values(b"k", cancel).collect::<Vec<_>>(),
        )
        .await
        .unwrap();
        assert_eq!(values.len(), 1);
    }

    #[tokio::test]
    async fn record_store_roundtrip_and_filtering() {
        struct Versioned;
        impl Validator for Versioned {
            fn valid(&self, record: &Record) -> RecordResult<()> {
                if record.version() > 0 {
                    Ok(())
                } else {
                    Err(RecordError::Rejected("version 0".into()))
                }
            }
        }

        let dht = MemoryDht::new(6, fast_config(2));
        let store = DhtRecordStore::new(dht.clone(), Arc::new(Versioned));
        let key = RecordKey::new("/names/x");

        store.put(&key, Record::new(1, b"one".to_vec(), Vec::new())).await.unwrap();
        assert!(matches!(
            store.put(&key, Record::new(0, b"zero".to_vec(), Vec::new())).await,
            Err(RecordError::Rejected(_))
        ));
        // Written behind the store's back: skipped on read.
        dht.put_value(key.as_bytes(), Record::new(0, b"zero".to_vec(), Vec::new()).marshal().unwrap())
            .await
            .unwrap();
        dht.put_value(key.as_bytes(), b"garbage".to_vec()).await.unwrap();

        let got: Vec<Record> = store
            .get(&key, CancellationToken::new())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(got, vec![Record::new(1, b"one".to_vec(), Vec::new())]);

        let open = DhtRecordStore::new(dht, Arc::new(AcceptAll));
        assert_eq!(open.get(&key, CancellationToken::new()).count().await, 2);
    }
}
