use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future;
use futures::stream::{BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;
use weft_crypto::Host;
use weft_exchange::{ContentRouting, ExchangeError, ExchangeResult};
use weft_recordstore::RecordStore;
use weft_types::{ContentAddress, PeerId};

use crate::provide::{find_providers_with, provide};
use crate::record::{ProviderValidator, DEFAULT_PROVIDER_TTL};

/// Content routing through provider records in a record store.
///
/// `provide` announces the host; `find_providers` yields every other peer
/// with a valid, unexpired announcement.
#[derive(Clone)]
pub struct RecordRouting {
    store: Arc<dyn RecordStore>,
    host: Arc<dyn Host>,
    ttl: Duration,
}

impl RecordRouting {
    pub fn new(store: Arc<dyn RecordStore>, host: Arc<dyn Host>) -> Self {
        Self::with_ttl(store, host, DEFAULT_PROVIDER_TTL)
    }

    pub fn with_ttl(store: Arc<dyn RecordStore>, host: Arc<dyn Host>, ttl: Duration) -> Self {
        Self { store, host, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[async_trait]
impl ContentRouting for RecordRouting {
    async fn provide(&self, key: &ContentAddress) -> ExchangeResult<()> {
        provide(self.store.as_ref(), key, self.host.as_ref())
            .await
            .map(|_| ())
            .map_err(|e| ExchangeError::Routing(e.to_string()))
    }

    fn find_providers(&self, key: &ContentAddress, cancel: CancellationToken) -> BoxStream<'static, PeerId> {
        let local = self.host.id();
        let validator = Arc::new(ProviderValidator::new(key.clone(), self.ttl));
        find_providers_with(self.store.as_ref(), validator, cancel)
            .filter(move |peer| future::ready(*peer != local))
            .boxed()
    }
}

impl std::fmt::Debug for RecordRouting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordRouting")
            .field("host", &self.host.id())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_blocks::{Block, BlockStore, InMemoryBlockStore, InMemoryDatastore};
    use weft_crypto::LocalHost;
    use weft_exchange::{ExchangeClient, ExchangeConfig, MemoryNetwork, Peer};
    use weft_record::AcceptAll;
    use weft_recordstore::DatastoreRecordStore;

    fn shared_store() -> Arc<dyn RecordStore> {
        Arc::new(DatastoreRecordStore::new(InMemoryDatastore::new(), Arc::new(AcceptAll)))
    }

    fn fast_config() -> ExchangeConfig {
        ExchangeConfig {
            timeout: Duration::from_secs(2),
            rebroadcast_interval: Duration::from_millis(50),
            max_rebroadcasts: 3,
            max_providers: 4,
        }
    }

    #[tokio::test]
    async fn own_announcements_are_not_returned() {
        let store = shared_store();
        let me: Arc<dyn Host> = Arc::new(LocalHost::generate());
        let other = LocalHost::generate();
        let key = Block::new(b"k".to_vec()).key().clone();

        let mine = RecordRouting::new(store.clone(), me);
        mine.provide(&key).await.unwrap();
        provide(store.as_ref(), &key, &other).await.unwrap();

        let found: Vec<PeerId> = mine.find_providers(&key, CancellationToken::new()).collect().await;
        assert_eq!(found, vec![other.id()]);
    }

    #[tokio::test]
    async fn exchange_finds_blocks_through_provider_records() {
        let net = MemoryNetwork::new();
        let records = shared_store();

        // Unlisted peers can only be reached through provider records.
        let host_a = Arc::new(LocalHost::generate());
        let store_a = Arc::new(InMemoryBlockStore::new());
        let (ta, ia) = net.join_unlisted(host_a.id());
        let routing_a = Arc::new(RecordRouting::new(records.clone(), host_a.clone()));
        let _a = Peer::builder(store_a.clone())
            .config(fast_config())
            .routing(routing_a.clone())
            .start(ta, ia);

        let host_b = Arc::new(LocalHost::generate());
        let (tb, ib) = net.join_unlisted(host_b.id());
        let b = Peer::builder(Arc::new(InMemoryBlockStore::new()))
            .config(fast_config())
            .routing(Arc::new(RecordRouting::new(records.clone(), host_b.clone())))
            .start(tb, ib);

        let block = Block::new(b"found via records".to_vec());
        store_a.put(block.clone()).unwrap();
        routing_a.provide(block.key()).await.unwrap();

        let got = b.get_block(block.key(), CancellationToken::new()).await.unwrap();
        assert_eq!(got, block);
    }
}
