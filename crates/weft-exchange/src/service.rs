use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use weft_blocks::{Block, BlockError, BlockStore};
use weft_types::ContentAddress;

use crate::error::{ExchangeError, ExchangeResult};
use crate::traits::{BlockStream, ExchangeClient};

/// Block store with an exchange fallback.
///
/// Reads are served locally when possible and fetched through the exchange
/// otherwise; fetched blocks are committed to the local store. Without an
/// exchange this is a plain local store and misses fail with `NotFound`.
#[derive(Clone)]
pub struct BlockService {
    store: Arc<dyn BlockStore>,
    exchange: Option<Arc<dyn ExchangeClient>>,
}

impl BlockService {
    pub fn new(store: Arc<dyn BlockStore>, exchange: Option<Arc<dyn ExchangeClient>>) -> Self {
        Self { store, exchange }
    }

    /// A service that never leaves the local store.
    pub fn local(store: Arc<dyn BlockStore>) -> Self {
        Self::new(store, None)
    }

    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.store
    }

    pub fn has_exchange(&self) -> bool {
        self.exchange.is_some()
    }

    /// Store a block locally. Returns `true` if it was new.
    pub fn put(&self, block: Block) -> ExchangeResult<bool> {
        Ok(self.store.put(block)?)
    }

    /// Whether a block is stored locally. Never touches the network.
    pub fn has(&self, key: &ContentAddress) -> ExchangeResult<bool> {
        Ok(self.store.has(key)?)
    }

    /// Fetch one block, locally first.
    pub async fn get(
        &self,
        key: &ContentAddress,
        cancel: CancellationToken,
    ) -> ExchangeResult<Block> {
        match self.store.get(key) {
            Ok(block) => return Ok(block),
            Err(BlockError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        let Some(exchange) = &self.exchange else {
            return Err(BlockError::NotFound(key.clone()).into());
        };
        debug!(key = %key.short_hex(), "block not local, fetching");
        let block = exchange.get_block(key, cancel).await?;
        commit(self.store.as_ref(), &block)?;
        Ok(block)
    }

    /// Fetch several blocks: local hits first, then exchange arrivals.
    ///
    /// Without an exchange, each miss yields a `NotFound` item.
    pub fn get_many(&self, keys: Vec<ContentAddress>, cancel: CancellationToken) -> BlockStream {
        let mut local = Vec::new();
        let mut missing = Vec::new();
        for key in keys {
            match self.store.get(&key) {
                Ok(block) => local.push(Ok(block)),
                Err(BlockError::NotFound(_)) => missing.push(key),
                Err(e) => local.push(Err(ExchangeError::from(e))),
            }
        }
        let local = stream::iter(local);
        if missing.is_empty() {
            return local.boxed();
        }

        match &self.exchange {
            Some(exchange) => {
                let store = Arc::clone(&self.store);
                let fetched = exchange
                    .get_blocks(missing, cancel)
                    .map(move |result: ExchangeResult<Block>| {
                        let block = result?;
                        commit(store.as_ref(), &block)?;
                        Ok::<_, ExchangeError>(block)
                    });
                local.chain(fetched).boxed()
            }
            None => {
                let misses = missing
                    .into_iter()
                    .map(|key| Err(BlockError::NotFound(key).into()));
                local.chain(stream::iter(misses)).boxed()
            }
        }
    }

    /// Delete a block from the local store.
    pub fn delete(&self, key: &ContentAddress) -> ExchangeResult<()> {
        Ok(self.store.delete(key)?)
    }
}

/// Store a fetched block. Exchange peers usually stored it already, making
/// this a no-op; other clients rely on it. A block the store rejects is
/// never handed to the caller.
fn commit(store: &dyn BlockStore, block: &Block) -> ExchangeResult<()> {
    if let Err(e) = store.put(block.clone()) {
        warn!(key = %block.key().short_hex(), error = %e, "failed to commit fetched block");
        return Err(e.into());
    }
    Ok(())
}

impl std::fmt::Debug for BlockService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockService")
            .field("has_exchange", &self.has_exchange())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExchangeConfig;
    use crate::network::MemoryNetwork;
    use crate::peer::Peer;
    use std::collections::HashSet;
    use std::time::Duration;
    use weft_blocks::InMemoryBlockStore;
    use weft_crypto::{Signer, SigningKey};

    /// Exchange client backed by a fixed set of blocks, without verification.
    struct FixedClient {
        blocks: Vec<Block>,
    }

    #[async_trait::async_trait]
    impl ExchangeClient for FixedClient {
        fn get_blocks(&self, keys: Vec<ContentAddress>, _cancel: CancellationToken) -> BlockStream {
            let found: Vec<_> = self
                .blocks
                .iter()
                .filter(|b| keys.contains(b.key()))
                .cloned()
                .map(Ok)
                .collect();
            stream::iter(found).boxed()
        }
    }

    fn local_store() -> Arc<dyn BlockStore> {
        Arc::new(InMemoryBlockStore::new())
    }

    #[tokio::test]
    async fn local_hit_needs_no_exchange() {
        let service = BlockService::local(local_store());
        let block = Block::new(b"here".to_vec());
        service.put(block.clone()).unwrap();
        assert_eq!(service.get(block.key(), CancellationToken::new()).await.unwrap(), block);
    }

    #[tokio::test]
    async fn miss_without_exchange_is_not_found() {
        let service = BlockService::local(local_store());
        let key = Block::new(b"absent".to_vec()).key().clone();
        let err = service.get(&key, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Block(BlockError::NotFound(_))));
    }

    #[tokio::test]
    async fn fetched_blocks_are_committed() {
        let remote = Block::new(b"remote".to_vec());
        let store = local_store();
        let service = BlockService::new(
            store.clone(),
            Some(Arc::new(FixedClient {
                blocks: vec![remote.clone()],
            })),
        );
        assert!(!store.has(remote.key()).unwrap());
        let got = service.get(remote.key(), CancellationToken::new()).await.unwrap();
        assert_eq!(got, remote);
        assert!(store.has(remote.key()).unwrap());
    }

    #[tokio::test]
    async fn forged_fetch_is_not_committed() {
        let real = Block::new(b"real".to_vec());
        let forged = Block::with_key(real.key().clone(), b"fake".to_vec());
        let store = local_store();
        let service = BlockService::new(
            store.clone(),
            Some(Arc::new(FixedClient {
                blocks: vec![forged],
            })),
        );
        let err = service.get(real.key(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Block(BlockError::AddressMismatch { .. })));
        assert!(!store.has(real.key()).unwrap());
    }

    #[tokio::test]
    async fn forged_fetch_is_an_error_item_in_get_many() {
        let real = Block::new(b"real".to_vec());
        let honest = Block::new(b"honest".to_vec());
        let forged = Block::with_key(real.key().clone(), b"fake".to_vec());
        let store = local_store();
        let service = BlockService::new(
            store.clone(),
            Some(Arc::new(FixedClient {
                blocks: vec![forged, honest.clone()],
            })),
        );
        let results: Vec<_> = service
            .get_many(
                vec![real.key().clone(), honest.key().clone()],
                CancellationToken::new(),
            )
            .collect()
            .await;
        assert_eq!(results.len(), 2);
        assert!(matches!(
            &results[0],
            Err(ExchangeError::Block(BlockError::AddressMismatch { expected, .. })) if expected == real.key()
        ));
        assert_eq!(results[1].as_ref().unwrap(), &honest);
        assert!(!store.has(real.key()).unwrap());
        assert!(store.has(honest.key()).unwrap());
    }

    #[tokio::test]
    async fn get_many_yields_local_then_fetched() {
        let local = Block::new(b"local".to_vec());
        let remote = Block::new(b"remote".to_vec());
        let store = local_store();
        store.put(local.clone()).unwrap();
        let service = BlockService::new(
            store,
            Some(Arc::new(FixedClient {
                blocks: vec![remote.clone()],
            })),
        );
        let got: Vec<Block> = service
            .get_many(
                vec![remote.key().clone(), local.key().clone()],
                CancellationToken::new(),
            )
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(got, vec![local, remote]);
    }

    #[tokio::test]
    async fn get_many_without_exchange_reports_misses() {
        let present = Block::new(b"p".to_vec());
        let absent = Block::new(b"a".to_vec());
        let service = BlockService::local(local_store());
        service.put(present.clone()).unwrap();
        let results: Vec<_> = service
            .get_many(
                vec![present.key().clone(), absent.key().clone()],
                CancellationToken::new(),
            )
            .collect()
            .await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(&results[1], Err(ExchangeError::Block(BlockError::NotFound(k))) if k == absent.key()));
    }

    #[tokio::test]
    async fn works_over_exchange_peers() {
        let net = MemoryNetwork::new();
        let config = ExchangeConfig {
            timeout: Duration::from_millis(500),
            ..Default::default()
        };

        let store_a = Arc::new(InMemoryBlockStore::new());
        let (ta, ia) = net.join(SigningKey::generate().public_key().peer_id());
        let _a = Peer::builder(store_a.clone()).config(config.clone()).start(ta, ia);

        let store_b: Arc<dyn BlockStore> = Arc::new(InMemoryBlockStore::new());
        let (tb, ib) = net.join(SigningKey::generate().public_key().peer_id());
        let b = Peer::builder(store_b.clone()).config(config).start(tb, ib);
        let service = BlockService::new(store_b.clone(), Some(Arc::new(b)));

        let blocks: Vec<Block> = (0..5u8).map(|i| Block::new(vec![i; 16])).collect();
        for block in &blocks {
            store_a.put(block.clone()).unwrap();
        }
        let keys: Vec<_> = blocks.iter().map(|b| b.key().clone()).collect();
        let got: HashSet<ContentAddress> = service
            .get_many(keys.clone(), CancellationToken::new())
            .map(|r| r.unwrap().key().clone())
            .collect()
            .await;
        assert_eq!(got, keys.into_iter().collect());
        assert_eq!(store_b.all_keys().unwrap().len(), 5);
    }
}
