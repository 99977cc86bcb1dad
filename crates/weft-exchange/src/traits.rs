use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use weft_blocks::{Block, BlockNotifiee, BlockStore};
use weft_types::{ContentAddress, PeerId};

use crate::error::{ExchangeError, ExchangeResult};

/// Blocks in arrival order. A terminal `Timeout` or `Cancelled` item ends the
/// stream; any blocks delivered before it are still valid.
pub type BlockStream = BoxStream<'static, ExchangeResult<Block>>;

/// Fetch capability: retrieve blocks that are not available locally.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Fetch several blocks. The stream is lazy, not restartable, and yields
    /// blocks in arrival order, which need not match `keys`.
    fn get_blocks(&self, keys: Vec<ContentAddress>, cancel: CancellationToken) -> BlockStream;

    /// Fetch one block, suspending until it arrives or the request fails.
    async fn get_block(
        &self,
        key: &ContentAddress,
        cancel: CancellationToken,
    ) -> ExchangeResult<Block> {
        let mut stream = self.get_blocks(vec![key.clone()], cancel);
        match stream.next().await {
            Some(result) => result,
            None => Err(ExchangeError::Unavailable(key.clone())),
        }
    }
}

/// Serve capability: answer peers from a local block store and react to
/// newly stored blocks.
pub trait ExchangeServer: BlockNotifiee {
    /// The store blocks are served from.
    fn block_store(&self) -> Arc<dyn BlockStore>;
}

/// A participant that both fetches and serves.
pub trait ExchangePeer: ExchangeClient + ExchangeServer {}

impl<T: ExchangeClient + ExchangeServer + ?Sized> ExchangePeer for T {}

/// Discovery of which peers hold a block.
#[async_trait]
pub trait ContentRouting: Send + Sync {
    /// Announce that the local peer holds `key`.
    async fn provide(&self, key: &ContentAddress) -> ExchangeResult<()>;

    /// Peers announcing `key`, as they are discovered. Possibly unbounded;
    /// ends when `cancel` fires.
    fn find_providers(
        &self,
        key: &ContentAddress,
        cancel: CancellationToken,
    ) -> BoxStream<'static, PeerId>;
}
