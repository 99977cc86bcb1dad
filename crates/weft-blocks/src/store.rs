use std::sync::{Arc, Mutex};

use tracing::{debug, trace, warn};
use weft_types::ContentAddress;

use crate::block::Block;
use crate::datastore::{Datastore, DsKey, InMemoryDatastore};
use crate::error::{BlockError, BlockResult};
use crate::notify::Notifier;

/// Content-addressed block store.
///
/// All implementations must satisfy these invariants:
/// - `put` re-hashes the data and rejects a block whose key does not match,
///   before anything is written.
/// - Blocks are immutable once stored. A second `put` of the same key stores
///   nothing new and fires only the weaker `block_put` event.
/// - Concurrent `put`s of one key produce exactly one stored copy and exactly
///   one `new_block_put` event.
/// - Storage errors are always surfaced, never retried silently.
pub trait BlockStore: Send + Sync {
    /// Verify and store a block. Returns `true` if the block was not stored before.
    fn put(&self, block: Block) -> BlockResult<bool>;

    /// Check whether a block is stored.
    fn has(&self, key: &ContentAddress) -> BlockResult<bool>;

    /// Read a block. Fails with [`BlockError::NotFound`] if absent.
    fn get(&self, key: &ContentAddress) -> BlockResult<Block>;

    /// Delete a block. Fails with [`BlockError::NotFound`] if absent.
    fn delete(&self, key: &ContentAddress) -> BlockResult<()>;

    /// Snapshot of the keys currently stored.
    fn all_keys(&self) -> BlockResult<AllKeys>;

    /// Event registry for this store.
    fn notifier(&self) -> &Notifier;

    /// Store several blocks.
    ///
    /// Default implementation calls `put()` for each block and stops at the
    /// first error.
    fn put_many(&self, blocks: Vec<Block>) -> BlockResult<Vec<bool>> {
        blocks.into_iter().map(|b| self.put(b)).collect()
    }
}

impl<S: BlockStore + ?Sized> BlockStore for Arc<S> {
    fn put(&self, block: Block) -> BlockResult<bool> {
        (**self).put(block)
    }

    fn has(&self, key: &ContentAddress) -> BlockResult<bool> {
        (**self).has(key)
    }

    fn get(&self, key: &ContentAddress) -> BlockResult<Block> {
        (**self).get(key)
    }

    fn delete(&self, key: &ContentAddress) -> BlockResult<()> {
        (**self).delete(key)
    }

    fn all_keys(&self) -> BlockResult<AllKeys> {
        (**self).all_keys()
    }

    fn notifier(&self) -> &Notifier {
        (**self).notifier()
    }
}

/// Restartable snapshot of stored keys.
///
/// Taken when [`BlockStore::all_keys`] is called; keys added afterwards do
/// not appear. Cloning is cheap and yields an independent cursor, and
/// [`AllKeys::restart`] rewinds this one.
#[derive(Clone, Debug)]
pub struct AllKeys {
    keys: Arc<[ContentAddress]>,
    pos: usize,
}

impl AllKeys {
    pub fn new(keys: Vec<ContentAddress>) -> Self {
        Self {
            keys: keys.into(),
            pos: 0,
        }
    }

    /// Rewind to the first key.
    pub fn restart(&mut self) {
        self.pos = 0;
    }

    /// Total number of keys in the snapshot.
    pub fn total(&self) -> usize {
        self.keys.len()
    }
}

impl Iterator for AllKeys {
    type Item = ContentAddress;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.keys.get(self.pos)?.clone();
        self.pos += 1;
        Some(key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.keys.len() - self.pos;
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for AllKeys {}

/// Block store over any [`Datastore`].
///
/// Blocks live under `/blocks/<hex address>`. Puts and deletes are serialized
/// by a write lock so the new-versus-existing decision is atomic; reads go
/// straight to the datastore.
pub struct DatastoreBlockStore<D> {
    datastore: D,
    prefix: DsKey,
    write_lock: Mutex<()>,
    notifier: Notifier,
}

/// Block store held entirely in memory.
pub type InMemoryBlockStore = DatastoreBlockStore<InMemoryDatastore>;

impl InMemoryBlockStore {
    pub fn new() -> Self {
        Self::with_datastore(InMemoryDatastore::new())
    }
}

impl Default for InMemoryBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Datastore> DatastoreBlockStore<D> {
    pub fn with_datastore(datastore: D) -> Self {
        Self {
            datastore,
            prefix: DsKey::namespace("blocks"),
            write_lock: Mutex::new(()),
            notifier: Notifier::new(),
        }
    }

    pub fn datastore(&self) -> &D {
        &self.datastore
    }

    fn ds_key(&self, key: &ContentAddress) -> BlockResult<DsKey> {
        self.prefix.child(&key.to_hex())
    }

    /// Number of blocks currently stored.
    pub fn len(&self) -> BlockResult<usize> {
        Ok(self.datastore.keys(&self.prefix)?.len())
    }

    pub fn is_empty(&self) -> BlockResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Total bytes across all stored blocks.
    pub fn total_bytes(&self) -> BlockResult<u64> {
        let mut total = 0;
        for key in self.datastore.keys(&self.prefix)? {
            total += self.datastore.size(&key)?.unwrap_or(0);
        }
        Ok(total)
    }
}

impl<D: Datastore> BlockStore for DatastoreBlockStore<D> {
    fn put(&self, block: Block) -> BlockResult<bool> {
        let computed = block.computed_key();
        if &computed != block.key() {
            warn!(
                expected = %block.key().short_hex(),
                computed = %computed.short_hex(),
                "rejecting block with mismatched address"
            );
            return Err(BlockError::AddressMismatch {
                expected: block.key().clone(),
                computed,
            });
        }

        let ds_key = self.ds_key(block.key())?;
        let is_new = {
            let _guard = self.write_lock.lock().expect("lock poisoned");
            if self.datastore.has(&ds_key)? {
                false
            } else {
                self.datastore.put(&ds_key, block.data())?;
                true
            }
        };

        if is_new {
            debug!(key = %block.key().short_hex(), size = block.len(), "stored block");
        } else {
            trace!(key = %block.key().short_hex(), "block already stored");
        }
        self.notifier.notify_put(&block, is_new);
        Ok(is_new)
    }

    fn has(&self, key: &ContentAddress) -> BlockResult<bool> {
        self.datastore.has(&self.ds_key(key)?)
    }

    fn get(&self, key: &ContentAddress) -> BlockResult<Block> {
        let Some(data) = self.datastore.get(&self.ds_key(key)?)? else {
            return Err(BlockError::NotFound(key.clone()));
        };
        let block = Block::with_key(key.clone(), data);
        let computed = block.computed_key();
        if &computed != key {
            warn!(
                expected = %key.short_hex(),
                computed = %computed.short_hex(),
                "stored block failed verification"
            );
            return Err(BlockError::AddressMismatch {
                expected: key.clone(),
                computed,
            });
        }
        Ok(block)
    }

    fn delete(&self, key: &ContentAddress) -> BlockResult<()> {
        let ds_key = self.ds_key(key)?;
        let existed = {
            let _guard = self.write_lock.lock().expect("lock poisoned");
            self.datastore.delete(&ds_key)?
        };
        if !existed {
            return Err(BlockError::NotFound(key.clone()));
        }
        debug!(key = %key.short_hex(), "deleted block");
        self.notifier.notify_deleted(key);
        Ok(())
    }

    fn all_keys(&self) -> BlockResult<AllKeys> {
        let mut keys = Vec::new();
        for ds_key in self.datastore.keys(&self.prefix)? {
            match ContentAddress::from_hex(ds_key.name()) {
                Ok(addr) => keys.push(addr),
                Err(e) => warn!(key = %ds_key, error = %e, "skipping undecodable block key"),
            }
        }
        Ok(AllKeys::new(keys))
    }

    fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

impl<D> std::fmt::Debug for DatastoreBlockStore<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatastoreBlockStore")
            .field("prefix", &self.prefix)
            .field("notifier", &self.notifier)
            .finish()
    }
}
