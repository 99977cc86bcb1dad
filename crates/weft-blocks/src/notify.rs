use std::sync::{Arc, RwLock, Weak};

use weft_types::ContentAddress;

use crate::block::Block;

/// Listener for block store events.
///
/// All methods default to no-ops so listeners implement only what they need.
/// Callbacks run on the writer's thread after the store has released its
/// locks; they may call back into the store.
pub trait BlockNotifiee: Send + Sync {
    /// A block was put, whether or not it was already stored.
    fn block_put(&self, _block: &Block) {}

    /// A block was put that was not previously stored.
    fn new_block_put(&self, _block: &Block) {}

    /// A block was deleted.
    fn block_deleted(&self, _key: &ContentAddress) {}
}

/// Registry of [`BlockNotifiee`]s held by weak reference.
///
/// Listeners that own the store (an exchange peer, for example) can register
/// without creating a reference cycle. Dropped listeners are pruned during
/// the next fan-out.
#[derive(Default)]
pub struct Notifier {
    listeners: RwLock<Vec<Weak<dyn BlockNotifiee>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn add<N: BlockNotifiee + 'static>(&self, notifiee: &Arc<N>) {
        let weak = Arc::downgrade(notifiee);
        let weak: Weak<dyn BlockNotifiee> = weak;
        self.listeners.write().expect("lock poisoned").push(weak);
    }

    /// Unregister a listener. Returns `true` if it was registered.
    pub fn remove<N: BlockNotifiee + 'static>(&self, notifiee: &Arc<N>) -> bool {
        let target = Arc::as_ptr(notifiee) as *const ();
        let mut listeners = self.listeners.write().expect("lock poisoned");
        let before = listeners.len();
        listeners.retain(|w| w.as_ptr() as *const () != target);
        listeners.len() != before
    }

    /// Number of live listeners.
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .expect("lock poisoned")
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live(&self) -> Vec<Arc<dyn BlockNotifiee>> {
        let (live, dead) = {
            let listeners = self.listeners.read().expect("lock poisoned");
            let live: Vec<_> = listeners.iter().filter_map(Weak::upgrade).collect();
            let dead = live.len() != listeners.len();
            (live, dead)
        };
        if dead {
            self.listeners
                .write()
                .expect("lock poisoned")
                .retain(|w| w.strong_count() > 0);
        }
        live
    }

    /// Fan out a put. `is_new` adds the `new_block_put` event.
    pub fn notify_put(&self, block: &Block, is_new: bool) {
        for listener in self.live() {
            listener.block_put(block);
            if is_new {
                listener.new_block_put(block);
            }
        }
    }

    pub fn notify_deleted(&self, key: &ContentAddress) {
        for listener in self.live() {
            listener.block_deleted(key);
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.len())
            .finish()
    }
}
