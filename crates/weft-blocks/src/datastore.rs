use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::error::{BlockError, BlockResult};

/// Hierarchical datastore key, e.g. `/blocks/1e20ab...`.
///
/// Segments are non-empty and limited to `[A-Za-z0-9_-]`, which keeps every
/// key safe to map onto file names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DsKey(String);

impl DsKey {
    /// Parse a key of the form `/a/b/c`.
    pub fn new(s: &str) -> BlockResult<Self> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| BlockError::InvalidKey(format!("key must start with '/': {s:?}")))?;
        if rest.is_empty() {
            return Ok(Self::root());
        }
        for seg in rest.split('/') {
            validate_segment(seg)?;
        }
        Ok(Self(s.to_string()))
    }

    /// The root key `/`, a prefix of every key.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// A top-level namespace key such as `/blocks`.
    ///
    /// `name` must be a valid segment; this is intended for constants.
    pub fn namespace(name: &'static str) -> Self {
        debug_assert!(validate_segment(name).is_ok(), "invalid namespace {name:?}");
        Self(format!("/{name}"))
    }

    /// This key with one more segment appended.
    pub fn child(&self, segment: &str) -> BlockResult<Self> {
        validate_segment(segment)?;
        if self.is_root() {
            Ok(Self(format!("/{segment}")))
        } else {
            Ok(Self(format!("{}/{segment}", self.0)))
        }
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Segments in order; empty for the root key.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Last segment; empty for the root key.
    pub fn name(&self) -> &str {
        self.segments().last().unwrap_or("")
    }

    /// Whether `prefix` is this key or one of its ancestors.
    pub fn has_prefix(&self, prefix: &DsKey) -> bool {
        if prefix.is_root() {
            return true;
        }
        self.0 == prefix.0
            || (self.0.starts_with(&prefix.0) && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_segment(seg: &str) -> BlockResult<()> {
    let ok = !seg.is_empty()
        && seg
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(BlockError::InvalidKey(format!("invalid segment {seg:?}")))
    }
}

/// Byte-oriented key-value store beneath block and record stores.
///
/// Implementations must be safe for concurrent use. Writes to one key replace
/// the previous value atomically: readers see the old value or the new one,
/// never a mix.
pub trait Datastore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &DsKey, value: &[u8]) -> BlockResult<()>;

    /// Read the value under `key`. Returns `Ok(None)` if absent.
    fn get(&self, key: &DsKey) -> BlockResult<Option<Vec<u8>>>;

    /// Check whether `key` is present.
    fn has(&self, key: &DsKey) -> BlockResult<bool>;

    /// Remove `key`. Returns `true` if it existed.
    fn delete(&self, key: &DsKey) -> BlockResult<bool>;

    /// All keys under `prefix`, in no guaranteed order.
    fn keys(&self, prefix: &DsKey) -> BlockResult<Vec<DsKey>>;

    /// Size in bytes of the value under `key`, if present.
    fn size(&self, key: &DsKey) -> BlockResult<Option<u64>> {
        Ok(self.get(key)?.map(|v| v.len() as u64))
    }
}

impl<D: Datastore + ?Sized> Datastore for Arc<D> {
    fn put(&self, key: &DsKey, value: &[u8]) -> BlockResult<()> {
        (**self).put(key, value)
    }

    fn get(&self, key: &DsKey) -> BlockResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn has(&self, key: &DsKey) -> BlockResult<bool> {
        (**self).has(key)
    }

    fn delete(&self, key: &DsKey) -> BlockResult<bool> {
        (**self).delete(key)
    }

    fn keys(&self, prefix: &DsKey) -> BlockResult<Vec<DsKey>> {
        (**self).keys(prefix)
    }

    fn size(&self, key: &DsKey) -> BlockResult<Option<u64>> {
        (**self).size(key)
    }
}

/// In-memory datastore for tests and embedding.
#[derive(Default)]
pub struct InMemoryDatastore {
    entries: RwLock<BTreeMap<DsKey, Vec<u8>>>,
}

impl InMemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }
}

impl Datastore for InMemoryDatastore {
    fn put(&self, key: &DsKey, value: &[u8]) -> BlockResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        map.insert(key.clone(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &DsKey) -> BlockResult<Option<Vec<u8>>> {
        Ok(self.entries.read().expect("lock poisoned").get(key).cloned())
    }

    fn has(&self, key: &DsKey) -> BlockResult<bool> {
        Ok(self.entries.read().expect("lock poisoned").contains_key(key))
    }

    fn delete(&self, key: &DsKey) -> BlockResult<bool> {
        Ok(self
            .entries
            .write()
            .expect("lock poisoned")
            .remove(key)
            .is_some())
    }

    fn keys(&self, prefix: &DsKey) -> BlockResult<Vec<DsKey>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.keys().filter(|k| k.has_prefix(prefix)).cloned().collect())
    }

    fn size(&self, key: &DsKey) -> BlockResult<Option<u64>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(key).map(|v| v.len() as u64))
    }
}

impl fmt::Debug for InMemoryDatastore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryDatastore")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> DsKey {
        DsKey::new(s).unwrap()
    }

    // -----------------------------------------------------------------------
    // Keys
    // -----------------------------------------------------------------------

    #[test]
    fn key_parsing() {
        assert_eq!(key("/blocks/abc").segments().collect::<Vec<_>>(), vec!["blocks", "abc"]);
        assert_eq!(key("/blocks/abc").name(), "abc");
        assert!(key("/").is_root());
        assert!(DsKey::new("blocks").is_err());
        assert!(DsKey::new("/blocks//abc").is_err());
        assert!(DsKey::new("/blocks/a.b").is_err());
        assert!(DsKey::new("/blocks/").is_err());
    }

    #[test]
    fn namespace_key() {
        assert_eq!(DsKey::namespace("blocks"), key("/blocks"));
    }

    #[test]
    fn key_child() {
        assert_eq!(DsKey::root().child("a").unwrap(), key("/a"));
        assert_eq!(key("/a").child("b_c-1").unwrap(), key("/a/b_c-1"));
        assert!(key("/a").child("x/y").is_err());
    }

    #[test]
    fn key_prefix_is_segment_aware() {
        assert!(key("/blocks/abc").has_prefix(&key("/blocks")));
        assert!(key("/blocks").has_prefix(&key("/blocks")));
        assert!(key("/blocks/abc").has_prefix(&DsKey::root()));
        assert!(!key("/blocksx/abc").has_prefix(&key("/blocks")));
        assert!(!key("/records/abc").has_prefix(&key("/blocks")));
    }

    // -----------------------------------------------------------------------
    // In-memory datastore
    // -----------------------------------------------------------------------

    #[test]
    fn put_get_delete() {
        let ds = InMemoryDatastore::new();
        let k = key("/a/b");
        assert_eq!(ds.get(&k).unwrap(), None);
        ds.put(&k, b"v1").unwrap();
        assert_eq!(ds.get(&k).unwrap(), Some(b"v1".to_vec()));
        ds.put(&k, b"v2").unwrap();
        assert_eq!(ds.get(&k).unwrap(), Some(b"v2".to_vec()));
        assert_eq!(ds.size(&k).unwrap(), Some(2));
        assert!(ds.delete(&k).unwrap());
        assert!(!ds.delete(&k).unwrap());
        assert!(!ds.has(&k).unwrap());
    }

    #[test]
    fn keys_filter_by_prefix() {
        let ds = InMemoryDatastore::new();
        ds.put(&key("/blocks/a"), b"1").unwrap();
        ds.put(&key("/blocks/b"), b"2").unwrap();
        ds.put(&key("/records/c"), b"3").unwrap();
        let mut keys = ds.keys(&key("/blocks")).unwrap();
        keys.sort();
        assert_eq!(keys, vec![key("/blocks/a"), key("/blocks/b")]);
        assert_eq!(ds.keys(&DsKey::root()).unwrap().len(), 3);
    }

    #[test]
    fn shared_through_arc() {
        let ds = Arc::new(InMemoryDatastore::new());
        let other: Arc<dyn Datastore> = ds.clone();
        other.put(&key("/x"), b"y").unwrap();
        assert!(ds.has(&key("/x")).unwrap());
    }
}
