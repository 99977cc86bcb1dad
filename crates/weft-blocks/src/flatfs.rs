use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::datastore::{Datastore, DsKey};
use crate::error::{BlockError, BlockResult};

const EXTENSION: &str = "data";
const SHARD_WIDTH: usize = 2;

/// One file per key under a root directory.
///
/// A key `/blocks/1e20abcdef` is stored at `<root>/blocks/de/1e20abcdef.data`:
/// the leading segments become directories and the value file is sharded by
/// the two characters before the last one of its name. Writes go to a temp
/// file in the shard directory and are renamed into place, so a crashed write
/// never leaves a partial value behind.
#[derive(Debug)]
pub struct FlatFsDatastore {
    root: PathBuf,
}

impl FlatFsDatastore {
    /// Open a datastore rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> BlockResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened flatfs datastore");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &DsKey) -> BlockResult<PathBuf> {
        if key.is_root() {
            return Err(BlockError::InvalidKey("cannot store a value at the root key".into()));
        }
        let segments: Vec<&str> = key.segments().collect();
        let (name, dirs) = segments
            .split_last()
            .ok_or_else(|| BlockError::InvalidKey(key.to_string()))?;
        let mut path = self.root.clone();
        for dir in dirs {
            path.push(dir);
        }
        path.push(shard_dir(name));
        path.push(format!("{name}.{EXTENSION}"));
        Ok(path)
    }

    fn prefix_dir(&self, prefix: &DsKey) -> PathBuf {
        let mut path = self.root.clone();
        for seg in prefix.segments() {
            path.push(seg);
        }
        path
    }

    /// Recover the key for a value file: drop the shard directory and extension.
    fn key_from_path(&self, path: &Path) -> Option<DsKey> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let mut parts: Vec<&str> = rel.iter().map(|c| c.to_str()).collect::<Option<_>>()?;
        let file = parts.pop()?;
        let name = file.strip_suffix(&format!(".{EXTENSION}"))?;
        let shard = parts.pop()?;
        if shard != shard_dir(name) {
            return None;
        }
        let mut key = DsKey::root();
        for part in parts {
            key = key.child(part).ok()?;
        }
        key.child(name).ok()
    }
}

/// Next-to-last sharding: the `SHARD_WIDTH` characters preceding the final one,
/// padded with `_` for short names.
fn shard_dir(name: &str) -> String {
    let padded = format!("{:_>width$}", name, width = SHARD_WIDTH + 1);
    let end = padded.len() - 1;
    padded[end - SHARD_WIDTH..end].to_string()
}

impl Datastore for FlatFsDatastore {
    fn put(&self, key: &DsKey, value: &[u8]) -> BlockResult<()> {
        let path = self.path_for(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| BlockError::InvalidKey(key.to_string()))?;
        fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(value)?;
        tmp.as_file().sync_data()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    fn get(&self, key: &DsKey) -> BlockResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn has(&self, key: &DsKey) -> BlockResult<bool> {
        Ok(self.path_for(key)?.is_file())
    }

    fn delete(&self, key: &DsKey) -> BlockResult<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self, prefix: &DsKey) -> BlockResult<Vec<DsKey>> {
        let dir = self.prefix_dir(prefix);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in walkdir::WalkDir::new(&dir) {
            let entry = entry.map_err(|e| BlockError::Io(io::Error::other(e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            match self.key_from_path(path) {
                Some(key) if key.has_prefix(prefix) => keys.push(key),
                Some(_) => {}
                None => warn!(path = %path.display(), "skipping unrecognised file in datastore"),
            }
        }
        Ok(keys)
    }

    fn size(&self, key: &DsKey) -> BlockResult<Option<u64>> {
        let path = self.path_for(key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
