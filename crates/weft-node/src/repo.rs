//! On-disk repository layout.
//!
//! ```text
//! <root>/
//!   config.toml     node settings
//!   identity.key    hex-encoded ed25519 secret key
//!   datastore/      flat-file datastore shared by blocks and records
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;
use weft_blocks::FlatFsDatastore;
use weft_crypto::{Signer, SigningKey};

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};

pub const CONFIG_FILE: &str = "config.toml";
pub const IDENTITY_FILE: &str = "identity.key";
pub const DATASTORE_DIR: &str = "datastore";

/// An initialized repository directory.
#[derive(Debug)]
pub struct Repo {
    root: PathBuf,
    config: NodeConfig,
    identity: SigningKey,
}

impl Repo {
    /// Create a repository with a fresh identity. Fails if one already exists.
    pub fn init(root: impl AsRef<Path>, config: NodeConfig) -> NodeResult<Self> {
        Self::init_with_identity(root, config, SigningKey::generate())
    }

    pub fn init_with_identity(root: impl AsRef<Path>, config: NodeConfig, identity: SigningKey) -> NodeResult<Self> {
        let root = root.as_ref().to_path_buf();
        if Self::is_initialized(&root) {
            return Err(NodeError::AlreadyInitialized(root));
        }
        fs::create_dir_all(root.join(DATASTORE_DIR))?;
        fs::write(root.join(CONFIG_FILE), config.to_toml()?)?;
        fs::write(root.join(IDENTITY_FILE), hex::encode(identity.as_bytes()))?;
        info!(
            root = %root.display(),
            peer = %identity.public_key().peer_id().short_id(),
            "initialized repository"
        );
        Ok(Self { root, config, identity })
    }

    /// Open an existing repository.
    pub fn open(root: impl AsRef<Path>) -> NodeResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !Self::is_initialized(&root) {
            return Err(NodeError::NotInitialized(root));
        }
        let config = NodeConfig::from_toml(&fs::read_to_string(root.join(CONFIG_FILE))?)?;
        let identity = read_identity(&root.join(IDENTITY_FILE))?;
        Ok(Self { root, config, identity })
    }

    pub fn is_initialized(root: &Path) -> bool {
        root.join(CONFIG_FILE).is_file() && root.join(IDENTITY_FILE).is_file()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn identity(&self) -> &SigningKey {
        &self.identity
    }

    /// Rewrite `config.toml`.
    pub fn save_config(&mut self, config: NodeConfig) -> NodeResult<()> {
        fs::write(self.root.join(CONFIG_FILE), config.to_toml()?)?;
        self.config = config;
        Ok(())
    }

    pub fn datastore(&self) -> NodeResult<FlatFsDatastore> {
        Self::datastore_at(&self.root)
    }

    pub(crate) fn datastore_at(root: &Path) -> NodeResult<FlatFsDatastore> {
        Ok(FlatFsDatastore::open(root.join(DATASTORE_DIR))?)
    }

    pub(crate) fn into_parts(self) -> (PathBuf, NodeConfig, SigningKey) {
        (self.root, self.config, self.identity)
    }
}

fn read_identity(path: &Path) -> NodeResult<SigningKey> {
    let text = fs::read_to_string(path)?;
    let bytes = hex::decode(text.trim()).map_err(|e| NodeError::Identity(e.to_string()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| NodeError::Identity(format!("expected 32 key bytes, found {}", b.len())))?;
    Ok(SigningKey::from_bytes(bytes))
}
