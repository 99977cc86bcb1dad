use std::time::Duration;

use serde::{Deserialize, Serialize};
use weft_exchange::ExchangeConfig;
use weft_provide::DEFAULT_PROVIDER_TTL;
use weft_recordstore::{DhtConfig, RecordStoreConfig};
use weft_types::HashAlgorithm;

use crate::error::{NodeError, NodeResult};

/// Settings of a node, persisted as `config.toml` in its repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Algorithm used for new block and node addresses.
    pub hash_algorithm: HashAlgorithm,
    /// Seconds a provider announcement stays valid.
    pub provider_ttl_secs: u64,
    pub records: RecordStoreConfig,
    pub dht: DhtConfig,
    pub exchange: ExchangeConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::default(),
            provider_ttl_secs: DEFAULT_PROVIDER_TTL.as_secs(),
            records: RecordStoreConfig::default(),
            dht: DhtConfig::default(),
            exchange: ExchangeConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn provider_ttl(&self) -> Duration {
        Duration::from_secs(self.provider_ttl_secs)
    }

    pub fn from_toml(text: &str) -> NodeResult<Self> {
        toml::from_str(text).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> NodeResult<String> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }
}
