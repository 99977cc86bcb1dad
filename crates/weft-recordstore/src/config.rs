use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Limits for datastore-backed record stores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordStoreConfig {
    /// Records kept per key. When exceeded, the lowest-ordered records go.
    pub max_records_per_key: usize,
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        Self {
            max_records_per_key: 64,
        }
    }
}

/// Behaviour of the simulated DHT.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DhtConfig {
    /// Number of nodes, closest by XOR distance, that store each value.
    pub replication: usize,
    /// Delay before querying each further node during a lookup.
    pub hop_delay: Duration,
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self {
            replication: 3,
            hop_delay: Duration::from_millis(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(RecordStoreConfig::default().max_records_per_key, 64);
        let dht = DhtConfig::default();
        assert_eq!(dht.replication, 3);
        assert_eq!(dht.hop_delay, Duration::from_millis(5));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c: DhtConfig = toml::from_str("replication = 5").unwrap();
        assert_eq!(c.replication, 5);
        assert_eq!(c.hop_delay, DhtConfig::default().hop_delay);

        let r: RecordStoreConfig = toml::from_str("").unwrap();
        assert_eq!(r, RecordStoreConfig::default());
    }
}
