use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy for fetching blocks from peers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Maximum wall-clock time a `get_blocks` call waits for missing blocks.
    pub timeout: Duration,
    /// Interval between re-sending wants for blocks still missing.
    pub rebroadcast_interval: Duration,
    /// Maximum number of re-sends per request.
    pub max_rebroadcasts: u32,
    /// Maximum number of providers asked per key through content routing.
    pub max_providers: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            rebroadcast_interval: Duration::from_secs(2),
            max_rebroadcasts: 5,
            max_providers: 10,
        }
    }
}
