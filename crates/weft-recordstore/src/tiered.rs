use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use weft_record::{Record, RecordError, RecordResult};

use crate::key::RecordKey;
use crate::store::{RecordStore, RecordStream};

/// Which tiers a [`TieredRecordStore`] writes to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PutPolicy {
    /// Every tier.
    #[default]
    All,
    /// Only the tiers at these indices.
    Tiers(Vec<usize>),
}

/// Record store over an ordered list of other stores.
///
/// `get` queries every tier at once and merges the results into one stream,
/// so fast tiers answer first. `put` writes to the tiers chosen by the
/// [`PutPolicy`] and fails if any of them fails, after all were tried.
pub struct TieredRecordStore {
    tiers: Vec<Arc<dyn RecordStore>>,
    policy: PutPolicy,
}

impl TieredRecordStore {
    pub fn new(tiers: Vec<Arc<dyn RecordStore>>) -> Self {
        Self::with_policy(tiers, PutPolicy::All)
    }

    pub fn with_policy(tiers: Vec<Arc<dyn RecordStore>>, policy: PutPolicy) -> Self {
        if let PutPolicy::Tiers(indices) = &policy {
            for &i in indices.iter().filter(|&&i| i >= tiers.len()) {
                warn!(tier = i, tiers = tiers.len(), "put policy names a missing tier");
            }
        }
        Self { tiers, policy }
    }

    pub fn tiers(&self) -> &[Arc<dyn RecordStore>] {
        &self.tiers
    }

    pub fn policy(&self) -> &PutPolicy {
        &self.policy
    }

    fn put_targets(&self) -> Vec<&Arc<dyn RecordStore>> {
        match &self.policy {
            PutPolicy::All => self.tiers.iter().collect(),
            PutPolicy::Tiers(indices) => indices.iter().filter_map(|&i| self.tiers.get(i)).collect(),
        }
    }
}

#[async_trait]
impl RecordStore for TieredRecordStore {
    async fn put(&self, key: &RecordKey, record: Record) -> RecordResult<()> {
        let targets = self.put_targets();
        let results = join_all(targets.iter().map(|tier| tier.put(key, record.clone()))).await;
        let mut first_error: Option<RecordError> = None;
        for (i, result) in results.into_iter().enumerate() {
            if let Err(e) = result {
                warn!(key = %key, tier = i, error = %e, "tier put failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn get(&self, key: &RecordKey, cancel: CancellationToken) -> RecordStream {
        let streams = self.tiers.iter().map(|tier| tier.get(key, cancel.clone()));
        stream::select_all(streams).boxed()
    }
}

impl std::fmt::Debug for TieredRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredRecordStore")
            .field("tiers", &self.tiers.len())
            .field("policy", &self.policy)
            .finish()
    }
}
