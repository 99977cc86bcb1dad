use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use weft_blocks::{Datastore, DsKey};
use weft_record::{check, order, Record, RecordError, RecordResult, Validator};

use crate::config::RecordStoreConfig;
use crate::key::RecordKey;
use crate::store::{RecordStore, RecordStream};

/// Record store over a local [`Datastore`].
///
/// Each key maps to one datastore entry holding the set of records put under
/// it. Duplicates collapse, and the set is capped at
/// [`RecordStoreConfig::max_records_per_key`] by dropping the records that
/// rank lowest under the validator's order.
pub struct DatastoreRecordStore<D> {
    datastore: D,
    validator: Arc<dyn Validator>,
    config: RecordStoreConfig,
    prefix: DsKey,
    write_lock: Mutex<()>,
}

impl<D: Datastore> DatastoreRecordStore<D> {
    pub fn new(datastore: D, validator: Arc<dyn Validator>) -> Self {
        Self::with_config(datastore, validator, RecordStoreConfig::default())
    }

    pub fn with_config(
        datastore: D,
        validator: Arc<dyn Validator>,
        config: RecordStoreConfig,
    ) -> Self {
        Self {
            datastore,
            validator,
            config,
            prefix: DsKey::namespace("records"),
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RecordStoreConfig {
        &self.config
    }

    /// Records currently held under `key`.
    pub fn records(&self, key: &RecordKey) -> RecordResult<Vec<Record>> {
        self.load(&self.ds_key(key)?)
    }

    fn ds_key(&self, key: &RecordKey) -> RecordResult<DsKey> {
        Ok(self.prefix.child(&hex::encode(key.as_bytes()))?)
    }

    fn load(&self, ds_key: &DsKey) -> RecordResult<Vec<Record>> {
        match self.datastore.get(ds_key)? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| RecordError::Serialization(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, ds_key: &DsKey, records: &[Record]) -> RecordResult<()> {
        let bytes =
            bincode::serialize(records).map_err(|e| RecordError::Serialization(e.to_string()))?;
        self.datastore.put(ds_key, &bytes)?;
        Ok(())
    }

    fn insert(&self, key: &RecordKey, record: Record) -> RecordResult<()> {
        check(self.validator.as_ref(), &record)?;
        let ds_key = self.ds_key(key)?;

        let _guard = self.write_lock.lock().expect("lock poisoned");
        let mut records = self.load(&ds_key)?;
        if records.contains(&record) {
            return Ok(());
        }
        records.push(record);
        if records.len() > self.config.max_records_per_key {
            let validator = self.validator.as_ref();
            records.sort_by(|a, b| order(validator, b, a));
            let dropped = records.len() - self.config.max_records_per_key;
            records.truncate(self.config.max_records_per_key);
            debug!(key = %key, dropped, "record set over capacity");
        }
        self.save(&ds_key, &records)
    }
}

#[async_trait]
impl<D: Datastore> RecordStore for DatastoreRecordStore<D> {
    async fn put(&self, key: &RecordKey, record: Record) -> RecordResult<()> {
        self.insert(key, record)
    }

    fn get(&self, key: &RecordKey, cancel: CancellationToken) -> RecordStream {
        let items: Vec<RecordResult<Record>> = match self.records(key) {
            Ok(records) => records.into_iter().map(Ok).collect(),
            Err(e) => vec![Err(e)],
        };
        stream::iter(items)
            .take_until(cancel.cancelled_owned())
            .boxed()
    }
}

impl<D> std::fmt::Debug for DatastoreRecordStore<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatastoreRecordStore")
            .field("config", &self.config)
            .finish()
    }
}
