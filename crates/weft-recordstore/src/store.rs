use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use weft_record::{RecordResult, Record};

use crate::key::RecordKey;

/// Records found under a key. Not restartable, possibly unbounded; ends when
/// the backing has nothing more to offer or the cancellation token fires.
pub type RecordStream = BoxStream<'static, RecordResult<Record>>;

/// Storage for records under logical keys.
///
/// A key may hold several records at once. Conflicts are resolved by the
/// reader with [`weft_record::order`], never by the store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Add a record under `key`. Stores built with a validator reject
    /// invalid records with [`weft_record::RecordError::Rejected`].
    async fn put(&self, key: &RecordKey, record: Record) -> RecordResult<()>;

    /// Records associated with `key`, as they are found.
    fn get(&self, key: &RecordKey, cancel: CancellationToken) -> RecordStream;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn put(&self, key: &RecordKey, record: Record) -> RecordResult<()> {
        (**self).put(key, record).await
    }

    fn get(&self, key: &RecordKey, cancel: CancellationToken) -> RecordStream {
        (**self).get(key, cancel)
    }
}
