use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use futures::stream::{BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use weft_crypto::Host;
use weft_record::RecordResult;
use weft_recordstore::{RecordKey, RecordStore};
use weft_types::{ContentAddress, PeerId};

use crate::record::{ProviderRecord, ProviderValidator, DEFAULT_PROVIDER_TTL};

/// Record key namespace for provider records.
pub const PROVIDERS_NAMESPACE: &str = "providers";

/// Record key under which providers of `block` are announced.
pub fn provider_key(block: &ContentAddress) -> RecordKey {
    RecordKey::namespaced(PROVIDERS_NAMESPACE, &block.to_hex())
}

/// Announce `host` as a provider of `block` in `store`.
pub async fn provide(
    store: &dyn RecordStore,
    block: &ContentAddress,
    host: &dyn Host,
) -> RecordResult<ProviderRecord> {
    let record = ProviderRecord::new(block, host)?;
    store.put(&provider_key(block), record.to_record()?).await?;
    info!(key = %block.short_hex(), provider = %host.id().short_id(), "provided block");
    Ok(record)
}

/// Distinct peers announcing `block`, using the default provider TTL.
pub fn find_providers(
    store: &dyn RecordStore,
    block: &ContentAddress,
    cancel: CancellationToken,
) -> BoxStream<'static, PeerId> {
    let validator = ProviderValidator::new(block.clone(), DEFAULT_PROVIDER_TTL);
    find_providers_with(store, Arc::new(validator), cancel)
}

/// Distinct peers announcing the validator's block.
///
/// Records that fail the validator are skipped. Each provider is yielded the
/// first time a valid record for it arrives; the stream ends with the
/// underlying record stream.
pub fn find_providers_with(
    store: &dyn RecordStore,
    validator: Arc<ProviderValidator>,
    cancel: CancellationToken,
) -> BoxStream<'static, PeerId> {
    let key = provider_key(validator.block());
    let mut seen: HashSet<PeerId> = HashSet::new();
    store
        .get(&key, cancel)
        .filter_map(move |item| {
            let found = match item.and_then(|record| validator.provider_record(&record)) {
                Ok(provider) => {
                    let id = provider.provider().clone();
                    seen.insert(id.clone()).then_some(id)
                }
                Err(e) => {
                    debug!(key = %validator.block().short_hex(), error = %e, "skipping provider record");
                    None
                }
            };
            future::ready(found)
        })
        .boxed()
}

/// Convenience for callers that only know a TTL.
pub fn provider_validator(block: &ContentAddress, ttl: Duration) -> Arc<ProviderValidator> {
    Arc::new(ProviderValidator::new(block.clone(), ttl))
}
