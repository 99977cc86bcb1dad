use futures::StreamExt;
use tracing::debug;
use weft_record::{best, Record, RecordError, Validator};

use crate::store::RecordStream;

/// Consume a record stream and return the current value: the greatest valid
/// record under [`weft_record::order`].
///
/// Invalid records and stream errors are skipped. A cancelled stream ends
/// early; the best record seen until then is returned. The choice is made by
/// [`best`] over everything collected, so it depends only on which records
/// arrived, never on the order they arrived in.
pub async fn resolve_current(mut stream: RecordStream, validator: &dyn Validator) -> Option<Record> {
    let mut seen = Vec::new();
    while let Some(item) = stream.next().await {
        let record = match item {
            Ok(record) => record,
            Err(RecordError::Cancelled) => break,
            Err(e) => {
                debug!(error = %e, "skipping failed record");
                continue;
            }
        };
        if let Err(e) = validator.valid(&record) {
            debug!(error = %e, version = record.version(), "skipping invalid record");
            continue;
        }
        seen.push(record);
    }
    best(validator, seen)
}

/// Every valid record in the stream, plus the best of them.
pub async fn collect_valid(stream: RecordStream, validator: &dyn Validator) -> (Vec<Record>, Option<Record>) {
    let records: Vec<Record> = stream
        .filter_map(|item| futures::future::ready(item.ok()))
        .filter(|r| futures::future::ready(validator.valid(r).is_ok()))
        .collect()
        .await;
    let top = best(validator, records.clone());
    (records, top)
}
