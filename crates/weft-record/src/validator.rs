//! Record validity and the deterministic record order.
//!
//! Independent writers may publish records under one key without
//! coordinating. [`order`] gives every peer the same total order over any
//! record set, so all of them agree on the current value:
//!
//! 1. higher version wins;
//! 2. on a tie, the validator's own comparison;
//! 3. on a tie, the canonical bytes, compared lexicographically.
//!
//! The validator tier is only trusted where it is antisymmetric: if
//! `validator.order(a, b)` is not the reverse of `validator.order(b, a)`, the
//! tier counts as a tie and the byte tier decides.
//!
//! A validator whose preferences form a cycle still makes [`order`]
//! intransitive. Readers therefore pick the current value with [`best`],
//! which walks the candidates in canonical byte order and so returns the
//! same record for the same set no matter how it was observed.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{RecordError, RecordResult};
use crate::record::Record;
use crate::signed::SignedRecord;

/// Deployment-specific record acceptance and tie-breaking.
pub trait Validator: Send + Sync {
    /// Whether the record is acceptable right now.
    fn valid(&self, record: &Record) -> RecordResult<()>;

    /// Compare two records of equal version. Need not be a valid ordering;
    /// it only has to be a pure function of its inputs.
    fn order(&self, _a: &Record, _b: &Record) -> Ordering {
        Ordering::Equal
    }
}

impl<V: Validator + ?Sized> Validator for Arc<V> {
    fn valid(&self, record: &Record) -> RecordResult<()> {
        (**self).valid(record)
    }

    fn order(&self, a: &Record, b: &Record) -> Ordering {
        (**self).order(a, b)
    }
}

/// Accepts every record and never breaks ties.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn valid(&self, _record: &Record) -> RecordResult<()> {
        Ok(())
    }
}

/// Accepts only records that are signed-record envelopes with a valid
/// signature.
#[derive(Clone, Copy, Debug, Default)]
pub struct SignatureValidator;

impl Validator for SignatureValidator {
    fn valid(&self, record: &Record) -> RecordResult<()> {
        SignedRecord::from_record(record)?.verify()
    }
}

/// Order over records for a fixed validator. Total whenever the validator's
/// own comparison is transitive.
pub fn order(validator: &dyn Validator, a: &Record, b: &Record) -> Ordering {
    a.version()
        .cmp(&b.version())
        .then_with(|| validator_tier(validator, a, b))
        .then_with(|| canonical_cmp(a, b))
}

fn validator_tier(validator: &dyn Validator, a: &Record, b: &Record) -> Ordering {
    let forward = validator.order(a, b);
    if forward == validator.order(b, a).reverse() {
        forward
    } else {
        Ordering::Equal
    }
}

fn canonical_cmp(a: &Record, b: &Record) -> Ordering {
    match (a.marshal(), b.marshal()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => (a.version(), a.value(), a.data()).cmp(&(b.version(), b.value(), b.data())),
    }
}

/// The greatest record under [`order`], or `None` for an empty input.
///
/// Candidates are visited in canonical byte order, so the result depends only
/// on the set of records, never on the order they were observed in.
pub fn best<I>(validator: &dyn Validator, records: I) -> Option<Record>
where
    I: IntoIterator<Item = Record>,
{
    let mut candidates: Vec<Record> = records.into_iter().collect();
    candidates.sort_by(canonical_cmp);
    candidates.dedup();
    candidates.into_iter().reduce(|current, next| {
        if order(validator, &next, &current) == Ordering::Greater {
            next
        } else {
            current
        }
    })
}

/// Check validity and wrap failures as [`RecordError::Rejected`], keeping
/// signature failures distinct.
pub fn check(validator: &dyn Validator, record: &Record) -> RecordResult<()> {
    match validator.valid(record) {
        Ok(()) => Ok(()),
        Err(e @ (RecordError::SignatureInvalid | RecordError::Rejected(_))) => Err(e),
        Err(other) => Err(RecordError::Rejected(other.to_string())),
    }
}
