use std::cmp::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weft_crypto::{Host, Signer};
use weft_record::{Record, RecordError, RecordResult, SignedRecord, Validator};
use weft_types::{ContentAddress, PeerId};

/// Default lifetime of a provider announcement.
pub const DEFAULT_PROVIDER_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// What a provider record asserts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderClaim {
    /// The block being provided.
    pub block: ContentAddress,
    /// The announcing peer.
    pub provider: PeerId,
    /// Publication time, milliseconds since the Unix epoch.
    pub published_at_ms: u64,
    /// Reserved for a storage proof. Carried and signed, never interpreted.
    pub proof: Option<Vec<u8>>,
}

impl ProviderClaim {
    /// A claim by `provider` for `block`, published now.
    pub fn now(block: ContentAddress, provider: PeerId) -> Self {
        Self {
            block,
            provider,
            published_at_ms: now_ms(),
            proof: None,
        }
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(i64::try_from(self.published_at_ms).ok()?)
    }

    fn to_bytes(&self) -> RecordResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| RecordError::Serialization(e.to_string()))
    }

    fn from_bytes(bytes: &[u8]) -> RecordResult<Self> {
        bincode::deserialize(bytes).map_err(|e| RecordError::Serialization(e.to_string()))
    }
}

/// A signed announcement that a peer holds a block.
///
/// The claim is the value of a signed sub-record whose version is the
/// publication time, so newer announcements outrank older ones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderRecord {
    claim: ProviderClaim,
    signed: SignedRecord,
}

impl ProviderRecord {
    /// Announce `host` as a provider of `block`.
    pub fn new(block: &ContentAddress, host: &dyn Host) -> RecordResult<Self> {
        Self::with_claim(ProviderClaim::now(block.clone(), host.id()), host.signer())
    }

    /// Sign an arbitrary claim. The result only verifies if `signer`'s key
    /// hashes to `claim.provider`.
    pub fn with_claim(claim: ProviderClaim, signer: &dyn Signer) -> RecordResult<Self> {
        let sub = Record::new(claim.published_at_ms, claim.to_bytes()?, Vec::new());
        Ok(Self {
            signed: SignedRecord::sign(sub, signer)?,
            claim,
        })
    }

    pub fn claim(&self) -> &ProviderClaim {
        &self.claim
    }

    pub fn block(&self) -> &ContentAddress {
        &self.claim.block
    }

    pub fn provider(&self) -> &PeerId {
        &self.claim.provider
    }

    pub fn proof(&self) -> Option<&[u8]> {
        self.claim.proof.as_deref()
    }

    pub fn signed(&self) -> &SignedRecord {
        &self.signed
    }

    /// Check the signature and that the provider id is the canonical peer id
    /// of the signing key. Ids under any other hash algorithm are refused, so
    /// one host has exactly one provider identity.
    pub fn verify(&self) -> RecordResult<()> {
        self.signed.verify()?;
        if self.claim.provider != self.signed.public_key().peer_id() {
            return Err(RecordError::Rejected(format!(
                "provider {} is not the signing key",
                self.claim.provider.short_id()
            )));
        }
        Ok(())
    }

    /// The record form stored in record stores.
    pub fn to_record(&self) -> RecordResult<Record> {
        self.signed.to_record()
    }

    /// Parse the record form. Nothing is verified.
    pub fn from_record(record: &Record) -> RecordResult<Self> {
        let signed = SignedRecord::from_record(record)?;
        let claim = ProviderClaim::from_bytes(signed.record().value())?;
        Ok(Self { claim, signed })
    }
}

/// Accepts verified, unexpired provider records for one block.
#[derive(Clone, Debug)]
pub struct ProviderValidator {
    block: ContentAddress,
    ttl: Duration,
}

impl ProviderValidator {
    pub fn new(block: ContentAddress, ttl: Duration) -> Self {
        Self { block, ttl }
    }

    pub fn block(&self) -> &ContentAddress {
        &self.block
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Decode and fully check a record.
    pub fn provider_record(&self, record: &Record) -> RecordResult<ProviderRecord> {
        let provider = ProviderRecord::from_record(record)?;
        provider.verify()?;
        if provider.block() != &self.block {
            return Err(RecordError::Rejected(format!(
                "record is for block {}",
                provider.block().short_hex()
            )));
        }
        let age_ms = now_ms().saturating_sub(provider.claim.published_at_ms);
        if u128::from(age_ms) > self.ttl.as_millis() {
            return Err(RecordError::Rejected(format!("expired {age_ms}ms after publication")));
        }
        Ok(provider)
    }
}

impl Validator for ProviderValidator {
    fn valid(&self, record: &Record) -> RecordResult<()> {
        self.provider_record(record).map(|_| ())
    }

    fn order(&self, a: &Record, b: &Record) -> Ordering {
        match (ProviderRecord::from_record(a), ProviderRecord::from_record(b)) {
            (Ok(a), Ok(b)) => a.claim.published_at_ms.cmp(&b.claim.published_at_ms),
            _ => Ordering::Equal,
        }
    }
}

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_crypto::{ContentHasher, LocalHost};
    use weft_types::HashAlgorithm;

    fn block() -> ContentAddress {
        ContentHasher::default().hash(b"provided block")
    }

    #[test]
    fn new_record_verifies() {
        let host = LocalHost::generate();
        let record = ProviderRecord::new(&block(), &host).unwrap();
        record.verify().unwrap();
        assert_eq!(record.provider(), &host.id());
        assert_eq!(record.block(), &block());
        assert!(record.proof().is_none());
        assert!(record.claim().published_at().is_some());
    }

    #[test]
    fn record_form_roundtrip() {
        let host = LocalHost::generate();
        let original = ProviderRecord::new(&block(), &host).unwrap();
        let plain = original.to_record().unwrap();
        assert_eq!(plain.version(), original.claim().published_at_ms);
        let back = ProviderRecord::from_record(&plain).unwrap();
        assert_eq!(back, original);
        back.verify().unwrap();
    }

    #[test]
    fn proof_is_carried_and_signed() {
        let host = LocalHost::generate();
        let mut claim = ProviderClaim::now(block(), host.id());
        claim.proof = Some(vec![1, 2, 3]);
        let record = ProviderRecord::with_claim(claim, host.signer()).unwrap();
        let back = ProviderRecord::from_record(&record.to_record().unwrap()).unwrap();
        assert_eq!(back.proof(), Some(&[1u8, 2, 3][..]));
        back.verify().unwrap();
    }

    #[test]
    fn provider_must_be_the_signer() {
        let host = LocalHost::generate();
        let impostor = LocalHost::generate();
        let claim = ProviderClaim::now(block(), host.id());
        let forged = ProviderRecord::with_claim(claim, impostor.signer()).unwrap();
        assert!(matches!(forged.verify(), Err(RecordError::Rejected(_))));
    }

    #[test]
    fn provider_id_must_use_the_canonical_algorithm() {
        let host = LocalHost::generate();
        let alias = host.public_key().peer_id_with(HashAlgorithm::Sha2_256);
        assert_ne!(alias, host.id());
        let record = ProviderRecord::with_claim(ProviderClaim::now(block(), alias), host.signer()).unwrap();
        assert!(matches!(record.verify(), Err(RecordError::Rejected(_))));
    }

    #[test]
    fn validator_checks_block_and_age() {
        let host = LocalHost::generate();
        let validator = ProviderValidator::new(block(), Duration::from_secs(60));
        let good = ProviderRecord::new(&block(), &host).unwrap().to_record().unwrap();
        validator.valid(&good).unwrap();

        let other = ContentHasher::default().hash(b"other");
        let wrong = ProviderRecord::new(&other, &host).unwrap().to_record().unwrap();
        assert!(validator.valid(&wrong).is_err());

        let mut stale = ProviderClaim::now(block(), host.id());
        stale.published_at_ms -= 120_000;
        let stale = ProviderRecord::with_claim(stale, host.signer())
            .unwrap()
            .to_record()
            .unwrap();
        assert!(validator.valid(&stale).is_err());

        assert!(validator.valid(&Record::new(1, b"junk".to_vec(), Vec::new())).is_err());
    }

    #[test]
    fn newer_announcement_wins() {
        let host = LocalHost::generate();
        let validator = ProviderValidator::new(block(), DEFAULT_PROVIDER_TTL);
        let mut old = ProviderClaim::now(block(), host.id());
        old.published_at_ms -= 1_000;
        let old = ProviderRecord::with_claim(old, host.signer()).unwrap().to_record().unwrap();
        let new = ProviderRecord::new(&block(), &host).unwrap().to_record().unwrap();
        assert_eq!(weft_record::order(&validator, &new, &old), Ordering::Greater);
        assert_eq!(
            weft_record::best(&validator, vec![old, new.clone()]),
            Some(new)
        );
    }
}
