use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::trace;
use weft_crypto::{ContentHasher, PublicKey, Signature, Signer};
use weft_dag::{DagService, Link, Node};
use weft_types::{ContentAddress, PeerId};

use crate::error::{RecordError, RecordResult};
use crate::record::{decode_exact, Record};

const RECORD_LINK: &str = "record";
const KEY_LINK: &str = "key";

/// A record authenticated by a public key.
///
/// The signature covers the canonical encoding of the pair (sub-record link,
/// public key link), where each link is the default-hasher address of the
/// corresponding DAG node. As a DAG node, a signed record has a `record` and
/// a `key` link and carries the signature as its data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedRecord {
    record: Record,
    public_key: PublicKey,
    signature: Signature,
}

/// Fields a signed record adds to its sub-record when it travels as a plain
/// [`Record`].
#[derive(Serialize, Deserialize)]
struct Envelope {
    data: Vec<u8>,
    public_key: PublicKey,
    signature: Signature,
}

impl SignedRecord {
    /// Sign `record` with `signer`'s key.
    pub fn sign(record: Record, signer: &dyn Signer) -> RecordResult<Self> {
        let public_key = signer.public_key();
        let signature = signer.sign(&signable_bytes(&record, &public_key)?);
        Ok(Self {
            record,
            public_key,
            signature,
        })
    }

    /// The signed sub-record.
    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Identity of the signer.
    pub fn signer_id(&self) -> PeerId {
        self.public_key.peer_id()
    }

    /// The bytes the signature covers.
    pub fn signable(&self) -> RecordResult<Vec<u8>> {
        signable_bytes(&self.record, &self.public_key)
    }

    /// Check the signature. Fails with [`RecordError::SignatureInvalid`].
    pub fn verify(&self) -> RecordResult<()> {
        self.public_key.verify(&self.signable()?, &self.signature)?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // DAG form
    // ---------------------------------------------------------------

    /// The signed record as a DAG node, links addressed with the default hasher.
    pub fn to_node(&self) -> RecordResult<Node> {
        self.to_node_with(&ContentHasher::default())
    }

    fn to_node_with(&self, hasher: &ContentHasher) -> RecordResult<Node> {
        let links = vec![
            Link::to_node_with(RECORD_LINK, &self.record.to_node()?, hasher)?,
            Link::to_node_with(KEY_LINK, &key_node(&self.public_key), hasher)?,
        ];
        Ok(Node::new(self.signature.to_bytes().to_vec(), links)?)
    }

    /// Store the sub-record, the key and the signed node.
    pub fn store(&self, dag: &DagService) -> RecordResult<ContentAddress> {
        dag.add(&self.record.to_node()?)?;
        dag.add(&key_node(&self.public_key))?;
        let key = dag.add(&self.to_node_with(dag.hasher())?)?;
        trace!(node = %key.short_hex(), signer = %self.signer_id().short_id(), "stored signed record");
        Ok(key)
    }

    /// Load a stored signed record. The signature is not checked.
    pub async fn load(
        dag: &DagService,
        key: &ContentAddress,
        cancel: CancellationToken,
    ) -> RecordResult<Self> {
        let node = dag.get(key, cancel.clone()).await?;
        let record_node = dag
            .get(link_target(&node, RECORD_LINK)?, cancel.clone())
            .await?;
        let key_node = dag.get(link_target(&node, KEY_LINK)?, cancel).await?;
        let record = Record::from_node(&record_node)?;
        Ok(Self {
            record,
            public_key: PublicKey::from_bytes(key_node.data())?,
            signature: Signature::from_bytes(node.data())?,
        })
    }

    // ---------------------------------------------------------------
    // Record envelope
    // ---------------------------------------------------------------

    /// A plain record with the sub-record's version and value, and the
    /// sub-record's data, key and signature packed into `data`.
    pub fn to_record(&self) -> RecordResult<Record> {
        let envelope = Envelope {
            data: self.record.data().to_vec(),
            public_key: self.public_key.clone(),
            signature: self.signature.clone(),
        };
        let data =
            bincode::serialize(&envelope).map_err(|e| RecordError::Serialization(e.to_string()))?;
        Ok(Record::new(
            self.record.version(),
            self.record.value().to_vec(),
            data,
        ))
    }

    /// Inverse of [`to_record`](Self::to_record). The signature is not checked.
    pub fn from_record(record: &Record) -> RecordResult<Self> {
        let envelope: Envelope = decode_exact(record.data())?;
        Ok(Self {
            record: Record::new(record.version(), record.value().to_vec(), envelope.data),
            public_key: envelope.public_key,
            signature: envelope.signature,
        })
    }
}

fn key_node(public_key: &PublicKey) -> Node {
    Node::leaf(public_key.to_bytes().to_vec())
}

fn signable_bytes(record: &Record, public_key: &PublicKey) -> RecordResult<Vec<u8>> {
    let record_link = record.to_node()?.address()?;
    let key_link = key_node(public_key).address()?;
    bincode::serialize(&(record_link, key_link))
        .map_err(|e| RecordError::Serialization(e.to_string()))
}

fn link_target<'a>(node: &'a Node, name: &str) -> RecordResult<&'a ContentAddress> {
    node.link(name)
        .map(|l| &l.target)
        .ok_or_else(|| RecordError::Serialization(format!("missing {name:?} link")))
}
