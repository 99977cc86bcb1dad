use weft_types::{NetAddr, PeerId};

use crate::signer::{PublicKey, Signer, SigningKey};

/// Network host identity consumed by provider records and exchange peers.
///
/// A host's id must always be the content address of its public key.
pub trait Host: Send + Sync {
    /// This host's peer identity.
    fn id(&self) -> PeerId;

    /// Public key backing [`Host::id`].
    fn public_key(&self) -> PublicKey;

    /// Signing capability for this host's key.
    fn signer(&self) -> &dyn Signer;

    /// Addresses this host can be reached at.
    fn addrs(&self) -> Vec<NetAddr>;
}

/// A host backed by an in-process signing key.
#[derive(Clone, Debug)]
pub struct LocalHost {
    key: SigningKey,
    id: PeerId,
    addrs: Vec<NetAddr>,
}

impl LocalHost {
    pub fn new(key: SigningKey, addrs: Vec<NetAddr>) -> Self {
        let id = key.public_key().peer_id();
        Self { key, id, addrs }
    }

    /// A host with a fresh random key and no addresses.
    pub fn generate() -> Self {
        Self::new(SigningKey::generate(), Vec::new())
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.key
    }
}

impl Host for LocalHost {
    fn id(&self) -> PeerId {
        self.id.clone()
    }

    fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    fn signer(&self) -> &dyn Signer {
        &self.key
    }

    fn addrs(&self) -> Vec<NetAddr> {
        self.addrs.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_hash_of_public_key() {
        let host = LocalHost::generate();
        assert_eq!(host.id(), host.public_key().peer_id());
        assert!(host.public_key().matches(&host.id()));
    }

    #[test]
    fn signer_matches_public_key() {
        let host = LocalHost::generate();
        let sig = host.signer().sign(b"announce");
        assert!(host.public_key().verify(b"announce", &sig).is_ok());
        assert_eq!(host.signer().public_key(), host.public_key());
    }

    #[test]
    fn addrs_are_reported() {
        let addr = NetAddr::parse("/ip4/127.0.0.1/tcp/4001").unwrap();
        let host = LocalHost::new(SigningKey::generate(), vec![addr.clone()]);
        assert_eq!(host.addrs(), vec![addr]);
    }

    #[test]
    fn usable_as_trait_object() {
        let host: Box<dyn Host> = Box::new(LocalHost::generate());
        assert!(host.addrs().is_empty());
    }
}
