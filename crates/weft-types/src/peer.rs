use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::ContentAddress;
use crate::error::TypeError;

/// Network identity of a peer.
///
/// A `PeerId` is the content address of the peer's public key bytes, so
/// anyone holding the key can check the claim. Deriving the id is the job of
/// `weft-crypto`; this type only carries it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(ContentAddress);

impl PeerId {
    /// Wrap the content address of a public key.
    pub fn from_address(address: ContentAddress) -> Self {
        Self(address)
    }

    /// The underlying content address.
    pub fn as_address(&self) -> &ContentAddress {
        &self.0
    }

    /// Full hex-encoded string.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Short identifier for logs.
    pub fn short_id(&self) -> String {
        format!("peer:{}", self.0.short_hex())
    }

    /// Parse from the hex form, with or without a `peer:` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("peer:").unwrap_or(s);
        ContentAddress::from_hex(s).map(Self)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.short_id())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for PeerId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<ContentAddress> for PeerId {
    fn from(address: ContentAddress) -> Self {
        Self(address)
    }
}

/// A dialable network address in multiaddr text form, e.g. `/ip4/127.0.0.1/tcp/4001`.
///
/// Weft does not dial anything itself; addresses are carried for hosts and
/// transports that do.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetAddr(String);

impl NetAddr {
    /// Parse a multiaddr-style string. It must start with `/` and have an even
    /// number of non-empty segments (protocol/value pairs).
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| TypeError::InvalidPath(format!("address must start with '/': {s}")))?;
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|seg| seg.is_empty()) || segments.len() % 2 != 0 {
            return Err(TypeError::InvalidPath(format!(
                "address must be protocol/value pairs: {s}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// This address suffixed with `/ipfs/<peer>`.
    pub fn with_peer(&self, peer: &PeerId) -> Self {
        Self(format!("{}/ipfs/{}", self.0, peer.to_hex()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for NetAddr {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::HashAlgorithm;

    fn peer(fill: u8) -> PeerId {
        PeerId::from_address(ContentAddress::new(HashAlgorithm::Blake3, vec![fill; 32]).unwrap())
    }

    #[test]
    fn hex_roundtrip_with_prefix() {
        let p = peer(3);
        assert_eq!(PeerId::from_hex(&p.to_hex()).unwrap(), p);
        assert_eq!(PeerId::from_hex(&format!("peer:{}", p.to_hex())).unwrap(), p);
    }

    #[test]
    fn short_id_format() {
        let id = peer(0xab).short_id();
        assert_eq!(id, "peer:abababab");
    }

    #[test]
    fn netaddr_parse() {
        assert!(NetAddr::parse("/ip4/127.0.0.1/tcp/4001").is_ok());
        assert!(NetAddr::parse("ip4/127.0.0.1").is_err());
        assert!(NetAddr::parse("/ip4/127.0.0.1/tcp").is_err());
        assert!(NetAddr::parse("/ip4//tcp/1").is_err());
    }

    #[test]
    fn netaddr_with_peer() {
        let p = peer(1);
        let a = NetAddr::parse("/ip4/10.0.0.1/tcp/1").unwrap().with_peer(&p);
        assert_eq!(a.as_str(), format!("/ip4/10.0.0.1/tcp/1/ipfs/{}", p.to_hex()));
        assert!(NetAddr::parse(a.as_str()).is_ok());
    }

    #[test]
    fn peer_id_serde_is_transparent() {
        let p = peer(5);
        let json = serde_json::to_string(&p).unwrap();
        let addr_json = serde_json::to_string(p.as_address()).unwrap();
        assert_eq!(json, addr_json);
    }
}
