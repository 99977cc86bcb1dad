use std::fmt;

use crate::address::ContentAddress;
use crate::error::TypeError;

/// Namespace a [`Path`] is rooted in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// `/ipfs/<address>`: immutable content.
    Content(ContentAddress),
    /// `/ipns/<name>`: a mutable name, resolved through records.
    Name(String),
}

/// A parsed path into content or a mutable name.
///
/// Accepted forms:
///
/// - `/ipfs/<address>/a/b`
/// - `/ipns/<name>/a/b`
/// - `<address>/a/b` (same as `/ipfs/<address>/a/b`)
///
/// Empty segments are dropped, so `/ipfs/<a>//x/` has the single segment `x`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Path {
    root: Namespace,
    segments: Vec<String>,
}

impl Path {
    /// Parse a path string.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let mut parts = s.split('/').filter(|p| !p.is_empty());
        let first = parts
            .next()
            .ok_or_else(|| TypeError::InvalidPath("empty path".into()))?;

        let root = if s.starts_with('/') {
            let head = parts
                .next()
                .ok_or_else(|| TypeError::InvalidPath(format!("missing root in {s:?}")))?;
            match first {
                "ipfs" => Namespace::Content(ContentAddress::from_hex(head)?),
                "ipns" => Namespace::Name(head.to_string()),
                other => {
                    return Err(TypeError::InvalidPath(format!(
                        "unknown namespace {other:?}"
                    )))
                }
            }
        } else {
            Namespace::Content(ContentAddress::from_hex(first)?)
        };

        Ok(Self {
            root,
            segments: parts.map(str::to_string).collect(),
        })
    }

    /// A content path with no segments.
    pub fn from_address(address: ContentAddress) -> Self {
        Self {
            root: Namespace::Content(address),
            segments: Vec::new(),
        }
    }

    pub fn root(&self) -> &Namespace {
        &self.root
    }

    /// The link names following the root.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Append a link name.
    pub fn join(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            Namespace::Content(addr) => write!(f, "/ipfs/{addr}")?,
            Namespace::Name(name) => write!(f, "/ipns/{name}")?,
        }
        for seg in &self.segments {
            write!(f, "/{seg}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Path {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::HashAlgorithm;

    fn addr() -> ContentAddress {
        ContentAddress::new(HashAlgorithm::Blake3, vec![0x11; 32]).unwrap()
    }

    #[test]
    fn parse_content_path() {
        let p = Path::parse(&format!("/ipfs/{}/a/b", addr())).unwrap();
        assert_eq!(p.root(), &Namespace::Content(addr()));
        assert_eq!(p.segments(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn bare_address_equals_ipfs() {
        let bare = Path::parse(&format!("{}/x", addr())).unwrap();
        let full = Path::parse(&format!("/ipfs/{}/x", addr())).unwrap();
        assert_eq!(bare, full);
    }

    #[test]
    fn parse_name_path() {
        let p = Path::parse("/ipns/example/docs").unwrap();
        assert_eq!(p.root(), &Namespace::Name("example".into()));
        assert_eq!(p.segments(), &["docs".to_string()]);
    }

    #[test]
    fn empty_segments_dropped() {
        let p = Path::parse(&format!("/ipfs/{}//x/", addr())).unwrap();
        assert_eq!(p.segments(), &["x".to_string()]);
    }

    #[test]
    fn rejects_bad_paths() {
        assert!(Path::parse("").is_err());
        assert!(Path::parse("/ipfs").is_err());
        assert!(Path::parse("/foo/bar").is_err());
        assert!(Path::parse("/ipfs/nothex").is_err());
        assert!(Path::parse("nothex/a").is_err());
    }

    #[test]
    fn display_roundtrip() {
        let p = Path::from_address(addr()).join("a").join("b");
        assert_eq!(Path::parse(&p.to_string()).unwrap(), p);
    }
}
