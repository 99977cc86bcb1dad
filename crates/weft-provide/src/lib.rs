//! Provider announcements for weft.
//!
//! A peer that holds a block says so by putting a [`ProviderRecord`] into a
//! record store under [`provider_key`]. The record is a signed claim; readers
//! keep only the claims that verify, name the right block and have not
//! expired, and collapse repeated announcements from the same peer.
//!
//! [`RecordRouting`] exposes this as the exchange's
//! [`ContentRouting`](weft_exchange::ContentRouting) capability.
//!
//! # Design Rules
//!
//! 1. A provider id is valid only if it is the hash of the signing key.
//! 2. Bad announcements are dropped while reading, never raised.

pub mod provide;
pub mod record;
pub mod routing;

pub use provide::{find_providers, find_providers_with, provide, provider_key, provider_validator, PROVIDERS_NAMESPACE};
pub use record::{ProviderClaim, ProviderRecord, ProviderValidator, DEFAULT_PROVIDER_TTL};
pub use routing::RecordRouting;
