//! # Addresses
//!
//! Holders, spenders, receivers and vaults are all identified by an opaque
//! [`Address`]. Authentication is the host's job; by the time an address
//! reaches the vault it is taken at face value.
//!
//! Vault addresses are content-addressed: `BLAKE3(domain || 0x00 || part ||
//! 0x00 || part ...)`, truncated to 20 bytes and hex encoded. The same vault
//! parameters always produce the same address.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An account identifier on the asset or share ledger.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wraps an arbitrary identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives a deterministic address from a domain tag and ordered parts.
    ///
    /// The separator bytes prevent ambiguity when one part's suffix matches
    /// the next part's prefix.
    pub fn derive(domain: &str, parts: &[&str]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain.as_bytes());
        for part in parts {
            hasher.update(&[0x00]);
            hasher.update(part.as_bytes());
        }
        let digest = hasher.finalize();
        Self(format!("0x{}", hex::encode(&digest.as_bytes()[..20])))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Address {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
