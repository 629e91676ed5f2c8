//! # Domain Identity Newtypes
//!
//! Newtype wrappers for all domain identifiers in SLX. These prevent
//! accidental identifier confusion — you cannot pass a `LicenseId` where
//! an `OrderId` is expected.
//!
//! Asset and order identifiers are assigned from the enclosing
//! transaction's unique id, so the entity and its earliest transaction
//! are auditable together. License identifiers and salts are chosen by
//! the issuing organization and never leave its private partition.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a leasable asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub String);

/// Identifier for one leasable license unit of an asset.
///
/// The plaintext id is stored only in the issuing organization's private
/// partition; other organizations see only the existence commitment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LicenseId(pub String);

/// Unique identifier for a license order, scoped per account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub String);

/// Identifier for a participating organization (an account).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrgId(pub String);

/// Unique identifier of a ledger transaction, supplied by the
/// transaction-ordering collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub Uuid);

/// Per-license random value used only to derive the public existence
/// commitment. Stored exclusively in the issuer's private partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Salt(pub String);

impl AssetId {
    /// Access the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl LicenseId {
    /// Access the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl OrderId {
    /// Access the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl OrgId {
    /// Access the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TxId {
    /// Generate a new random transaction identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TxId {
    fn default() -> Self {
        Self::new()
    }
}

impl Salt {
    /// Generate a fresh random salt (32 bytes, lowercase hex).
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Access the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for LicenseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for OrgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for LicenseId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for OrgId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for Salt {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
