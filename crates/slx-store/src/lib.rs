//! # slx-store — Two-Tier Key-Value Storage Substrate
//!
//! The storage collaborator interface the ledger core is written against:
//! a key-value space with two visibility tiers — a **shared** space
//! readable by all participating organizations, and per-organization
//! **private** spaces readable only by that organization's members.
//!
//! The core issues only the primitive operations defined here: point
//! get/put/delete, prefix range scan, and version history. Commit
//! ordering, consensus, and gossip belong to the substrate behind this
//! trait and are out of scope.
//!
//! ## Markers
//!
//! Existence-only values (license commitments, handshake request markers)
//! are modeled as presence/absence of a key, never as a sentinel byte
//! value. [`MARKER`] is the canonical empty value for such keys.
//!
//! ## Implementations
//!
//! [`MemStore`] is the in-memory reference implementation used by tests
//! and simulation; it records full version history on every mutation.

pub mod memory;

use serde::{de::DeserializeOwned, Serialize};

use slx_core::{LedgerDateTime, LedgerError, OrgId, TxId};

pub use memory::MemStore;

/// The canonical value for existence-only keys.
pub const MARKER: &[u8] = &[];

/// A visibility tier of the ledger key space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Space {
    /// Readable by every participating organization.
    Shared,
    /// Readable only by members of one organization.
    Private(OrgId),
}

impl std::fmt::Display for Space {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shared => f.write_str("shared"),
            Self::Private(org) => write!(f, "private:{org}"),
        }
    }
}

/// Transaction stamp applied to every mutation, for version history.
#[derive(Debug, Clone)]
pub struct TxStamp {
    /// The enclosing transaction's unique id.
    pub tx_id: TxId,
    /// The enclosing transaction's timestamp.
    pub timestamp: LedgerDateTime,
}

/// One entry in a key's version history, oldest first.
#[derive(Debug, Clone)]
pub struct KeyVersion {
    /// The transaction that wrote this version.
    pub tx_id: TxId,
    /// When the transaction was stamped.
    pub timestamp: LedgerDateTime,
    /// The value written, or `None` for a deletion.
    pub value: Option<Vec<u8>>,
}

/// The storage substrate the ledger core operates through.
///
/// Each core operation executes as a single all-or-nothing transaction;
/// the substrate serializes concurrent transactions from different
/// organizations and detects read-write conflicts. Implementations only
/// need to provide the primitives — no locking beyond that.
pub trait LedgerStore {
    /// Point read. `None` if the key is absent from the space.
    fn get(&self, space: &Space, key: &str) -> Option<Vec<u8>>;

    /// Point write, creating or overwriting the key.
    fn put(&mut self, space: &Space, key: &str, value: &[u8], stamp: &TxStamp);

    /// Point delete. Deleting an absent key is a no-op.
    fn delete(&mut self, space: &Space, key: &str, stamp: &TxStamp);

    /// All present `(key, value)` pairs under `prefix`, in key order.
    fn scan_prefix(&self, space: &Space, prefix: &str) -> Vec<(String, Vec<u8>)>;

    /// Ordered version history of a key, oldest first. Empty if the key
    /// was never written in this space.
    fn history(&self, space: &Space, key: &str) -> Vec<KeyVersion>;

    /// Whether the key is present — the read side of the marker model.
    fn exists(&self, space: &Space, key: &str) -> bool {
        self.get(space, key).is_some()
    }
}

/// Encode a record for storage.
pub fn encode<T: Serialize>(key: &str, record: &T) -> Result<Vec<u8>, LedgerError> {
    serde_json::to_vec(record).map_err(|e| LedgerError::Codec {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Decode a stored record.
pub fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, LedgerError> {
    serde_json::from_slice(bytes).map_err(|e| LedgerError::Codec {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
