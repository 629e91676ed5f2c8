//! # Commitment Codec — Key and Commitment Derivation
//!
//! Pure, stateless derivations for every storage key and for the public
//! existence commitment. All three ledger components derive keys through
//! this module, so the key space has exactly one authority.
//!
//! ## Conventions
//!
//! - Every private-partition key is `prefix:part:...:part` with `:` as the
//!   field separator. Identifiers never contain the separator-free
//!   ambiguity of raw concatenation, so distinct inputs cannot collide.
//! - Each keyed family has a prefix form (`...:` with a trailing
//!   separator) so that enumerating a family is a prefix range scan.
//! - The commitment is a SHA-256 digest over the `:`-joined
//!   salt/asset/license fields, rendered as lowercase hex. Its presence on
//!   the shared tier proves the license exists without revealing the
//!   identifiers or the salt.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::identity::{AssetId, LicenseId, OrderId, OrgId, Salt};

/// The two kinds of cross-organization handshake request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestAction {
    /// A request to lease licenses to an account.
    Allocate,
    /// A request to return leased licenses to the issuer.
    Deallocate,
}

impl RequestAction {
    /// Key-segment identifier for this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allocate => "ALLOCATE",
            Self::Deallocate => "DEALLOCATE",
        }
    }
}

impl std::fmt::Display for RequestAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Private-partition key for an asset record.
pub fn asset_key(asset_id: &AssetId) -> String {
    format!("asset:{asset_id}")
}

/// Prefix covering every asset record.
pub const ASSET_PREFIX: &str = "asset:";

/// Private-partition key for a license record.
pub fn license_key(asset_id: &AssetId, license_id: &LicenseId) -> String {
    format!("license:{asset_id}:{license_id}")
}

/// Prefix covering every license record of one asset.
pub fn license_prefix(asset_id: &AssetId) -> String {
    format!("license:{asset_id}:")
}

/// Shared-tier key for a license's existence commitment:
/// `hex(sha256(salt ':' assetId ':' licenseId))`.
///
/// One-way by construction — recovering the salt or the identifiers from
/// the key requires inverting SHA-256.
pub fn commitment(asset_id: &AssetId, license_id: &LicenseId, salt: &Salt) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(asset_id.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(license_id.as_str().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Private-partition key for an order record.
pub fn order_key(account: &OrgId, order_id: &OrderId) -> String {
    format!("order:{account}:{order_id}")
}

/// Prefix covering every order of one account.
pub fn order_prefix(account: &OrgId) -> String {
    format!("order:{account}:")
}

/// Prefix covering every order record.
pub const ORDER_PREFIX: &str = "order:";

/// Key for a handshake request marker.
///
/// Presence of this key on the shared tier means a request of `action`'s
/// kind is currently open for the order. The staged request content is
/// held in the issuer's private partition under the same key.
pub fn allocation_request_key(action: RequestAction, order_id: &OrderId) -> String {
    format!("request:{action}:{order_id}")
}

/// Consumer-partition key for an active lease record.
pub fn allocated_license_key(order_id: &OrderId, license_id: &LicenseId) -> String {
    format!("allocated:{order_id}:{license_id}")
}

/// Prefix covering every lease record of one order in a consumer partition.
pub fn allocated_license_prefix(order_id: &OrderId) -> String {
    format!("allocated:{order_id}:")
}

/// Consumer-partition key for a software identification (SWID) tag.
///
/// The SWID store itself is an external collaborator; only the key
/// derivation lives here so all scans share one convention.
pub fn swid_key(order_id: &OrderId, license_id: &LicenseId) -> String {
    format!("swid:{order_id}:{license_id}")
}
