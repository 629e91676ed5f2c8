//! # Error Types — Structured Error Hierarchy
//!
//! One variant per failure condition, with the exact operator-facing
//! message for that condition. All errors use `thiserror` for derive-based
//! `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Errors are surfaced synchronously to the caller and never retried
//!   inside the core; any retry policy belongs to the external caller.
//! - Every error aborts the enclosing ledger transaction, so a failed
//!   operation leaves no partial state.
//! - [`LedgerError::kind()`] projects each variant onto the coarse
//!   taxonomy callers dispatch on.

use thiserror::Error;

use crate::identity::{AssetId, LicenseId, OrderId, OrgId};

/// Coarse classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed date or request payload.
    Validation,
    /// Asset, license, order, or request marker absent.
    NotFound,
    /// Duplicate identifier, already-allocated license, already-open
    /// marker, ineligible status, or mismatched request content.
    Conflict,
    /// Authorization gate denial.
    Authorization,
    /// Record encode/decode failure in the storage substrate.
    Storage,
}

/// Top-level error type for the Shared License Exchange.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A date string did not match the `YYYY-MM-DD HH:MM:SS` wire format.
    #[error("invalid date {value:?}: {reason}")]
    InvalidDate {
        /// The rejected input.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// No asset record exists under the given id.
    #[error("asset {asset_id} does not exist")]
    AssetNotFound {
        /// The missing asset.
        asset_id: AssetId,
    },

    /// No license record exists under the given id.
    #[error("license {license_id} does not exist")]
    LicenseNotFound {
        /// The missing license.
        license_id: LicenseId,
    },

    /// A license with this id already has a private record for the asset.
    #[error("license {license_id} already exists")]
    LicenseExists {
        /// The duplicate license.
        license_id: LicenseId,
    },

    /// The license cannot be removed while leased.
    #[error("license {license_id} is allocated to {account}")]
    LicenseAllocated {
        /// The leased license.
        license_id: LicenseId,
        /// The current lessee.
        account: OrgId,
    },

    /// The license cannot be staged for allocation twice.
    #[error("license {license_id} is already allocated")]
    LicenseAlreadyAllocated {
        /// The leased license.
        license_id: LicenseId,
    },

    /// The account's partition holds no active lease for this license.
    #[error("license {license_id} is not leased by {account}")]
    LicenseNotLeased {
        /// The license named in the return request.
        license_id: LicenseId,
        /// The account claiming the lease.
        account: OrgId,
    },

    /// An allocation request named the same license more than once.
    #[error("duplicate licenses are not allowed")]
    DuplicateLicenses,

    /// No order exists for the (account, order-id) pair.
    #[error("order with ID {order_id} and account {account} does not exist")]
    OrderNotFound {
        /// The missing order.
        order_id: OrderId,
        /// The account scope it was looked up under.
        account: OrgId,
    },

    /// The order is not awaiting a quote.
    #[error("a quote request for order {order_id} does not exist")]
    QuoteNotRequested {
        /// The order in the wrong status.
        order_id: OrderId,
    },

    /// The order cannot be initiated before a quote is recorded.
    #[error("order {order_id} has not received a quote")]
    QuoteNotReceived {
        /// The order in the wrong status.
        order_id: OrderId,
    },

    /// The order is not in the initiated status approval acts on.
    #[error("order {order_id} is not up for approval")]
    NotUpForApproval {
        /// The order in the wrong status.
        order_id: OrderId,
    },

    /// Candidate selection is not defined for orders under renewal.
    #[error("cannot get licenses to allocate for an order that is being renewed")]
    OrderUnderRenewal,

    /// Candidate selection requires an approved order.
    #[error("cannot get licenses to allocate for an order that has not been approved")]
    SelectionNotApproved,

    /// Allocation staging requires an approved order.
    #[error("cannot allocate licenses for an order that has not been approved")]
    AllocationNotApproved,

    /// Fewer unallocated licenses exist than the order was approved for.
    #[error("not enough available licenses to complete order {order_id}")]
    NotEnoughLicenses {
        /// The order that cannot be filled.
        order_id: OrderId,
    },

    /// The staged license set differs in size from the approved amount.
    #[error("provided licenses do not match the approved amount for order {order_id}")]
    ApprovedAmountMismatch {
        /// The order whose approval bounds the request.
        order_id: OrderId,
    },

    /// An allocate request marker is already open for the order.
    #[error("a request to allocate licenses for order {order_id} is already active")]
    AllocateRequestActive {
        /// The order with the open marker.
        order_id: OrderId,
    },

    /// A deallocate request marker is already open for the order.
    #[error("a request to return licenses for order {order_id} is already active")]
    ReturnRequestActive {
        /// The order with the open marker.
        order_id: OrderId,
    },

    /// No allocate request marker is open for the order.
    #[error("no allocate request exists for order {order_id}")]
    NoAllocateRequest {
        /// The order without a marker.
        order_id: OrderId,
    },

    /// No deallocate request marker is open for the order.
    #[error("no deallocate request exists for order {order_id}")]
    NoDeallocateRequest {
        /// The order without a marker.
        order_id: OrderId,
    },

    /// The commit step named a different license set than was staged.
    #[error("provided licenses to send do not match the licenses allocated")]
    SendMismatch,

    /// The consumer-side return named a different request than was staged.
    #[error("provided deallocation request does not match the one initiated")]
    ReturnMismatch,

    /// The authorization gate denied the operation.
    #[error("caller from {org} is not authorized to {action}")]
    Unauthorized {
        /// The requesting organization.
        org: OrgId,
        /// Human-readable action name.
        action: String,
    },

    /// A stored record could not be encoded or decoded.
    #[error("storage codec error for key {key}: {reason}")]
    Codec {
        /// The key whose value failed to round-trip.
        key: String,
        /// Serializer diagnostic.
        reason: String,
    },
}

impl LedgerError {
    /// Project this error onto the coarse taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDate { .. } => ErrorKind::Validation,
            Self::AssetNotFound { .. }
            | Self::LicenseNotFound { .. }
            | Self::OrderNotFound { .. }
            | Self::NoAllocateRequest { .. }
            | Self::NoDeallocateRequest { .. } => ErrorKind::NotFound,
            Self::LicenseExists { .. }
            | Self::LicenseAllocated { .. }
            | Self::LicenseAlreadyAllocated { .. }
            | Self::LicenseNotLeased { .. }
            | Self::DuplicateLicenses
            | Self::QuoteNotRequested { .. }
            | Self::QuoteNotReceived { .. }
            | Self::NotUpForApproval { .. }
            | Self::OrderUnderRenewal
            | Self::SelectionNotApproved
            | Self::AllocationNotApproved
            | Self::NotEnoughLicenses { .. }
            | Self::ApprovedAmountMismatch { .. }
            | Self::AllocateRequestActive { .. }
            | Self::ReturnRequestActive { .. }
            | Self::SendMismatch
            | Self::ReturnMismatch => ErrorKind::Conflict,
            Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::Codec { .. } => ErrorKind::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_subject() {
        let e = LedgerError::LicenseNotFound {
            license_id: LicenseId::from("2"),
        };
        assert_eq!(e.to_string(), "license 2 does not exist");

        let e = LedgerError::LicenseAllocated {
            license_id: LicenseId::from("1"),
            account: OrgId::from("Org2"),
        };
        assert_eq!(e.to_string(), "license 1 is allocated to Org2");

        let e = LedgerError::OrderNotFound {
            order_id: OrderId::from("123"),
            account: OrgId::from("Org2"),
        };
        assert_eq!(
            e.to_string(),
            "order with ID 123 and account Org2 does not exist"
        );
    }

    #[test]
    fn test_handshake_messages() {
        let order_id = OrderId::from("123");
        assert_eq!(
            LedgerError::AllocateRequestActive {
                order_id: order_id.clone()
            }
            .to_string(),
            "a request to allocate licenses for order 123 is already active"
        );
        assert_eq!(
            LedgerError::NoDeallocateRequest { order_id }.to_string(),
            "no deallocate request exists for order 123"
        );
        assert_eq!(
            LedgerError::SendMismatch.to_string(),
            "provided licenses to send do not match the licenses allocated"
        );
    }

    #[test]
    fn test_kind_projection() {
        assert_eq!(
            LedgerError::InvalidDate {
                value: "x".into(),
                reason: "y".into()
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            LedgerError::AssetNotFound {
                asset_id: AssetId::from("a")
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(LedgerError::DuplicateLicenses.kind(), ErrorKind::Conflict);
        assert_eq!(
            LedgerError::Unauthorized {
                org: OrgId::from("Org1"),
                action: "WriteAsset".into()
            }
            .kind(),
            ErrorKind::Authorization
        );
    }
}
