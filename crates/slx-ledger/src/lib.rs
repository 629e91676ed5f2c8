//! # slx-ledger — License Commitments and the Cross-Organization Handshake
//!
//! The core of the Shared License Exchange: the logic that decides what is
//! globally provable versus privately held, and that coordinates the
//! two-party handshake (issuing organization ⇄ consuming organization) so
//! a license is never double-leased, silently lost, or left inconsistent
//! when either party completes only half a transaction.
//!
//! ## Components
//!
//! - [`AssetRegistry`](asset::AssetRegistry) — owns Asset and License
//!   entities in the issuer's private partition and publishes/retracts
//!   their existence commitments on the shared tier.
//! - [`OrderLedger`](order::OrderLedger) — owns the Order entity and its
//!   status state machine, scoped per (account, order-id).
//! - [`AllocationCoordinator`](allocation::AllocationCoordinator) —
//!   executes the allocate/deallocate handshake using single-use request
//!   markers: at most one in-flight request per (order, action).
//! - [`AuditTrail`](audit::AuditTrail) — read-only projection over a
//!   commitment's version history.
//!
//! ## Concurrency model
//!
//! Each operation executes as a single all-or-nothing ledger transaction;
//! concurrency arises only from independent transactions serialized by the
//! substrate. Every operation therefore validates all of its preconditions
//! before its first write, and the request markers are the only
//! cross-partition synchronization signal — state is never inferred from
//! the other organization's partial writes.

pub mod allocation;
pub mod asset;
pub mod audit;
pub mod context;
pub mod order;

pub use allocation::{AllocationCoordinator, LeaseRecord, LicensesRequest};
pub use asset::{
    Allocated, Asset, AssetDetail, AssetRegistry, AssetSummary, License, LicenseSeed,
    LicenseWithExpiration,
};
pub use audit::AuditTrail;
pub use context::TxContext;
pub use order::{Order, OrderLedger, OrderStatus, QuoteRequest};
