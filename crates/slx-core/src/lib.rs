//! # slx-core — Foundational Types for the Shared License Exchange
//!
//! This crate is the bedrock of SLX. It defines the type-system primitives
//! shared by every other crate in the workspace; it depends on nothing
//! internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `AssetId`, `LicenseId`,
//!    `OrderId`, `OrgId`, `TxId`, `Salt` — all newtypes. No bare strings
//!    for identifiers.
//!
//! 2. **One key codec.** Every storage key and every existence commitment
//!    is derived through `keys`. The derivations are pure, deterministic,
//!    and injective — distinct inputs never produce the same key.
//!
//! 3. **UTC-only wall-clock dates.** `LedgerDateTime` enforces the
//!    `YYYY-MM-DD HH:MM:SS` wire format at construction; there is no
//!    silent timezone conversion.
//!
//! 4. **Structured errors.** One `LedgerError` enum, one variant per
//!    failure condition, with a `kind()` projection onto the
//!    validation/not-found/conflict/authorization taxonomy.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `slx-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod keys;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use error::{ErrorKind, LedgerError};
pub use identity::{AssetId, LicenseId, OrderId, OrgId, Salt, TxId};
pub use keys::RequestAction;
pub use temporal::LedgerDateTime;
