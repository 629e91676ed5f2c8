//! # Transaction Context
//!
//! The identity/time collaborator: the enclosing transaction's unique id,
//! its timestamp, and the authenticated caller. Supplied externally per
//! operation; the core never reads a wall clock of its own.

use slx_authz::Requestor;
use slx_core::{LedgerDateTime, TxId};
use slx_store::TxStamp;

/// Per-transaction context stamped onto every mutation.
#[derive(Debug, Clone)]
pub struct TxContext {
    /// The enclosing transaction's unique id. Asset and order ids are
    /// assigned from it, making an entity and its creating transaction
    /// auditable together.
    pub tx_id: TxId,
    /// The transaction's timestamp; also the "now" used for expiration
    /// comparisons.
    pub timestamp: LedgerDateTime,
    /// The authenticated caller, derived externally from the credential.
    pub caller: Requestor,
}

impl TxContext {
    /// Build a context for one transaction.
    pub fn new(tx_id: TxId, timestamp: LedgerDateTime, caller: Requestor) -> Self {
        Self {
            tx_id,
            timestamp,
            caller,
        }
    }

    /// The stamp applied to mutations made in this transaction.
    pub fn stamp(&self) -> TxStamp {
        TxStamp {
            tx_id: self.tx_id.clone(),
            timestamp: self.timestamp,
        }
    }
}
