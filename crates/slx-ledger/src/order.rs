//! # Order Ledger
//!
//! Owns the Order entity and its status state machine, scoped per
//! (account, order-id). An order walks
//! `QUOTE_REQUESTED → QUOTE_RECEIVED → INITIATED → APPROVED | DENIED`,
//! reaches `ALLOCATED` through the allocation handshake, and leaves it
//! through `RETURN_INITIATED → DEALLOCATED`. A renewal track mirrors the
//! primary one (`RENEWAL_*`) and is re-entered by quoting against an
//! already-allocated order; orders under renewal are never treated as
//! asking for new license availability.
//!
//! Orders are never physically deleted — they are retained for audit and
//! for the expiration sweep.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use slx_authz::{Action, AuthorizationGate};
use slx_core::{keys, AssetId, LedgerDateTime, LedgerError, LicenseId, OrderId, OrgId};
use slx_store::{LedgerStore, Space, TxStamp};

use crate::allocation::LicensesRequest;
use crate::asset::{available_licenses, load_asset};
use crate::context::TxContext;

// ─── Status ──────────────────────────────────────────────────────────

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Consumer requested a quote.
    QuoteRequested,
    /// Issuer sent a price.
    QuoteReceived,
    /// Consumer initiated the order at the quoted price.
    Initiated,
    /// Consumer's acquisition officer approved.
    Approved,
    /// Consumer's acquisition officer denied (terminal).
    Denied,
    /// Licenses are leased under this order.
    Allocated,
    /// Renewal quote requested against an allocated order.
    RenewalQuoteRequested,
    /// Issuer priced the renewal.
    RenewalQuoteReceived,
    /// Renewal initiated.
    RenewalInitiated,
    /// Renewal approved.
    RenewalApproved,
    /// Renewal denied; the existing lease stands.
    RenewalDenied,
    /// A return request is open for this order.
    ReturnInitiated,
    /// Every license has been returned (terminal).
    Deallocated,
}

impl OrderStatus {
    /// Whether this status is on the renewal track.
    pub fn is_renewal(&self) -> bool {
        matches!(
            self,
            Self::RenewalQuoteRequested
                | Self::RenewalQuoteReceived
                | Self::RenewalInitiated
                | Self::RenewalApproved
                | Self::RenewalDenied
        )
    }

    /// Whether an order in this status currently holds leased licenses —
    /// the statuses the expiration sweep considers.
    pub fn counts_as_allocated(&self) -> bool {
        matches!(self, Self::Allocated | Self::ReturnInitiated) || self.is_renewal()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::QuoteRequested => "QUOTE_REQUESTED",
            Self::QuoteReceived => "QUOTE_RECEIVED",
            Self::Initiated => "INITIATED",
            Self::Approved => "APPROVED",
            Self::Denied => "DENIED",
            Self::Allocated => "ALLOCATED",
            Self::RenewalQuoteRequested => "RENEWAL_QUOTE_REQUESTED",
            Self::RenewalQuoteReceived => "RENEWAL_QUOTE_RECEIVED",
            Self::RenewalInitiated => "RENEWAL_INITIATED",
            Self::RenewalApproved => "RENEWAL_APPROVED",
            Self::RenewalDenied => "RENEWAL_DENIED",
            Self::ReturnInitiated => "RETURN_INITIATED",
            Self::Deallocated => "DEALLOCATED",
        };
        f.write_str(s)
    }
}

// ─── Entity ──────────────────────────────────────────────────────────

/// A license order, private to the issuer's partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Identifier, scoped per account.
    pub id: OrderId,
    /// The consuming organization.
    pub account: OrgId,
    /// The asset being ordered.
    pub asset_id: AssetId,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Number of licenses requested.
    pub amount: u32,
    /// Lease duration in years.
    pub duration: u32,
    /// Quoted price in whole currency units; unset until a quote is sent.
    pub price: Option<u64>,
    /// Amount approved by the consumer's acquisition officer.
    pub approved_amount: u32,
    /// Amount currently leased under this order.
    pub allocated_amount: u32,
    /// Lease expiration, set when licenses are sent.
    pub expiration: Option<LedgerDateTime>,
    /// Licenses currently leased under this order.
    pub licenses: Vec<LicenseId>,
}

/// Payload of a quote request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    /// The requesting account.
    pub account: OrgId,
    /// The asset to lease.
    pub asset_id: AssetId,
    /// Number of licenses wanted.
    pub amount: u32,
    /// Lease duration in years.
    pub duration: u32,
    /// Existing order to renew; absent for a fresh order.
    pub order_id: Option<OrderId>,
}

// ─── Ledger ──────────────────────────────────────────────────────────

/// Operations on orders and their lifecycle.
pub struct OrderLedger<'a> {
    issuer: OrgId,
    store: &'a mut dyn LedgerStore,
    gate: &'a dyn AuthorizationGate,
}

impl<'a> OrderLedger<'a> {
    /// Build an order ledger over the issuer's partition.
    pub fn new(
        store: &'a mut dyn LedgerStore,
        gate: &'a dyn AuthorizationGate,
        issuer: OrgId,
    ) -> Self {
        Self {
            issuer,
            store,
            gate,
        }
    }

    /// Request a quote, creating the order or re-entering an existing one
    /// on the renewal track.
    ///
    /// Requires the asset to exist. A fresh order starts in
    /// `QUOTE_REQUESTED` with its id assigned from the transaction id; an
    /// existing order that currently holds licenses re-enters as
    /// `RENEWAL_QUOTE_REQUESTED`, keeping its previous price on record.
    pub fn get_quote(
        &mut self,
        ctx: &TxContext,
        req: &QuoteRequest,
    ) -> Result<OrderId, LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::InitiateOrder, Some(&req.account))?;

        load_asset(self.store, &self.issuer, &req.asset_id)?;

        if let Some(order_id) = &req.order_id {
            if let Ok(mut order) = load_order(self.store, &self.issuer, &req.account, order_id) {
                if order.status.counts_as_allocated() {
                    order.status = OrderStatus::RenewalQuoteRequested;
                    order.amount = req.amount;
                    order.duration = req.duration;
                    store_order(self.store, &self.issuer, &order, &ctx.stamp())?;
                    info!(order = %order_id, account = %req.account, "renewal quote requested");
                    return Ok(order_id.clone());
                }
            }
        }

        let order_id = req
            .order_id
            .clone()
            .unwrap_or_else(|| OrderId(ctx.tx_id.to_string()));
        let order = Order {
            id: order_id.clone(),
            account: req.account.clone(),
            asset_id: req.asset_id.clone(),
            status: OrderStatus::QuoteRequested,
            amount: req.amount,
            duration: req.duration,
            price: None,
            approved_amount: 0,
            allocated_amount: 0,
            expiration: None,
            licenses: Vec::new(),
        };
        store_order(self.store, &self.issuer, &order, &ctx.stamp())?;
        info!(order = %order_id, account = %req.account, "quote requested");
        Ok(order_id)
    }

    /// Record the issuer's price for a requested quote.
    pub fn send_quote(
        &mut self,
        ctx: &TxContext,
        order_id: &OrderId,
        account: &OrgId,
        price: u64,
    ) -> Result<(), LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::AllocateLicense, None)?;

        let mut order = load_order(self.store, &self.issuer, account, order_id)?;
        order.status = match order.status {
            OrderStatus::QuoteRequested => OrderStatus::QuoteReceived,
            OrderStatus::RenewalQuoteRequested => OrderStatus::RenewalQuoteReceived,
            _ => {
                return Err(LedgerError::QuoteNotRequested {
                    order_id: order_id.clone(),
                })
            }
        };
        order.price = Some(price);
        store_order(self.store, &self.issuer, &order, &ctx.stamp())?;
        info!(order = %order_id, price, "quote sent");
        Ok(())
    }

    /// Initiate the order at the quoted price.
    pub fn initiate_order(
        &mut self,
        ctx: &TxContext,
        order_id: &OrderId,
        account: &OrgId,
    ) -> Result<(), LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::InitiateOrder, Some(account))?;

        let mut order = load_order(self.store, &self.issuer, account, order_id)?;
        order.status = match (order.status, order.price) {
            (OrderStatus::QuoteReceived, Some(_)) => OrderStatus::Initiated,
            (OrderStatus::RenewalQuoteReceived, Some(_)) => OrderStatus::RenewalInitiated,
            _ => {
                return Err(LedgerError::QuoteNotReceived {
                    order_id: order_id.clone(),
                })
            }
        };
        store_order(self.store, &self.issuer, &order, &ctx.stamp())?;
        info!(order = %order_id, "order initiated");
        Ok(())
    }

    /// Approve an initiated order, recording the approved amount.
    pub fn approve_order(
        &mut self,
        ctx: &TxContext,
        order_id: &OrderId,
        account: &OrgId,
    ) -> Result<(), LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::ApproveOrder, Some(account))?;

        let mut order = load_order(self.store, &self.issuer, account, order_id)?;
        order.status = match order.status {
            OrderStatus::Initiated => OrderStatus::Approved,
            OrderStatus::RenewalInitiated => OrderStatus::RenewalApproved,
            _ => {
                return Err(LedgerError::NotUpForApproval {
                    order_id: order_id.clone(),
                })
            }
        };
        order.approved_amount = order.amount;
        order.expiration = Some(ctx.timestamp.plus_years(order.duration));
        store_order(self.store, &self.issuer, &order, &ctx.stamp())?;
        info!(order = %order_id, amount = order.approved_amount, "order approved");
        Ok(())
    }

    /// Deny an initiated order.
    pub fn deny_order(
        &mut self,
        ctx: &TxContext,
        order_id: &OrderId,
        account: &OrgId,
    ) -> Result<(), LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::ApproveOrder, Some(account))?;

        let mut order = load_order(self.store, &self.issuer, account, order_id)?;
        order.status = match order.status {
            OrderStatus::Initiated => OrderStatus::Denied,
            OrderStatus::RenewalInitiated => OrderStatus::RenewalDenied,
            _ => {
                return Err(LedgerError::NotUpForApproval {
                    order_id: order_id.clone(),
                })
            }
        };
        store_order(self.store, &self.issuer, &order, &ctx.stamp())?;
        info!(order = %order_id, "order denied");
        Ok(())
    }

    /// Select candidate licenses for an approved order.
    ///
    /// Selection only — nothing is marked allocated here. Orders under
    /// renewal are refused: they already hold their licenses and must not
    /// be treated as asking for new availability.
    pub fn get_licenses_to_allocate_for_order(
        &mut self,
        ctx: &TxContext,
        order_id: &OrderId,
        account: &OrgId,
    ) -> Result<LicensesRequest, LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::AllocateLicense, None)?;

        let order = load_order(self.store, &self.issuer, account, order_id)?;
        if order.status.is_renewal() {
            return Err(LedgerError::OrderUnderRenewal);
        }
        if order.status != OrderStatus::Approved {
            return Err(LedgerError::SelectionNotApproved);
        }

        let available = available_licenses(self.store, &self.issuer, &order.asset_id)?;
        if available.len() < order.approved_amount as usize {
            return Err(LedgerError::NotEnoughLicenses {
                order_id: order_id.clone(),
            });
        }

        let licenses = available
            .into_iter()
            .take(order.approved_amount as usize)
            .map(|l| l.id)
            .collect();
        debug!(order = %order_id, "candidate licenses selected");
        Ok(LicensesRequest {
            account: order.account,
            order_id: order.id,
            asset_id: order.asset_id,
            expiration: ctx.timestamp.plus_years(order.duration),
            licenses,
        })
    }

    /// Orders whose lease expired strictly before the transaction time.
    ///
    /// Only statuses that currently hold licenses are considered, and
    /// each order is included only if the caller may read it — the issuer
    /// sees every account, a consumer sees its own. Deallocation remains
    /// a separate, explicit operation.
    pub fn get_expired_orders(&self, ctx: &TxContext) -> Result<Vec<Order>, LedgerError> {
        let mut expired = Vec::new();
        for (key, bytes) in self
            .store
            .scan_prefix(&Space::Private(self.issuer.clone()), keys::ORDER_PREFIX)
        {
            let order: Order = slx_store::decode(&key, &bytes)?;
            if !order.status.counts_as_allocated() {
                continue;
            }
            let Some(expiration) = order.expiration else {
                continue;
            };
            if expiration >= ctx.timestamp {
                continue;
            }
            if self
                .gate
                .can_perform(&ctx.caller, Action::ReadOrder, Some(&order.account))
                .is_ok()
            {
                expired.push(order);
            }
        }
        debug!(expired = expired.len(), "expiration sweep");
        Ok(expired)
    }

    /// Read one order.
    pub fn get_order(
        &self,
        ctx: &TxContext,
        order_id: &OrderId,
        account: &OrgId,
    ) -> Result<Order, LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::ReadOrder, Some(account))?;
        load_order(self.store, &self.issuer, account, order_id)
    }

    /// All orders of one account.
    pub fn get_orders_by_account(
        &self,
        ctx: &TxContext,
        account: &OrgId,
    ) -> Result<Vec<Order>, LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::ReadOrder, Some(account))?;
        let mut orders = Vec::new();
        for (key, bytes) in self
            .store
            .scan_prefix(&Space::Private(self.issuer.clone()), &keys::order_prefix(account))
        {
            orders.push(slx_store::decode(&key, &bytes)?);
        }
        Ok(orders)
    }

    /// All orders for one asset across every account (issuer view).
    pub fn get_orders_by_asset(
        &self,
        ctx: &TxContext,
        asset_id: &AssetId,
    ) -> Result<Vec<Order>, LedgerError> {
        self.gate.can_perform(&ctx.caller, Action::ReadOrder, None)?;
        let mut orders = Vec::new();
        for (key, bytes) in self
            .store
            .scan_prefix(&Space::Private(self.issuer.clone()), keys::ORDER_PREFIX)
        {
            let order: Order = slx_store::decode(&key, &bytes)?;
            if order.asset_id == *asset_id {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    /// One account's orders for one asset.
    pub fn get_orders_by_account_and_asset(
        &self,
        ctx: &TxContext,
        account: &OrgId,
        asset_id: &AssetId,
    ) -> Result<Vec<Order>, LedgerError> {
        Ok(self
            .get_orders_by_account(ctx, account)?
            .into_iter()
            .filter(|o| o.asset_id == *asset_id)
            .collect())
    }
}

// ─── Shared record access ────────────────────────────────────────────

pub(crate) fn load_order(
    store: &dyn LedgerStore,
    issuer: &OrgId,
    account: &OrgId,
    order_id: &OrderId,
) -> Result<Order, LedgerError> {
    let key = keys::order_key(account, order_id);
    let bytes = store
        .get(&Space::Private(issuer.clone()), &key)
        .ok_or_else(|| LedgerError::OrderNotFound {
            order_id: order_id.clone(),
            account: account.clone(),
        })?;
    slx_store::decode(&key, &bytes)
}

pub(crate) fn store_order(
    store: &mut dyn LedgerStore,
    issuer: &OrgId,
    order: &Order,
    stamp: &TxStamp,
) -> Result<(), LedgerError> {
    let key = keys::order_key(&order.account, &order.id);
    let bytes = slx_store::encode(&key, order)?;
    store.put(&Space::Private(issuer.clone()), &key, &bytes, stamp);
    Ok(())
}
