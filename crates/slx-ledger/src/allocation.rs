//! # Allocation Coordinator
//!
//! Executes the two-phase allocate/deallocate handshake between the
//! issuing and consuming organizations. Each direction follows the same
//! shape: one side stages a request under a single-use marker, the other
//! side verifies the staged request matches what it was handed out of
//! band and commits, closing the marker. The marker is the only
//! cross-partition synchronization signal; at most one request per
//! (order, action) can be in flight.
//!
//! The shared tier carries only the marker's presence. The staged
//! request content, which names plaintext license ids, lives in the
//! issuer's private partition under the same key; publishing it would
//! let third parties link commitments to identifiers.
//!
//! Staging never mutates orders or licenses. All visible state changes
//! happen at commit, after every precondition has been checked.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use slx_authz::{Action, AuthorizationGate};
use slx_core::{keys, AssetId, LedgerDateTime, LedgerError, LicenseId, OrderId, OrgId, RequestAction};
use slx_store::{LedgerStore, Space, TxStamp, MARKER};

use crate::asset::{load_license, store_license, Allocated};
use crate::context::TxContext;
use crate::order::{load_order, store_order, OrderStatus};

/// A staged request to allocate or return a specific set of licenses.
///
/// Serialized as the marker value so the committing side can verify the
/// exact set it was handed matches what was staged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensesRequest {
    /// The consuming account.
    pub account: OrgId,
    /// The order being fulfilled or unwound.
    pub order_id: OrderId,
    /// The asset the licenses belong to.
    pub asset_id: AssetId,
    /// Lease expiration for the licenses in this request.
    pub expiration: LedgerDateTime,
    /// The exact license set.
    pub licenses: Vec<LicenseId>,
}

/// The consumer-side record of one leased license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// The leased license.
    pub license_id: LicenseId,
    /// When the lease ends.
    pub expiration: LedgerDateTime,
}

/// Operations of the allocate/deallocate handshake.
pub struct AllocationCoordinator<'a> {
    issuer: OrgId,
    store: &'a mut dyn LedgerStore,
    gate: &'a dyn AuthorizationGate,
}

impl<'a> AllocationCoordinator<'a> {
    /// Build a coordinator over the issuer's partition.
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

    /// Stage an allocate request for an approved order.
    ///
    /// Validates that the set matches the approved amount, holds no
    /// duplicates, and names only licenses that exist and carry no
    /// foreign lease, and that no allocate request is already open for
    /// the order. An order under renewal re-stages its own leased
    /// licenses; a lease held by any other (account, order) still
    /// rejects. Nothing but the marker is written; licenses and the
    /// order change only at [`send_licenses`].
    ///
    /// [`send_licenses`]: Self::send_licenses
    pub fn allocate_licenses(
        &mut self,
        ctx: &TxContext,
        req: &LicensesRequest,
    ) -> Result<(), LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::AllocateLicense, None)?;

        let order = load_order(self.store, &self.issuer, &req.account, &req.order_id)?;
        if !matches!(
            order.status,
            OrderStatus::Approved | OrderStatus::RenewalApproved
        ) {
            return Err(LedgerError::AllocationNotApproved);
        }
        if req.licenses.len() != order.approved_amount as usize {
            return Err(LedgerError::ApprovedAmountMismatch {
                order_id: req.order_id.clone(),
            });
        }

        let distinct: BTreeSet<&LicenseId> = req.licenses.iter().collect();
        if distinct.len() != req.licenses.len() {
            return Err(LedgerError::DuplicateLicenses);
        }

        let renewing = order.status == OrderStatus::RenewalApproved;
        for license_id in &req.licenses {
            let license = load_license(self.store, &self.issuer, &req.asset_id, license_id)?;
            if let Some(allocated) = &license.allocated {
                let own_lease = renewing
                    && allocated.account == req.account
                    && allocated.order_id == req.order_id;
                if !own_lease {
                    return Err(LedgerError::LicenseAlreadyAllocated {
                        license_id: license_id.clone(),
                    });
                }
            }
        }

        let marker_key = keys::allocation_request_key(RequestAction::Allocate, &req.order_id);
        if self.store.exists(&Space::Shared, &marker_key) {
            return Err(LedgerError::AllocateRequestActive {
                order_id: req.order_id.clone(),
            });
        }

        self.stage_request(&marker_key, req, &ctx.stamp())?;
        info!(order = %req.order_id, licenses = req.licenses.len(), "allocate request staged");
        Ok(())
    }

    /// Commit a staged allocate request.
    ///
    /// The provided set must match the staged one exactly. On commit the
    /// consumer's lease records are written into its partition, each
    /// license is marked allocated in the issuer's, the order flips to
    /// `ALLOCATED`, and the marker closes. For a renewal the same writes
    /// refresh the existing lease records with the new expiration.
    pub fn send_licenses(
        &mut self,
        ctx: &TxContext,
        req: &LicensesRequest,
    ) -> Result<(), LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::AllocateLicense, None)?;

        let staged = self.open_request(RequestAction::Allocate, &req.order_id)?;
        let staged = staged.ok_or_else(|| LedgerError::NoAllocateRequest {
            order_id: req.order_id.clone(),
        })?;

        if license_set(&req.licenses) != license_set(&staged.licenses) {
            return Err(LedgerError::SendMismatch);
        }

        let mut order = load_order(self.store, &self.issuer, &staged.account, &staged.order_id)?;

        let stamp = ctx.stamp();
        for license_id in &staged.licenses {
            let mut license =
                load_license(self.store, &self.issuer, &staged.asset_id, license_id)?;
            license.allocated = Some(Allocated {
                account: staged.account.clone(),
                order_id: staged.order_id.clone(),
                expiration: staged.expiration,
            });
            store_license(self.store, &self.issuer, &staged.asset_id, &license, &stamp)?;

            let lease_key = keys::allocated_license_key(&staged.order_id, license_id);
            let lease = LeaseRecord {
                license_id: license_id.clone(),
                expiration: staged.expiration,
            };
            let bytes = slx_store::encode(&lease_key, &lease)?;
            self.store.put(
                &Space::Private(staged.account.clone()),
                &lease_key,
                &bytes,
                &stamp,
            );
        }

        order.status = OrderStatus::Allocated;
        order.allocated_amount = staged.licenses.len() as u32;
        order.licenses = staged.licenses.clone();
        order.expiration = Some(staged.expiration);
        store_order(self.store, &self.issuer, &order, &stamp)?;

        self.close_request(RequestAction::Allocate, &staged.order_id, &stamp);
        info!(order = %staged.order_id, licenses = staged.licenses.len(), "licenses sent");
        Ok(())
    }

    /// Stage a return of some or all licenses leased under an order.
    ///
    /// Every named license must have a live lease record in the
    /// consumer's partition, and no return request may already be open
    /// for the order. The order flips to `RETURN_INITIATED`.
    pub fn initiate_return(
        &mut self,
        ctx: &TxContext,
        req: &LicensesRequest,
    ) -> Result<(), LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::ReturnLicense, Some(&req.account))?;

        let marker_key = keys::allocation_request_key(RequestAction::Deallocate, &req.order_id);
        if self.store.exists(&Space::Shared, &marker_key) {
            return Err(LedgerError::ReturnRequestActive {
                order_id: req.order_id.clone(),
            });
        }

        for license_id in &req.licenses {
            let lease_key = keys::allocated_license_key(&req.order_id, license_id);
            if !self
                .store
                .exists(&Space::Private(req.account.clone()), &lease_key)
            {
                return Err(LedgerError::LicenseNotLeased {
                    license_id: license_id.clone(),
                    account: req.account.clone(),
                });
            }
        }

        let mut order = load_order(self.store, &self.issuer, &req.account, &req.order_id)?;
        order.status = OrderStatus::ReturnInitiated;

        let stamp = ctx.stamp();
        self.stage_request(&marker_key, req, &stamp)?;
        store_order(self.store, &self.issuer, &order, &stamp)?;
        info!(order = %req.order_id, licenses = req.licenses.len(), "return initiated");
        Ok(())
    }

    /// Consumer half of a return: drop the lease records.
    ///
    /// The provided request must match the staged one exactly. The marker
    /// stays open; only the issuer half closes it.
    pub fn deallocate_licenses_from_account(
        &mut self,
        ctx: &TxContext,
        req: &LicensesRequest,
    ) -> Result<(), LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::ReturnLicense, Some(&req.account))?;

        let staged = self.open_request(RequestAction::Deallocate, &req.order_id)?;
        let staged = staged.ok_or_else(|| LedgerError::NoDeallocateRequest {
            order_id: req.order_id.clone(),
        })?;

        if *req != staged {
            return Err(LedgerError::ReturnMismatch);
        }

        let stamp = ctx.stamp();
        for license_id in &staged.licenses {
            let lease_key = keys::allocated_license_key(&staged.order_id, license_id);
            self.store
                .delete(&Space::Private(staged.account.clone()), &lease_key, &stamp);
        }
        info!(order = %staged.order_id, "consumer leases dropped");
        Ok(())
    }

    /// Issuer half of a return: release the licenses and close the marker.
    ///
    /// Returned licenses become available again. The order shrinks by the
    /// returned set and reaches `DEALLOCATED` only once it holds nothing.
    pub fn deallocate_licenses_from_issuer(
        &mut self,
        ctx: &TxContext,
        order_id: &OrderId,
        account: &OrgId,
    ) -> Result<(), LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::AllocateLicense, None)?;

        let staged = self.open_request(RequestAction::Deallocate, order_id)?;
        let staged = staged.ok_or_else(|| LedgerError::NoDeallocateRequest {
            order_id: order_id.clone(),
        })?;

        let mut order = load_order(self.store, &self.issuer, account, order_id)?;

        let stamp = ctx.stamp();
        for license_id in &staged.licenses {
            let mut license =
                load_license(self.store, &self.issuer, &staged.asset_id, license_id)?;
            license.allocated = None;
            store_license(self.store, &self.issuer, &staged.asset_id, &license, &stamp)?;
        }

        let returned = license_set(&staged.licenses);
        order.licenses.retain(|l| !returned.contains(l));
        order.allocated_amount = order.licenses.len() as u32;
        order.status = if order.licenses.is_empty() {
            OrderStatus::Deallocated
        } else {
            OrderStatus::Allocated
        };
        store_order(self.store, &self.issuer, &order, &stamp)?;

        self.close_request(RequestAction::Deallocate, order_id, &stamp);
        info!(order = %order_id, returned = staged.licenses.len(), status = %order.status, "licenses released");
        Ok(())
    }

    /// Read the open allocate request for an order.
    pub fn get_allocate_request_for_order(
        &self,
        ctx: &TxContext,
        order_id: &OrderId,
    ) -> Result<LicensesRequest, LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::AllocateLicense, None)?;
        self.open_request(RequestAction::Allocate, order_id)?
            .ok_or_else(|| LedgerError::NoAllocateRequest {
                order_id: order_id.clone(),
            })
    }

    /// Read the open return request for an order.
    pub fn get_initiated_return_for_order(
        &self,
        ctx: &TxContext,
        order_id: &OrderId,
    ) -> Result<LicensesRequest, LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::ReturnLicense, None)?;
        self.open_request(RequestAction::Deallocate, order_id)?
            .ok_or_else(|| LedgerError::NoDeallocateRequest {
                order_id: order_id.clone(),
            })
    }

    /// Licenses currently leased to `account` under an order, from the
    /// consumer's own partition.
    pub fn get_available_licenses_for_order(
        &self,
        ctx: &TxContext,
        order_id: &OrderId,
        account: &OrgId,
    ) -> Result<Vec<LeaseRecord>, LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::ReadLicense, Some(account))?;

        let prefix = keys::allocated_license_prefix(order_id);
        let mut leases = Vec::new();
        for (key, bytes) in self
            .store
            .scan_prefix(&Space::Private(account.clone()), &prefix)
        {
            leases.push(slx_store::decode(&key, &bytes)?);
        }
        debug!(order = %order_id, leases = leases.len(), "consumer leases read");
        Ok(leases)
    }

    /// Open the marker on the shared tier and record the request content
    /// in the issuer's partition under the same key.
    fn stage_request(
        &mut self,
        marker_key: &str,
        req: &LicensesRequest,
        stamp: &TxStamp,
    ) -> Result<(), LedgerError> {
        let bytes = slx_store::encode(marker_key, req)?;
        self.store
            .put(&Space::Private(self.issuer.clone()), marker_key, &bytes, stamp);
        self.store.put(&Space::Shared, marker_key, MARKER, stamp);
        Ok(())
    }

    fn close_request(&mut self, action: RequestAction, order_id: &OrderId, stamp: &TxStamp) {
        let marker_key = keys::allocation_request_key(action, order_id);
        self.store.delete(&Space::Shared, &marker_key, stamp);
        self.store
            .delete(&Space::Private(self.issuer.clone()), &marker_key, stamp);
    }

    /// The staged request for an open marker, or `None` when no marker
    /// is open.
    fn open_request(
        &self,
        action: RequestAction,
        order_id: &OrderId,
    ) -> Result<Option<LicensesRequest>, LedgerError> {
        let marker_key = keys::allocation_request_key(action, order_id);
        if !self.store.exists(&Space::Shared, &marker_key) {
            return Ok(None);
        }
        match self
            .store
            .get(&Space::Private(self.issuer.clone()), &marker_key)
        {
            Some(bytes) => Ok(Some(slx_store::decode(&marker_key, &bytes)?)),
            None => Ok(None),
        }
    }
}

fn license_set(licenses: &[LicenseId]) -> BTreeSet<&LicenseId> {
    licenses.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{available_licenses, AssetRegistry, LicenseSeed};
    use crate::order::Order;
    use slx_authz::{AllowAll, Requestor, Role};
    use slx_core::{Salt, TxId};
    use slx_store::MemStore;

    const ISSUER: &str = "Org1";
    const CONSUMER: &str = "Org2";

    fn ctx(ts: &str) -> TxContext {
        TxContext::new(
            TxId::new(),
            LedgerDateTime::parse(ts).unwrap(),
            Requestor::new(OrgId::from(ISSUER), Role::AcquisitionOfficer),
        )
    }

    fn issuer() -> OrgId {
        OrgId::from(ISSUER)
    }

    fn account() -> OrgId {
        OrgId::from(CONSUMER)
    }

    fn setup_asset(store: &mut MemStore, count: usize) -> AssetId {
        let seeds: Vec<LicenseSeed> = (1..=count)
            .map(|i| LicenseSeed {
                id: LicenseId::from(i.to_string().as_str()),
                salt: Salt::from(format!("salt{i}").as_str()),
            })
            .collect();
        let mut registry = AssetRegistry::new(store, &AllowAll, issuer());
        registry
            .add_asset(&ctx("2024-01-01 00:00:00"), "asset1", "2040-01-01 00:00:00", &seeds)
            .unwrap()
    }

    fn approved_order(store: &mut MemStore, asset_id: &AssetId, amount: u32) -> OrderId {
        let order = Order {
            id: OrderId::from("123"),
            account: account(),
            asset_id: asset_id.clone(),
            status: OrderStatus::Approved,
            amount,
            duration: 1,
            price: Some(100),
            approved_amount: amount,
            allocated_amount: 0,
            expiration: None,
            licenses: Vec::new(),
        };
        crate::order::store_order(store, &issuer(), &order, &ctx("2024-01-01 00:00:00").stamp())
            .unwrap();
        order.id
    }

    fn request(asset_id: &AssetId, order_id: &OrderId, licenses: &[&str]) -> LicensesRequest {
        LicensesRequest {
            account: account(),
            order_id: order_id.clone(),
            asset_id: asset_id.clone(),
            expiration: LedgerDateTime::parse("2025-01-01 00:00:00").unwrap(),
            licenses: licenses.iter().map(|l| LicenseId::from(*l)).collect(),
        }
    }

    /// Stage and commit an allocation of the given licenses.
    fn allocate(store: &mut MemStore, asset_id: &AssetId, order_id: &OrderId, licenses: &[&str]) {
        let req = request(asset_id, order_id, licenses);
        let mut coord = AllocationCoordinator::new(store, &AllowAll, issuer());
        coord.allocate_licenses(&ctx("2024-01-02 00:00:00"), &req).unwrap();
        coord.send_licenses(&ctx("2024-01-03 00:00:00"), &req).unwrap();
    }

    #[test]
    fn test_allocate_requires_approval() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 2);
        let order_id = approved_order(&mut store, &asset_id, 2);
        {
            let mut order =
                load_order(&store, &issuer(), &account(), &order_id).unwrap();
            order.status = OrderStatus::Initiated;
            store_order(&mut store, &issuer(), &order, &ctx("2024-01-01 00:00:00").stamp())
                .unwrap();
        }

        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        let err = coord
            .allocate_licenses(
                &ctx("2024-01-02 00:00:00"),
                &request(&asset_id, &order_id, &["1", "2"]),
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot allocate licenses for an order that has not been approved"
        );
    }

    #[test]
    fn test_allocate_rejects_duplicates() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 2);
        let order_id = approved_order(&mut store, &asset_id, 2);

        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        let err = coord
            .allocate_licenses(
                &ctx("2024-01-02 00:00:00"),
                &request(&asset_id, &order_id, &["1", "1"]),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "duplicate licenses are not allowed");
    }

    #[test]
    fn test_allocate_rejects_unknown_license() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 2);
        let order_id = approved_order(&mut store, &asset_id, 2);

        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        let err = coord
            .allocate_licenses(
                &ctx("2024-01-02 00:00:00"),
                &request(&asset_id, &order_id, &["1", "9"]),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "license 9 does not exist");
    }

    #[test]
    fn test_allocate_rejects_second_request() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 2);
        let order_id = approved_order(&mut store, &asset_id, 2);

        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        let req = request(&asset_id, &order_id, &["1", "2"]);
        coord.allocate_licenses(&ctx("2024-01-02 00:00:00"), &req).unwrap();
        let err = coord
            .allocate_licenses(&ctx("2024-01-02 00:01:00"), &req)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "a request to allocate licenses for order 123 is already active"
        );
    }

    #[test]
    fn test_staging_does_not_allocate() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 2);
        let order_id = approved_order(&mut store, &asset_id, 2);

        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        coord
            .allocate_licenses(
                &ctx("2024-01-02 00:00:00"),
                &request(&asset_id, &order_id, &["1", "2"]),
            )
            .unwrap();

        assert_eq!(
            available_licenses(&store, &issuer(), &asset_id).unwrap().len(),
            2
        );
        let order = load_order(&store, &issuer(), &account(), &order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Approved);
    }

    #[test]
    fn test_send_requires_open_request() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 2);
        let order_id = approved_order(&mut store, &asset_id, 2);

        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        let err = coord
            .send_licenses(
                &ctx("2024-01-03 00:00:00"),
                &request(&asset_id, &order_id, &["1", "2"]),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "no allocate request exists for order 123");
    }

    #[test]
    fn test_send_rejects_set_mismatch() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 3);
        let order_id = approved_order(&mut store, &asset_id, 2);

        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        coord
            .allocate_licenses(
                &ctx("2024-01-02 00:00:00"),
                &request(&asset_id, &order_id, &["1", "2"]),
            )
            .unwrap();
        let err = coord
            .send_licenses(
                &ctx("2024-01-03 00:00:00"),
                &request(&asset_id, &order_id, &["1", "3"]),
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "provided licenses to send do not match the licenses allocated"
        );
    }

    #[test]
    fn test_send_commits_and_closes_marker() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 3);
        let order_id = approved_order(&mut store, &asset_id, 2);
        allocate(&mut store, &asset_id, &order_id, &["1", "2"]);

        // Issuer side: licenses marked, order allocated.
        assert_eq!(
            available_licenses(&store, &issuer(), &asset_id).unwrap().len(),
            1
        );
        let order = load_order(&store, &issuer(), &account(), &order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Allocated);
        assert_eq!(order.allocated_amount, 2);
        assert_eq!(order.licenses, vec![LicenseId::from("1"), LicenseId::from("2")]);

        // Consumer side: lease records in its own partition.
        let coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        let leases = coord
            .get_available_licenses_for_order(&ctx("2024-01-04 00:00:00"), &order_id, &account())
            .unwrap();
        assert_eq!(leases.len(), 2);
        assert_eq!(leases[0].expiration.to_wire(), "2025-01-01 00:00:00");

        // Marker closed: the request can no longer be read.
        let err = coord
            .get_allocate_request_for_order(&ctx("2024-01-04 00:00:00"), &order_id)
            .unwrap_err();
        assert_eq!(err.to_string(), "no allocate request exists for order 123");
    }

    #[test]
    fn test_read_staged_allocate_request() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 2);
        let order_id = approved_order(&mut store, &asset_id, 2);

        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        let req = request(&asset_id, &order_id, &["1", "2"]);
        coord.allocate_licenses(&ctx("2024-01-02 00:00:00"), &req).unwrap();

        let staged = coord
            .get_allocate_request_for_order(&ctx("2024-01-02 00:01:00"), &order_id)
            .unwrap();
        assert_eq!(staged, req);
    }

    #[test]
    fn test_allocate_rejects_amount_beyond_approval() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 3);
        let order_id = approved_order(&mut store, &asset_id, 1);

        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        let err = coord
            .allocate_licenses(
                &ctx("2024-01-02 00:00:00"),
                &request(&asset_id, &order_id, &["1", "2", "3"]),
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "provided licenses do not match the approved amount for order 123"
        );
        // Nothing was staged.
        assert!(coord
            .get_allocate_request_for_order(&ctx("2024-01-02 00:01:00"), &order_id)
            .is_err());
    }

    #[test]
    fn test_staged_request_content_stays_private() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 2);
        let order_id = approved_order(&mut store, &asset_id, 2);
        let req = request(&asset_id, &order_id, &["1", "2"]);
        {
            let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
            coord.allocate_licenses(&ctx("2024-01-02 00:00:00"), &req).unwrap();
        }

        // The shared tier carries only the bare marker.
        let shared = store.scan_prefix(&Space::Shared, "request:");
        assert_eq!(shared.len(), 1);
        assert!(shared[0].1.is_empty());

        // The content sits in the issuer's partition under the same key.
        let key = keys::allocation_request_key(RequestAction::Allocate, &order_id);
        let bytes = store.get(&Space::Private(issuer()), &key).unwrap();
        let staged: LicensesRequest = slx_store::decode(&key, &bytes).unwrap();
        assert_eq!(staged, req);
    }

    #[test]
    fn test_renewal_restages_own_lease_and_refreshes() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 2);
        let order_id = approved_order(&mut store, &asset_id, 2);
        allocate(&mut store, &asset_id, &order_id, &["1", "2"]);

        // Renewal walked to approval; the old lease is still in place.
        {
            let mut order = load_order(&store, &issuer(), &account(), &order_id).unwrap();
            order.status = OrderStatus::RenewalApproved;
            store_order(&mut store, &issuer(), &order, &ctx("2024-12-01 00:00:00").stamp())
                .unwrap();
        }

        let mut renewal = request(&asset_id, &order_id, &["1", "2"]);
        renewal.expiration = LedgerDateTime::parse("2026-01-01 00:00:00").unwrap();

        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        coord
            .allocate_licenses(&ctx("2024-12-02 00:00:00"), &renewal)
            .unwrap();
        coord
            .send_licenses(&ctx("2024-12-03 00:00:00"), &renewal)
            .unwrap();

        // Back to ALLOCATED with the lease pushed out a year.
        let order = load_order(&store, &issuer(), &account(), &order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Allocated);
        assert_eq!(order.allocated_amount, 2);
        assert_eq!(
            order.expiration.unwrap().to_wire(),
            "2026-01-01 00:00:00"
        );

        let license =
            crate::asset::load_license(&store, &issuer(), &asset_id, &LicenseId::from("1"))
                .unwrap();
        assert_eq!(
            license.allocated.unwrap().expiration.to_wire(),
            "2026-01-01 00:00:00"
        );

        let coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        let leases = coord
            .get_available_licenses_for_order(&ctx("2024-12-04 00:00:00"), &order_id, &account())
            .unwrap();
        assert!(leases
            .iter()
            .all(|l| l.expiration.to_wire() == "2026-01-01 00:00:00"));
    }

    #[test]
    fn test_renewal_rejects_foreign_lease() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 3);
        let order_id = approved_order(&mut store, &asset_id, 2);
        allocate(&mut store, &asset_id, &order_id, &["1", "2"]);

        // License 3 is leased under a different order.
        {
            let mut license =
                load_license(&store, &issuer(), &asset_id, &LicenseId::from("3")).unwrap();
            license.allocated = Some(Allocated {
                account: account(),
                order_id: OrderId::from("999"),
                expiration: LedgerDateTime::parse("2025-01-01 00:00:00").unwrap(),
            });
            store_license(
                &mut store,
                &issuer(),
                &asset_id,
                &license,
                &ctx("2024-06-01 00:00:00").stamp(),
            )
            .unwrap();
        }

        {
            let mut order = load_order(&store, &issuer(), &account(), &order_id).unwrap();
            order.status = OrderStatus::RenewalApproved;
            store_order(&mut store, &issuer(), &order, &ctx("2024-12-01 00:00:00").stamp())
                .unwrap();
        }

        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        let err = coord
            .allocate_licenses(
                &ctx("2024-12-02 00:00:00"),
                &request(&asset_id, &order_id, &["1", "3"]),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "license 3 is already allocated");
    }

    #[test]
    fn test_return_requires_leases() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 2);
        let order_id = approved_order(&mut store, &asset_id, 2);

        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        let err = coord
            .initiate_return(
                &ctx("2024-01-02 00:00:00"),
                &request(&asset_id, &order_id, &["1"]),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "license 1 is not leased by Org2");
    }

    #[test]
    fn test_return_rejects_second_request() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 2);
        let order_id = approved_order(&mut store, &asset_id, 2);
        allocate(&mut store, &asset_id, &order_id, &["1", "2"]);

        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        let req = request(&asset_id, &order_id, &["1"]);
        coord.initiate_return(&ctx("2024-02-01 00:00:00"), &req).unwrap();
        let err = coord
            .initiate_return(&ctx("2024-02-01 00:01:00"), &req)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "a request to return licenses for order 123 is already active"
        );
    }

    #[test]
    fn test_allocate_and_return_markers_coexist() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 4);
        let order_id = approved_order(&mut store, &asset_id, 2);
        allocate(&mut store, &asset_id, &order_id, &["1", "2"]);

        // Flip back to approved so a second allocate round can stage
        // before the return of the first goes out.
        {
            let mut order = load_order(&store, &issuer(), &account(), &order_id).unwrap();
            order.status = OrderStatus::Approved;
            store_order(&mut store, &issuer(), &order, &ctx("2024-02-01 00:00:00").stamp())
                .unwrap();
        }

        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        coord
            .allocate_licenses(
                &ctx("2024-02-02 00:00:00"),
                &request(&asset_id, &order_id, &["3", "4"]),
            )
            .unwrap();
        coord
            .initiate_return(
                &ctx("2024-02-03 00:00:00"),
                &request(&asset_id, &order_id, &["1"]),
            )
            .unwrap();

        // The two actions track independent markers for the same order.
        assert!(coord
            .get_allocate_request_for_order(&ctx("2024-02-04 00:00:00"), &order_id)
            .is_ok());
        assert!(coord
            .get_initiated_return_for_order(&ctx("2024-02-04 00:00:00"), &order_id)
            .is_ok());
    }

    #[test]
    fn test_consumer_deallocate_requires_match() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 2);
        let order_id = approved_order(&mut store, &asset_id, 2);
        allocate(&mut store, &asset_id, &order_id, &["1", "2"]);

        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        coord
            .initiate_return(
                &ctx("2024-02-01 00:00:00"),
                &request(&asset_id, &order_id, &["1"]),
            )
            .unwrap();
        let err = coord
            .deallocate_licenses_from_account(
                &ctx("2024-02-02 00:00:00"),
                &request(&asset_id, &order_id, &["2"]),
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "provided deallocation request does not match the one initiated"
        );
    }

    #[test]
    fn test_partial_return_round_trip() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 2);
        let order_id = approved_order(&mut store, &asset_id, 2);
        allocate(&mut store, &asset_id, &order_id, &["1", "2"]);

        let req = request(&asset_id, &order_id, &["1"]);
        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        coord.initiate_return(&ctx("2024-02-01 00:00:00"), &req).unwrap();
        coord
            .deallocate_licenses_from_account(&ctx("2024-02-02 00:00:00"), &req)
            .unwrap();

        // Consumer half done, marker still open for the issuer half.
        assert!(coord
            .get_initiated_return_for_order(&ctx("2024-02-02 00:01:00"), &order_id)
            .is_ok());

        coord
            .deallocate_licenses_from_issuer(&ctx("2024-02-03 00:00:00"), &order_id, &account())
            .unwrap();

        // License 1 is available again, the order keeps license 2.
        let available = available_licenses(&store, &issuer(), &asset_id).unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, LicenseId::from("1"));

        let order = load_order(&store, &issuer(), &account(), &order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Allocated);
        assert_eq!(order.allocated_amount, 1);
        assert_eq!(order.licenses, vec![LicenseId::from("2")]);

        let coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        let err = coord
            .get_initiated_return_for_order(&ctx("2024-02-04 00:00:00"), &order_id)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "no deallocate request exists for order 123"
        );
        let leases = coord
            .get_available_licenses_for_order(&ctx("2024-02-04 00:00:00"), &order_id, &account())
            .unwrap();
        assert_eq!(leases.len(), 1);
        assert_eq!(leases[0].license_id, LicenseId::from("2"));
    }

    #[test]
    fn test_full_return_deallocates_order() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 2);
        let order_id = approved_order(&mut store, &asset_id, 2);
        allocate(&mut store, &asset_id, &order_id, &["1", "2"]);

        let req = request(&asset_id, &order_id, &["1", "2"]);
        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        coord.initiate_return(&ctx("2024-02-01 00:00:00"), &req).unwrap();
        coord
            .deallocate_licenses_from_account(&ctx("2024-02-02 00:00:00"), &req)
            .unwrap();
        coord
            .deallocate_licenses_from_issuer(&ctx("2024-02-03 00:00:00"), &order_id, &account())
            .unwrap();

        let order = load_order(&store, &issuer(), &account(), &order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Deallocated);
        assert_eq!(order.allocated_amount, 0);
        assert!(order.licenses.is_empty());
        assert_eq!(
            available_licenses(&store, &issuer(), &asset_id).unwrap().len(),
            2
        );
    }

    #[test]
    fn test_issuer_deallocate_requires_open_request() {
        let mut store = MemStore::new();
        let asset_id = setup_asset(&mut store, 2);
        let order_id = approved_order(&mut store, &asset_id, 2);

        let mut coord = AllocationCoordinator::new(&mut store, &AllowAll, issuer());
        let err = coord
            .deallocate_licenses_from_issuer(&ctx("2024-02-01 00:00:00"), &order_id, &account())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "no deallocate request exists for order 123"
        );
    }
}
