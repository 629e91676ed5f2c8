//! # Asset Registry
//!
//! Owns Asset and License entities inside the issuing organization's
//! private partition, and keeps the shared tier's existence commitments
//! in lockstep: a license's private record and its public commitment are
//! created together and deleted together, never one without the other.
//!
//! The commitment proves to every other organization that a license with
//! these (undisclosed) identifiers existed at a given transaction; the
//! identifiers and the salt never leave the issuer's partition.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use slx_authz::{Action, AuthorizationGate};
use slx_core::{keys, AssetId, LedgerDateTime, LedgerError, LicenseId, OrderId, OrgId, Salt};
use slx_store::{LedgerStore, Space, TxStamp, MARKER};

use crate::context::TxContext;

// ─── Entities ────────────────────────────────────────────────────────

/// A leasable asset, owned exclusively by the issuer's private partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Identifier, assigned from the creating transaction's id.
    pub id: AssetId,
    /// Display name.
    pub name: String,
    /// When the asset was registered (the creating transaction's time).
    pub start_date: LedgerDateTime,
    /// End of the asset's validity; the only mutable field.
    pub end_date: LedgerDateTime,
}

/// One leasable unit of an asset.
///
/// `allocated` is the single authoritative allocation flag: present iff
/// the license is currently leased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    /// Plaintext identifier, private to the issuer.
    pub id: LicenseId,
    /// Random value used only to derive the public commitment.
    pub salt: Salt,
    /// Present iff the license is leased to exactly one (account, order).
    pub allocated: Option<Allocated>,
}

/// The current lessee of a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocated {
    /// The consuming organization.
    pub account: OrgId,
    /// The order the lease belongs to.
    pub order_id: OrderId,
    /// When the lease expires.
    pub expiration: LedgerDateTime,
}

/// A license id plus the salt chosen for it at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseSeed {
    /// The new license's id.
    pub id: LicenseId,
    /// Its commitment salt.
    pub salt: Salt,
}

// ─── Views ───────────────────────────────────────────────────────────

/// Per-asset summary available to any authorized reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSummary {
    /// Asset identifier.
    pub id: AssetId,
    /// Display name.
    pub name: String,
    /// Count of licenses with no current lease.
    pub num_available: usize,
    /// Registration time.
    pub start_date: LedgerDateTime,
    /// End of validity.
    pub end_date: LedgerDateTime,
}

/// A leased license id with its lease expiration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LicenseWithExpiration {
    /// The leased license.
    pub license_id: LicenseId,
    /// When its lease expires.
    pub expiration: LedgerDateTime,
}

/// Full asset view. The three detail fields are stripped to `None` for
/// callers holding only summary-read privilege.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDetail {
    /// Summary portion, always present.
    pub summary: AssetSummary,
    /// Available plus allocated license count across every order.
    pub total_amount: Option<usize>,
    /// Ids of licenses with no current lease.
    pub available_licenses: Option<BTreeSet<LicenseId>>,
    /// Everything currently allocated: account → order → leases.
    pub allocated_licenses:
        Option<BTreeMap<OrgId, BTreeMap<OrderId, BTreeSet<LicenseWithExpiration>>>>,
}

// ─── Registry ────────────────────────────────────────────────────────

/// Issuer-side operations on assets, licenses, and their commitments.
pub struct AssetRegistry<'a> {
    issuer: OrgId,
    store: &'a mut dyn LedgerStore,
    gate: &'a dyn AuthorizationGate,
}

impl<'a> AssetRegistry<'a> {
    /// Build a registry over the issuer's partition.
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

    /// Register a new asset with its initial licenses.
    ///
    /// The asset id is assigned from the enclosing transaction's id, and
    /// `start_date` from its timestamp. For every seed, the private
    /// license record and its public commitment are written together.
    pub fn add_asset(
        &mut self,
        ctx: &TxContext,
        name: &str,
        end_date: &str,
        licenses: &[LicenseSeed],
    ) -> Result<AssetId, LedgerError> {
        self.gate.can_perform(&ctx.caller, Action::WriteAsset, None)?;

        let end_date = LedgerDateTime::parse(end_date)?;
        let asset_id = AssetId(ctx.tx_id.to_string());

        let asset = Asset {
            id: asset_id.clone(),
            name: name.to_string(),
            start_date: ctx.timestamp,
            end_date,
        };
        self.put_private(&keys::asset_key(&asset_id), &asset, &ctx.stamp())?;

        for seed in licenses {
            self.write_license(&asset_id, seed, &ctx.stamp())?;
        }

        info!(asset = %asset_id, licenses = licenses.len(), "asset registered");
        Ok(asset_id)
    }

    /// Add licenses to an existing asset.
    ///
    /// Fails with a conflict if any seed's id already has a private
    /// record under the asset; nothing is written until every seed has
    /// been checked.
    pub fn add_licenses(
        &mut self,
        ctx: &TxContext,
        asset_id: &AssetId,
        licenses: &[LicenseSeed],
    ) -> Result<(), LedgerError> {
        self.gate.can_perform(&ctx.caller, Action::WriteAsset, None)?;

        let asset = load_asset(self.store, &self.issuer, asset_id)?;

        for seed in licenses {
            let key = keys::license_key(&asset.id, &seed.id);
            if self.store.exists(&self.private(), &key) {
                return Err(LedgerError::LicenseExists {
                    license_id: seed.id.clone(),
                });
            }
        }

        for seed in licenses {
            self.write_license(&asset.id, seed, &ctx.stamp())?;
        }

        info!(asset = %asset_id, licenses = licenses.len(), "licenses added");
        Ok(())
    }

    /// Remove licenses and their commitments.
    ///
    /// Every named license must exist and be unallocated; only when all
    /// pass both checks is anything deleted.
    pub fn remove_licenses(
        &mut self,
        ctx: &TxContext,
        asset_id: &AssetId,
        license_ids: &[LicenseId],
    ) -> Result<(), LedgerError> {
        self.gate.can_perform(&ctx.caller, Action::WriteAsset, None)?;

        let asset = load_asset(self.store, &self.issuer, asset_id)?;

        let mut to_remove = Vec::with_capacity(license_ids.len());
        for license_id in license_ids {
            let license = load_license(self.store, &self.issuer, &asset.id, license_id)?;
            if let Some(allocated) = &license.allocated {
                return Err(LedgerError::LicenseAllocated {
                    license_id: license_id.clone(),
                    account: allocated.account.clone(),
                });
            }
            to_remove.push(license);
        }

        let stamp = ctx.stamp();
        for license in &to_remove {
            self.store.delete(
                &self.private(),
                &keys::license_key(&asset.id, &license.id),
                &stamp,
            );
            self.store.delete(
                &Space::Shared,
                &keys::commitment(&asset.id, &license.id, &license.salt),
                &stamp,
            );
        }

        info!(asset = %asset_id, licenses = to_remove.len(), "licenses removed");
        Ok(())
    }

    /// Update an asset's end date; the only mutation an asset admits.
    pub fn update_end_date(
        &mut self,
        ctx: &TxContext,
        asset_id: &AssetId,
        new_end_date: &str,
    ) -> Result<(), LedgerError> {
        self.gate.can_perform(&ctx.caller, Action::WriteAsset, None)?;

        let new_end_date = LedgerDateTime::parse(new_end_date)?;
        let mut asset = load_asset(self.store, &self.issuer, asset_id)?;
        asset.end_date = new_end_date;
        self.put_private(&keys::asset_key(asset_id), &asset, &ctx.stamp())?;

        info!(asset = %asset_id, end_date = %new_end_date, "end date updated");
        Ok(())
    }

    /// Summaries of every registered asset.
    pub fn get_assets(&self, ctx: &TxContext) -> Result<Vec<AssetSummary>, LedgerError> {
        self.gate.can_perform(&ctx.caller, Action::ReadAssets, None)?;

        let mut summaries = Vec::new();
        for (key, bytes) in self.store.scan_prefix(&self.private(), keys::ASSET_PREFIX) {
            let asset: Asset = slx_store::decode(&key, &bytes)?;
            let num_available =
                available_licenses(self.store, &self.issuer, &asset.id)?.len();
            summaries.push(AssetSummary {
                id: asset.id,
                name: asset.name,
                num_available,
                start_date: asset.start_date,
                end_date: asset.end_date,
            });
        }
        debug!(assets = summaries.len(), "asset scan");
        Ok(summaries)
    }

    /// Full view of one asset, filtered by the caller's privilege.
    ///
    /// Detail privilege yields the total count, the available-license
    /// set, and the per-account allocation map. Without it the caller
    /// must still hold summary-read privilege — otherwise the denial
    /// propagates — and the detail fields come back as `None`.
    pub fn get_asset(
        &self,
        ctx: &TxContext,
        asset_id: &AssetId,
    ) -> Result<AssetDetail, LedgerError> {
        let asset = load_asset(self.store, &self.issuer, asset_id)?;
        let available = available_licenses(self.store, &self.issuer, &asset.id)?;

        let summary = AssetSummary {
            id: asset.id.clone(),
            name: asset.name,
            num_available: available.len(),
            start_date: asset.start_date,
            end_date: asset.end_date,
        };

        if self
            .gate
            .can_perform(&ctx.caller, Action::ReadAssetDetail, None)
            .is_err()
        {
            self.gate.can_perform(&ctx.caller, Action::ReadAssets, None)?;
            return Ok(AssetDetail {
                summary,
                total_amount: None,
                available_licenses: None,
                allocated_licenses: None,
            });
        }

        let allocated = allocated_map(self.store, &self.issuer, &asset.id)?;
        let allocated_count: usize = allocated
            .values()
            .flat_map(|orders| orders.values())
            .map(|leases| leases.len())
            .sum();

        Ok(AssetDetail {
            total_amount: Some(available.len() + allocated_count),
            available_licenses: Some(available.into_iter().map(|l| l.id).collect()),
            allocated_licenses: Some(allocated),
            summary,
        })
    }

    fn private(&self) -> Space {
        Space::Private(self.issuer.clone())
    }

    fn put_private<T: Serialize>(
        &mut self,
        key: &str,
        record: &T,
        stamp: &TxStamp,
    ) -> Result<(), LedgerError> {
        let bytes = slx_store::encode(key, record)?;
        self.store.put(&self.private(), key, &bytes, stamp);
        Ok(())
    }

    /// Write one license's private record and its shared commitment.
    fn write_license(
        &mut self,
        asset_id: &AssetId,
        seed: &LicenseSeed,
        stamp: &TxStamp,
    ) -> Result<(), LedgerError> {
        let license = License {
            id: seed.id.clone(),
            salt: seed.salt.clone(),
            allocated: None,
        };
        self.put_private(&keys::license_key(asset_id, &seed.id), &license, stamp)?;
        self.store.put(
            &Space::Shared,
            &keys::commitment(asset_id, &seed.id, &seed.salt),
            MARKER,
            stamp,
        );
        Ok(())
    }
}

// ─── Shared record access ────────────────────────────────────────────

pub(crate) fn load_asset(
    store: &dyn LedgerStore,
    issuer: &OrgId,
    asset_id: &AssetId,
) -> Result<Asset, LedgerError> {
    let key = keys::asset_key(asset_id);
    let bytes = store
        .get(&Space::Private(issuer.clone()), &key)
        .ok_or_else(|| LedgerError::AssetNotFound {
            asset_id: asset_id.clone(),
        })?;
    slx_store::decode(&key, &bytes)
}

pub(crate) fn load_license(
    store: &dyn LedgerStore,
    issuer: &OrgId,
    asset_id: &AssetId,
    license_id: &LicenseId,
) -> Result<License, LedgerError> {
    let key = keys::license_key(asset_id, license_id);
    let bytes = store
        .get(&Space::Private(issuer.clone()), &key)
        .ok_or_else(|| LedgerError::LicenseNotFound {
            license_id: license_id.clone(),
        })?;
    slx_store::decode(&key, &bytes)
}

pub(crate) fn store_license(
    store: &mut dyn LedgerStore,
    issuer: &OrgId,
    asset_id: &AssetId,
    license: &License,
    stamp: &TxStamp,
) -> Result<(), LedgerError> {
    let key = keys::license_key(asset_id, &license.id);
    let bytes = slx_store::encode(&key, license)?;
    store.put(&Space::Private(issuer.clone()), &key, &bytes, stamp);
    Ok(())
}

/// All license records of `asset_id` with no current lease, in id order.
pub(crate) fn available_licenses(
    store: &dyn LedgerStore,
    issuer: &OrgId,
    asset_id: &AssetId,
) -> Result<Vec<License>, LedgerError> {
    let prefix = keys::license_prefix(asset_id);
    let mut licenses = Vec::new();
    for (key, bytes) in store.scan_prefix(&Space::Private(issuer.clone()), &prefix) {
        let license: License = slx_store::decode(&key, &bytes)?;
        if license.allocated.is_none() {
            licenses.push(license);
        }
    }
    Ok(licenses)
}

/// Everything currently allocated for `asset_id`: account → order → leases.
fn allocated_map(
    store: &dyn LedgerStore,
    issuer: &OrgId,
    asset_id: &AssetId,
) -> Result<BTreeMap<OrgId, BTreeMap<OrderId, BTreeSet<LicenseWithExpiration>>>, LedgerError> {
    let prefix = keys::license_prefix(asset_id);
    let mut map: BTreeMap<OrgId, BTreeMap<OrderId, BTreeSet<LicenseWithExpiration>>> =
        BTreeMap::new();
    for (key, bytes) in store.scan_prefix(&Space::Private(issuer.clone()), &prefix) {
        let license: License = slx_store::decode(&key, &bytes)?;
        if let Some(allocated) = license.allocated {
            map.entry(allocated.account)
                .or_default()
                .entry(allocated.order_id)
                .or_default()
                .insert(LicenseWithExpiration {
                    license_id: license.id,
                    expiration: allocated.expiration,
                });
        }
    }
    Ok(map)
}
