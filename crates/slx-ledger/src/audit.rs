//! # Audit Trail
//!
//! Read-only projection over a commitment's version history on the
//! shared tier. Every write or retraction of a commitment is attributed
//! to the transaction that performed it, so an auditor holding the
//! private license record can recompute the commitment and walk every
//! transaction that ever touched it.

use tracing::debug;

use slx_authz::{Action, AuthorizationGate};
use slx_core::{keys, AssetId, LedgerError, LicenseId, OrgId, TxId};
use slx_store::{LedgerStore, Space};

use crate::asset::load_license;
use crate::context::TxContext;

/// Read-only audit queries over the shared tier.
pub struct AuditTrail<'a> {
    issuer: OrgId,
    store: &'a dyn LedgerStore,
    gate: &'a dyn AuthorizationGate,
}

impl<'a> AuditTrail<'a> {
    /// Build an audit view over the issuer's records.
    pub fn new(store: &'a dyn LedgerStore, gate: &'a dyn AuthorizationGate, issuer: OrgId) -> Self {
        Self {
            issuer,
            store,
            gate,
        }
    }

    /// Every transaction that touched a license's commitment, oldest
    /// first.
    ///
    /// The commitment is recomputed from the private license record, so
    /// only a caller who can read full asset detail can ask; the shared
    /// tier alone never links a commitment back to its license.
    pub fn license_tx_history(
        &self,
        ctx: &TxContext,
        asset_id: &AssetId,
        license_id: &LicenseId,
    ) -> Result<Vec<TxId>, LedgerError> {
        self.gate
            .can_perform(&ctx.caller, Action::ReadAssetDetail, None)?;

        let license = load_license(self.store, &self.issuer, asset_id, license_id)?;
        let commitment = keys::commitment(asset_id, &license.id, &license.salt);

        let history = self.store.history(&Space::Shared, &commitment);
        debug!(license = %license_id, versions = history.len(), "commitment history read");
        Ok(history.into_iter().map(|v| v.tx_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetRegistry, LicenseSeed};
    use slx_authz::{AllowAll, Requestor, Role};
    use slx_core::{LedgerDateTime, Salt};
    use slx_store::MemStore;

    const ISSUER: &str = "Org1";

    fn ctx(ts: &str) -> TxContext {
        TxContext::new(
            TxId::new(),
            LedgerDateTime::parse(ts).unwrap(),
            Requestor::new(OrgId::from(ISSUER), Role::SystemOwner),
        )
    }

    fn issuer() -> OrgId {
        OrgId::from(ISSUER)
    }

    fn seed(id: &str) -> LicenseSeed {
        LicenseSeed {
            id: LicenseId::from(id),
            salt: Salt::from(format!("salt-{id}").as_str()),
        }
    }

    #[test]
    fn test_history_requires_license() {
        let mut store = MemStore::new();
        let asset_id = {
            let mut registry = AssetRegistry::new(&mut store, &AllowAll, issuer());
            registry
                .add_asset(
                    &ctx("2024-01-01 00:00:00"),
                    "asset1",
                    "2040-01-01 00:00:00",
                    &[seed("1")],
                )
                .unwrap()
        };

        let audit = AuditTrail::new(&store, &AllowAll, issuer());
        let err = audit
            .license_tx_history(&ctx("2024-01-02 00:00:00"), &asset_id, &LicenseId::from("9"))
            .unwrap_err();
        assert_eq!(err.to_string(), "license 9 does not exist");
    }

    #[test]
    fn test_history_attributes_creating_transaction() {
        let mut store = MemStore::new();
        let create = ctx("2024-01-01 00:00:00");
        let asset_id = {
            let mut registry = AssetRegistry::new(&mut store, &AllowAll, issuer());
            registry
                .add_asset(&create, "asset1", "2040-01-01 00:00:00", &[seed("1")])
                .unwrap()
        };

        let audit = AuditTrail::new(&store, &AllowAll, issuer());
        let history = audit
            .license_tx_history(&ctx("2024-01-02 00:00:00"), &asset_id, &LicenseId::from("1"))
            .unwrap();
        assert_eq!(history, vec![create.tx_id]);
    }

    #[test]
    fn test_history_accumulates_rewrites() {
        let mut store = MemStore::new();
        let create = ctx("2024-01-01 00:00:00");
        let readd = ctx("2024-01-03 00:00:00");
        let asset_id = {
            let mut registry = AssetRegistry::new(&mut store, &AllowAll, issuer());
            let asset_id = registry
                .add_asset(&create, "asset1", "2040-01-01 00:00:00", &[seed("1")])
                .unwrap();
            registry
                .remove_licenses(
                    &ctx("2024-01-02 00:00:00"),
                    &asset_id,
                    &[LicenseId::from("1")],
                )
                .unwrap();
            registry.add_licenses(&readd, &asset_id, &[seed("1")]).unwrap();
            asset_id
        };

        let audit = AuditTrail::new(&store, &AllowAll, issuer());
        let history = audit
            .license_tx_history(&ctx("2024-01-04 00:00:00"), &asset_id, &LicenseId::from("1"))
            .unwrap();
        // Create, retract, re-create: three versions, oldest first.
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], create.tx_id);
        assert_eq!(history[2], readd.tx_id);
    }
}
