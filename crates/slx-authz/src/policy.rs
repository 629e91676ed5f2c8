//! # Capability-Table Policy Gate
//!
//! Direct implementation of [`AuthorizationGate`] as an exhaustive match
//! over (role, action, scope). The table is small enough to read in one
//! screen, which is the point: every allow is visible, and a new action
//! variant forces every arm to be revisited.

use std::collections::HashMap;

use slx_core::{LedgerError, OrgId};

use crate::{AccountStatus, Action, AuthorizationGate, Requestor, Role};

/// Capability-table gate keyed by the issuing organization.
///
/// Account statuses default to [`AccountStatus::Pending`] until set; the
/// issuer itself is always authorized.
#[derive(Debug, Clone)]
pub struct PolicyGate {
    issuer: OrgId,
    statuses: HashMap<OrgId, AccountStatus>,
}

impl PolicyGate {
    /// Create a gate for an exchange issued by `issuer`.
    pub fn new(issuer: OrgId) -> Self {
        Self {
            issuer,
            statuses: HashMap::new(),
        }
    }

    /// Record an organization's standing.
    pub fn set_account_status(&mut self, org: OrgId, status: AccountStatus) {
        self.statuses.insert(org, status);
    }

    /// An organization's standing; the issuer is always authorized.
    pub fn account_status(&self, org: &OrgId) -> AccountStatus {
        if *org == self.issuer {
            return AccountStatus::Authorized;
        }
        self.statuses
            .get(org)
            .copied()
            .unwrap_or(AccountStatus::Pending)
    }

    fn deny(requestor: &Requestor, action: Action) -> LedgerError {
        LedgerError::Unauthorized {
            org: requestor.org.clone(),
            action: action.to_string(),
        }
    }

    /// Whether (role, scope) allows `action`. Status checks happen in
    /// `can_perform`; this is the pure table.
    fn allows(
        &self,
        requestor: &Requestor,
        action: Action,
        target_account: Option<&OrgId>,
    ) -> bool {
        let is_issuer = requestor.org == self.issuer;
        let own_target = target_account == Some(&requestor.org);

        match action {
            // Asset-scoped: the issuer's acquisition staff.
            Action::WriteAsset | Action::AllocateLicense => {
                is_issuer
                    && matches!(
                        requestor.role,
                        Role::SystemOwner | Role::AcquisitionOfficer
                    )
            }
            // Summaries are readable by any member of any account.
            Action::ReadAssets => true,
            // Detail reveals per-account allocations; issuer staff only.
            Action::ReadAssetDetail => is_issuer,
            // Account-scoped reads: the issuer sees everything, an
            // account sees itself.
            Action::ReadOrder | Action::ReadLicense | Action::ReadSwid => {
                is_issuer || own_target
            }
            // Quote and order initiation: the target account's TPOC.
            Action::InitiateOrder => {
                own_target
                    && matches!(
                        requestor.role,
                        Role::TechnicalPoc | Role::AcquisitionOfficer
                    )
            }
            // Approval is the target account's acquisition officer.
            Action::ApproveOrder => own_target && requestor.role == Role::AcquisitionOfficer,
            // Returns: the target account's staff, or the issuer
            // reclaiming on its own side of the handshake.
            Action::ReturnLicense => {
                is_issuer
                    || (own_target
                        && matches!(
                            requestor.role,
                            Role::TechnicalPoc | Role::AcquisitionOfficer
                        ))
            }
            Action::WriteSwid => {
                own_target
                    && matches!(requestor.role, Role::TechnicalPoc | Role::LicenseOwner)
            }
        }
    }
}

impl AuthorizationGate for PolicyGate {
    fn can_perform(
        &self,
        requestor: &Requestor,
        action: Action,
        target_account: Option<&OrgId>,
    ) -> Result<(), LedgerError> {
        // Standing first: the caller's organization must be authorized,
        // and so must the account being acted upon.
        if self.account_status(&requestor.org) != AccountStatus::Authorized {
            return Err(Self::deny(requestor, action));
        }
        if let Some(target) = target_account {
            if self.account_status(target) != AccountStatus::Authorized {
                return Err(Self::deny(requestor, action));
            }
        }

        if self.allows(requestor, action, target_account) {
            Ok(())
        } else {
            Err(Self::deny(requestor, action))
        }
    }
}
