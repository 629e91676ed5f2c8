//! # slx-authz — Authorization Gate
//!
//! The authorization collaborator the ledger core calls before each
//! mutating or detail-revealing operation. The decision model is an
//! explicit capability table over roles, actions, and account statuses —
//! no policy graph, no inheritance, no reflection. The full
//! attribute-based decision service is an external collaborator; this
//! crate fixes its interface and provides a direct implementation of the
//! same decisions.
//!
//! ## Model
//!
//! - A [`Requestor`] is an organization plus the role its credential
//!   carries; deriving the requestor from the credential happens outside
//!   the core.
//! - Asset-scoped actions are the issuing organization's alone.
//!   Account-scoped actions carry a target account, and consumer roles
//!   act only on their own account.
//! - Every decision is conditioned on [`AccountStatus::Authorized`]; an
//!   organization whose standing is pending or revoked can neither act
//!   nor be acted upon.
//!
//! `deny` is terminal: the gate returns [`LedgerError::Unauthorized`] and
//! the enclosing transaction aborts.

pub mod policy;

use serde::{Deserialize, Serialize};

use slx_core::{LedgerError, OrgId};

pub use policy::PolicyGate;

/// The roles a caller credential can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Issuer-side administrator of the exchange itself.
    SystemOwner,
    /// Acquisition officer: writes assets and allocates on the issuer
    /// side, approves orders on the consumer side.
    AcquisitionOfficer,
    /// Technical point of contact: requests quotes, initiates orders and
    /// returns for their organization.
    TechnicalPoc,
    /// Reads leased licenses and software tags for their organization.
    LicenseOwner,
}

/// Standing of a participating organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountStatus {
    /// Full member; may act and be acted upon.
    Authorized,
    /// Joined but not yet approved; read-only at best.
    Pending,
    /// Membership revoked.
    Unauthorized,
}

/// The operations the gate decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Create or mutate assets and their licenses (issuer only).
    WriteAsset,
    /// Read asset summaries.
    ReadAssets,
    /// Read the full asset detail view (issuer only; others get the
    /// filtered summary).
    ReadAssetDetail,
    /// Stage, send, or reclaim license allocations (issuer only).
    AllocateLicense,
    /// Read an order of the target account.
    ReadOrder,
    /// Request a quote or initiate an order for the target account.
    InitiateOrder,
    /// Approve or deny an initiated order of the target account.
    ApproveOrder,
    /// Initiate or complete a license return for the target account.
    ReturnLicense,
    /// Read leased licenses of the target account.
    ReadLicense,
    /// Read software identification tags of the target account.
    ReadSwid,
    /// Write software identification tags of the target account.
    WriteSwid,
}

impl Action {
    /// Human-readable action name used in denial messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WriteAsset => "write asset",
            Self::ReadAssets => "read assets",
            Self::ReadAssetDetail => "read asset detail",
            Self::AllocateLicense => "allocate license",
            Self::ReadOrder => "read order",
            Self::InitiateOrder => "initiate order",
            Self::ApproveOrder => "approve order",
            Self::ReturnLicense => "return license",
            Self::ReadLicense => "read license",
            Self::ReadSwid => "read swid",
            Self::WriteSwid => "write swid",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requestor {
    /// The calling organization.
    pub org: OrgId,
    /// The role carried by the caller's credential.
    pub role: Role,
}

impl Requestor {
    /// Convenience constructor.
    pub fn new(org: OrgId, role: Role) -> Self {
        Self { org, role }
    }
}

/// The decision interface the ledger core calls.
///
/// `target_account` is present for account-scoped actions (orders,
/// returns, leased-license reads) and absent for asset-scoped ones.
pub trait AuthorizationGate {
    /// Allow the action or return a terminal authorization error.
    fn can_perform(
        &self,
        requestor: &Requestor,
        action: Action,
        target_account: Option<&OrgId>,
    ) -> Result<(), LedgerError>;
}

/// Gate that allows everything. Test support only.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AuthorizationGate for AllowAll {
    fn can_perform(
        &self,
        _requestor: &Requestor,
        _action: Action,
        _target_account: Option<&OrgId>,
    ) -> Result<(), LedgerError> {
        Ok(())
    }
}
