//! Authorization seam for scan operations

use serde::{Deserialize, Serialize};

/// The user on whose behalf a scan operation is requested
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub admin_role: bool,
}

impl Principal {
    pub fn new(username: impl Into<String>, admin_role: bool) -> Self {
        Self {
            username: username.into(),
            admin_role,
        }
    }

    pub fn admin(username: impl Into<String>) -> Self {
        Self::new(username, true)
    }
}

/// Scan operations guarded by authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanAction {
    StartScan,
    ReadScanStatus,
}

impl ScanAction {
    /// Human-readable action name used in error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanAction::StartScan => "start media scan",
            ScanAction::ReadScanStatus => "get media scan status",
        }
    }
}

/// Decides whether a principal may perform a scan action
pub trait Authorizer: Send + Sync {
    fn is_allowed(&self, principal: &Principal, action: ScanAction) -> bool;
}

/// Allows every scan action to administrators and nothing to anyone else
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminOnly;

impl Authorizer for AdminOnly {
    fn is_allowed(&self, principal: &Principal, _action: ScanAction) -> bool {
        principal.admin_role
    }
}
