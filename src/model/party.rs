//! Parties that hold wallets or earn commissions.
//!
//! The wallet-owner capability is a tagged id rather than a runtime
//! field-presence check: vendors and super-employees own wallets, regular
//! employees never do.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{EmployeeId, SubscriptionSummary, VendorId};

/// Which kind of party owns a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    Vendor,
    SuperEmployee,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::Vendor => "vendor",
            OwnerKind::SuperEmployee => "super_employee",
        }
    }
}

impl FromStr for OwnerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vendor" => Ok(OwnerKind::Vendor),
            "super_employee" => Ok(OwnerKind::SuperEmployee),
            other => Err(format!("unknown owner kind: {other}")),
        }
    }
}

/// A wallet-owning party: the id plus its kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletOwner {
    pub id: Uuid,
    pub kind: OwnerKind,
}

impl WalletOwner {
    pub fn vendor(id: VendorId) -> Self {
        Self {
            id,
            kind: OwnerKind::Vendor,
        }
    }

    pub fn super_employee(id: EmployeeId) -> Self {
        Self {
            id,
            kind: OwnerKind::SuperEmployee,
        }
    }
}

impl fmt::Display for WalletOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Employee hierarchy roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeRole {
    Employee,
    SuperEmployee,
}

impl EmployeeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeRole::Employee => "employee",
            EmployeeRole::SuperEmployee => "super_employee",
        }
    }
}

impl FromStr for EmployeeRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "employee" => Ok(EmployeeRole::Employee),
            "super_employee" => Ok(EmployeeRole::SuperEmployee),
            other => Err(format!("unknown employee role: {other}")),
        }
    }
}

/// The vendor fields the settlement core reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorProfile {
    pub id: VendorId,
    pub name: String,
    pub shop_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub referral_code: Option<String>,
    /// The vendor whose referral code was used at signup, if any.
    pub referred_by: Option<VendorId>,
    pub assigned_employee: Option<EmployeeId>,
    pub subscription: SubscriptionSummary,
}

/// Per-super-employee commission configuration, used when sellers are
/// assigned to the super-employee directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionSettings {
    pub percentage: Decimal,
    pub is_active: bool,
}

/// The employee fields the settlement core reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub id: EmployeeId,
    pub name: String,
    pub employee_code: String,
    pub role: EmployeeRole,
    /// Set for regular employees; the super-employee they roll up to.
    pub super_employee: Option<EmployeeId>,
    /// Rate applied to subscriptions of sellers assigned to this regular
    /// employee. The resulting credit lands in the super-employee's wallet.
    pub employee_commission_percentage: Decimal,
    /// Super-employee configuration; ignored for regular employees.
    pub commission_settings: CommissionSettings,
    pub total_sellers_assigned: u64,
    pub total_commission_earned: Decimal,
    pub last_commission_at: Option<DateTime<Utc>>,
}
