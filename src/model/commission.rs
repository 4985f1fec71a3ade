//! Commission ledger records.
//!
//! Two parallel record types represent a computed-but-not-yet-settled (or
//! settled) obligation tied to exactly one (payee, subscription) pair. Both
//! follow the same state machine: `pending → paid` on approval,
//! `pending → cancelled` on rejection, no transition out of either terminal
//! state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{AdminId, CommissionId, EmployeeId, PlanTag, SubscriptionId, VendorId};

/// Commission settlement states.
///
/// `Refunded` exists for referral records only; no operation currently
/// produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,
    Paid,
    Cancelled,
    Refunded,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Paid => "paid",
            CommissionStatus::Cancelled => "cancelled",
            CommissionStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for CommissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CommissionStatus::Pending),
            "paid" => Ok(CommissionStatus::Paid),
            "cancelled" => Ok(CommissionStatus::Cancelled),
            "refunded" => Ok(CommissionStatus::Refunded),
            other => Err(format!("unknown commission status: {other}")),
        }
    }
}

/// How the commission amount was computed, frozen at calculation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    pub percentage: Decimal,
    pub amount: Decimal,
    /// The subscription amount the percentage was applied to.
    pub subscription_amount: Decimal,
}

/// Settlement evidence, populated when the record transitions to `paid`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentStamp {
    pub paid_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
}

/// Who processed the record and when, for audit attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminStamp {
    pub processed_by: AdminId,
    pub processed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl AdminStamp {
    pub fn new(processed_by: AdminId, notes: Option<String>) -> Self {
        Self {
            processed_by,
            processed_at: Utc::now(),
            notes,
        }
    }
}

/// District attribution for employee commissions, taken from the seller's
/// address at calculation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct District {
    pub name: String,
    pub state: String,
}

impl District {
    /// Sellers without an address still earn their employee a commission.
    pub fn unknown() -> Self {
        Self {
            name: "Unknown".to_string(),
            state: "Unknown".to_string(),
        }
    }
}

/// Validity window mirroring the subscription that earned the commission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Period {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Commission owed to the vendor whose referral code the subscribing vendor
/// used at signup. At most one exists per (referrer, subscription).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralCommission {
    pub id: CommissionId,
    pub referrer: VendorId,
    pub referred_vendor: VendorId,
    pub referral_code: String,
    pub breakdown: CommissionBreakdown,
    pub currency: String,
    pub plan: PlanTag,
    pub subscription: SubscriptionId,
    pub status: CommissionStatus,
    pub payment: PaymentStamp,
    pub admin: Option<AdminStamp>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Commission owed to a super-employee for a subscription sold by a vendor in
/// its hierarchy. At most one exists per (employee, seller, subscription).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeCommission {
    pub id: CommissionId,
    /// The payee. Always a super-employee; regular employees roll up.
    pub employee: EmployeeId,
    pub seller: VendorId,
    pub subscription: SubscriptionId,
    pub breakdown: CommissionBreakdown,
    pub status: CommissionStatus,
    pub district: District,
    pub period: Period,
    pub payment: PaymentStamp,
    pub admin: Option<AdminStamp>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-status aggregate used by admin dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRollup {
    pub status: String,
    pub count: u64,
    pub total_amount: Decimal,
    pub average_amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            CommissionStatus::Pending,
            CommissionStatus::Paid,
            CommissionStatus::Cancelled,
            CommissionStatus::Refunded,
        ] {
            assert_eq!(status.as_str().parse::<CommissionStatus>().unwrap(), status);
        }
    }
}
