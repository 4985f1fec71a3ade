//! System settings and per-vendor commission overrides.
//!
//! Settings are runtime data held by the settings store and injected into
//! the calculator per operation; there is no globally reachable singleton.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AdminId, VendorId};

/// Fallback referral percentage when no settings row and no override exist.
pub const DEFAULT_VENDOR_COMMISSION_PERCENT: u32 = 10;

/// Referral commission policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralPolicy {
    /// Percentage of the subscription amount paid to the referrer.
    pub percentage: Decimal,
    /// Master switch; inactive policy creates no commissions.
    pub is_active: bool,
    /// Subscriptions below this amount earn no referral commission.
    pub minimum_subscription_amount: Decimal,
    /// Cap applied to a single referral's commission.
    pub maximum_commission_per_referral: Decimal,
}

impl Default for ReferralPolicy {
    fn default() -> Self {
        Self {
            percentage: Decimal::from(3),
            is_active: true,
            minimum_subscription_amount: Decimal::from(100),
            maximum_commission_per_referral: Decimal::from(1000),
        }
    }
}

/// Withdrawal policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalPolicy {
    pub minimum_amount: Decimal,
    pub maximum_amount: Decimal,
}

impl Default for WithdrawalPolicy {
    fn default() -> Self {
        Self {
            minimum_amount: Decimal::from(100),
            maximum_amount: Decimal::from(50_000),
        }
    }
}

/// The settings singleton. Created with defaults on first read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemSettings {
    pub referral: ReferralPolicy,
    pub withdrawal: WithdrawalPolicy,
    pub updated_by: Option<AdminId>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial update for the referral policy. `None` fields are left as-is.
#[derive(Debug, Clone, Default)]
pub struct ReferralPolicyPatch {
    pub percentage: Option<Decimal>,
    pub is_active: Option<bool>,
    pub minimum_subscription_amount: Option<Decimal>,
    pub maximum_commission_per_referral: Option<Decimal>,
}

/// Partial update for the withdrawal policy.
#[derive(Debug, Clone, Default)]
pub struct WithdrawalPolicyPatch {
    pub minimum_amount: Option<Decimal>,
    pub maximum_amount: Option<Decimal>,
}

/// Admin-set override of the referral percentage for one vendor's referrals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorCommissionOverride {
    pub vendor: VendorId,
    pub percentage: Decimal,
    /// True when the percentage differs from the 10% base rate.
    pub is_custom: bool,
    pub is_active: bool,
    pub set_by: AdminId,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
