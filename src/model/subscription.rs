//! Subscription records and their lifecycle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{SubscriptionId, VendorId};

/// Fixed set of subscription plans a vendor can purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanTag {
    #[serde(rename = "3months")]
    ThreeMonths,
    #[serde(rename = "6months")]
    SixMonths,
    #[serde(rename = "1year")]
    OneYear,
}

impl PlanTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTag::ThreeMonths => "3months",
            PlanTag::SixMonths => "6months",
            PlanTag::OneYear => "1year",
        }
    }
}

impl fmt::Display for PlanTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "3months" => Ok(PlanTag::ThreeMonths),
            "6months" => Ok(PlanTag::SixMonths),
            "1year" => Ok(PlanTag::OneYear),
            other => Err(format!("unknown plan tag: {other}")),
        }
    }
}

/// Subscription lifecycle states.
///
/// `Expired`, `Cancelled`, and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
    Failed,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Expired | SubscriptionStatus::Cancelled | SubscriptionStatus::Failed
        )
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubscriptionStatus::Pending),
            "active" => Ok(SubscriptionStatus::Active),
            "expired" => Ok(SubscriptionStatus::Expired),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "failed" => Ok(SubscriptionStatus::Failed),
            other => Err(format!("unknown subscription status: {other}")),
        }
    }
}

/// Outcome of a single gateway charge, for the payment history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Success,
    Failed,
    Pending,
}

impl PaymentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOutcome::Success => "success",
            PaymentOutcome::Failed => "failed",
            PaymentOutcome::Pending => "pending",
        }
    }
}

impl FromStr for PaymentOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(PaymentOutcome::Success),
            "failed" => Ok(PaymentOutcome::Failed),
            "pending" => Ok(PaymentOutcome::Pending),
            other => Err(format!("unknown payment outcome: {other}")),
        }
    }
}

/// One entry in a subscription's append-only payment history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub amount: Decimal,
    pub outcome: PaymentOutcome,
    pub gateway_payment_id: Option<String>,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

/// A vendor's purchased subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub vendor: VendorId,
    pub plan: PlanTag,
    pub amount: Decimal,
    pub currency: String,
    pub status: SubscriptionStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// External references assigned by the payment gateway.
    pub gateway_subscription_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub gateway_order_id: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub payment_history: Vec<PaymentRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of subscription state mirrored onto the vendor profile so shop
/// visibility checks don't have to join against the subscriptions table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionSummary {
    pub is_active: bool,
    pub plan: Option<PlanTag>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub gateway_subscription_id: Option<String>,
    pub gateway_payment_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!SubscriptionStatus::Pending.is_terminal());
        assert!(!SubscriptionStatus::Active.is_terminal());
        assert!(SubscriptionStatus::Expired.is_terminal());
        assert!(SubscriptionStatus::Cancelled.is_terminal());
        assert!(SubscriptionStatus::Failed.is_terminal());
    }

    #[test]
    fn test_plan_tag_round_trip() {
        for tag in [PlanTag::ThreeMonths, PlanTag::SixMonths, PlanTag::OneYear] {
            assert_eq!(tag.as_str().parse::<PlanTag>().unwrap(), tag);
        }
        assert!("2weeks".parse::<PlanTag>().is_err());
    }
}
