//! Withdrawal requests: the wallet owner's ask to convert balance into an
//! external payout, gated by admin approval.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{AdminId, VendorId, WithdrawalId};

/// Withdrawal lifecycle. `Approved` and `Rejected` are both final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WithdrawalStatus::Pending),
            "approved" => Ok(WithdrawalStatus::Approved),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            other => Err(format!("unknown withdrawal status: {other}")),
        }
    }
}

/// Bank transfer coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub account_number: String,
    pub ifsc_code: String,
    pub account_holder_name: String,
    pub bank_name: String,
}

/// Where an approved withdrawal is paid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum PayoutMethod {
    Upi { upi_id: String },
    Bank(BankAccount),
}

impl PayoutMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutMethod::Upi { .. } => "upi",
            PayoutMethod::Bank(_) => "bank",
        }
    }
}

/// A single cash-out request against a vendor's wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: WithdrawalId,
    pub owner: VendorId,
    pub amount: Decimal,
    pub method: PayoutMethod,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<AdminId>,
    pub admin_notes: Option<String>,
    /// External payout reference, required on approval.
    pub transaction_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_method_tag() {
        let upi = PayoutMethod::Upi {
            upi_id: "vendor@upi".into(),
        };
        assert_eq!(upi.as_str(), "upi");

        let bank = PayoutMethod::Bank(BankAccount {
            account_number: "123456789012".into(),
            ifsc_code: "HDFC0001234".into(),
            account_holder_name: "A Vendor".into(),
            bank_name: "HDFC".into(),
        });
        assert_eq!(bank.as_str(), "bank");
    }

    #[test]
    fn test_request_starts_pending() {
        let req = WithdrawalRequest {
            id: Uuid::new_v4(),
            owner: Uuid::new_v4(),
            amount: Decimal::new(500, 0),
            method: PayoutMethod::Upi {
                upi_id: "vendor@upi".into(),
            },
            status: WithdrawalStatus::Pending,
            requested_at: Utc::now(),
            processed_at: None,
            processed_by: None,
            admin_notes: None,
            transaction_id: None,
        };
        assert_eq!(req.status, WithdrawalStatus::Pending);
        assert!(req.transaction_id.is_none());
    }
}
