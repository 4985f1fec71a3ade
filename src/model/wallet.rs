//! Wallet: balance plus append-only transaction log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::TransactionId;

/// Direction of a wallet ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(TransactionKind::Credit),
            "debit" => Ok(TransactionKind::Debit),
            other => Err(format!("unknown transaction kind: {other}")),
        }
    }
}

/// One entry in the wallet's ledger. Entries are append-only; amounts are
/// positive except for zero-amount audit records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: String,
    /// Optional link to the record that caused this entry (commission id,
    /// withdrawal id).
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn credit(amount: Decimal, description: impl Into<String>, reference: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TransactionKind::Credit,
            amount,
            description: description.into(),
            reference,
            created_at: Utc::now(),
        }
    }

    pub fn debit(amount: Decimal, description: impl Into<String>, reference: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TransactionKind::Debit,
            amount,
            description: description.into(),
            reference,
            created_at: Utc::now(),
        }
    }
}

/// A party's wallet: derived balance plus the full ordered ledger.
///
/// Invariant: `balance == Σ credits − Σ debits` and `balance >= 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub balance: Decimal,
    pub transactions: Vec<WalletTransaction>,
}

impl Wallet {
    /// Recompute the balance from the ledger. Used by tests and consistency
    /// checks; the stored balance is authoritative at runtime.
    pub fn derived_balance(&self) -> Decimal {
        self.transactions.iter().fold(Decimal::ZERO, |acc, t| match t.kind {
            TransactionKind::Credit => acc + t.amount,
            TransactionKind::Debit => acc - t.amount,
        })
    }
}

/// Aggregated view of a wallet for owner dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSummary {
    pub balance: Decimal,
    pub total_credits: Decimal,
    pub total_debits: Decimal,
    pub transaction_count: usize,
    /// Most recent entries, newest first.
    pub recent_transactions: Vec<WalletTransaction>,
}
