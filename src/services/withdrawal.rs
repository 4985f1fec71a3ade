//! Withdrawal workflow: owner request, admin approve/reject.
//!
//! Funds are not escrowed at request time; the balance is authoritative at
//! approval, where the debit and the status flip commit together.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::model::{
    AdminId, AdminStamp, PayoutMethod, StatusRollup, VendorId, WalletOwner, WithdrawalId,
    WithdrawalRequest, WithdrawalStatus,
};
use crate::storage::{SettingsStore, Stores, WalletStore, WithdrawalStore};
use crate::validation;

/// Owner- and admin-facing withdrawal operations.
pub struct WithdrawalWorkflow {
    stores: Stores,
}

impl WithdrawalWorkflow {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// File a withdrawal request against the owner's wallet.
    ///
    /// Validates the amount against the withdrawal policy and the current
    /// balance, and the payout method's fields. The request starts pending;
    /// nothing is reserved.
    pub async fn request(
        &self,
        owner: VendorId,
        amount: Decimal,
        method: PayoutMethod,
    ) -> Result<WithdrawalRequest> {
        validation::validate_amount_positive(amount)?;
        validation::validate_payout_method(&method)?;

        let settings = self.stores.settings.settings().await?;
        if amount < settings.withdrawal.minimum_amount {
            return Err(LedgerError::Validation(format!(
                "minimum withdrawal amount is {}",
                settings.withdrawal.minimum_amount
            )));
        }
        if amount > settings.withdrawal.maximum_amount {
            return Err(LedgerError::Validation(format!(
                "maximum withdrawal amount is {}",
                settings.withdrawal.maximum_amount
            )));
        }

        let wallet = self
            .stores
            .wallets
            .wallet(WalletOwner::vendor(owner))
            .await?
            .ok_or_else(|| LedgerError::not_found("wallet", owner))?;
        if amount > wallet.balance {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available: wallet.balance,
            });
        }

        let request = WithdrawalRequest {
            id: Uuid::new_v4(),
            owner,
            amount,
            method,
            status: WithdrawalStatus::Pending,
            requested_at: Utc::now(),
            processed_at: None,
            processed_by: None,
            admin_notes: None,
            transaction_id: None,
        };
        self.stores.withdrawals.insert(&request).await?;

        info!(request = %request.id, owner = %owner, amount = %amount, "withdrawal requested");
        Ok(request)
    }

    /// Approve a pending request: debit the wallet and flip to approved.
    ///
    /// The balance is re-checked now, not at request time; approvals of
    /// requests the balance no longer covers fail with
    /// `InsufficientBalance` and leave the request pending.
    pub async fn approve(
        &self,
        id: WithdrawalId,
        approver: AdminId,
        transaction_id: &str,
        notes: Option<String>,
    ) -> Result<WithdrawalRequest> {
        if transaction_id.trim().is_empty() {
            return Err(LedgerError::MissingTransactionId);
        }

        let stamp = AdminStamp::new(approver, notes);
        let approved = self
            .stores
            .withdrawals
            .approve(id, &stamp, transaction_id.trim())
            .await?;

        info!(
            request = %id,
            owner = %approved.owner,
            amount = %approved.amount,
            "withdrawal approved"
        );
        Ok(approved)
    }

    /// Reject a pending request. Balance-neutral; leaves a zero-amount
    /// audit entry on the wallet.
    pub async fn reject(
        &self,
        id: WithdrawalId,
        approver: AdminId,
        notes: Option<String>,
    ) -> Result<WithdrawalRequest> {
        let stamp = AdminStamp::new(approver, notes);
        let rejected = self.stores.withdrawals.reject(id, &stamp).await?;
        info!(request = %id, "withdrawal rejected");
        Ok(rejected)
    }

    pub async fn get(&self, id: WithdrawalId) -> Result<Option<WithdrawalRequest>> {
        self.stores.withdrawals.get(id).await
    }

    pub async fn list(
        &self,
        owner: Option<VendorId>,
        status: Option<WithdrawalStatus>,
    ) -> Result<Vec<WithdrawalRequest>> {
        self.stores.withdrawals.list(owner, status).await
    }

    pub async fn statistics(&self) -> Result<Vec<StatusRollup>> {
        self.stores.withdrawals.rollup().await
    }
}
