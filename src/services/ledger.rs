//! Commission ledger operations: approval, rejection, listings.
//!
//! Approval credits the payee's wallet through the store's transactional
//! settlement, so the status flip and the credit land together or not at
//! all. Rejection never touches a wallet.

use chrono::Utc;
use tracing::info;

use crate::error::{LedgerError, Result};
use crate::model::{
    AdminId, AdminStamp, CommissionId, CommissionStatus, EmployeeCommission, EmployeeId,
    ReferralCommission, StatusRollup, VendorId,
};
use crate::storage::{CommissionStore, PartyStore, Stores};

/// Outcome of one entry in a batch approval.
#[derive(Debug)]
pub struct BatchOutcome {
    pub commission: CommissionId,
    pub result: Result<EmployeeCommission>,
}

/// Admin-facing commission settlement operations.
pub struct CommissionLedger {
    stores: Stores,
}

impl CommissionLedger {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Approve a pending referral commission: flip to paid and credit the
    /// referrer's wallet.
    pub async fn approve_referral(
        &self,
        id: CommissionId,
        approver: AdminId,
        notes: Option<String>,
    ) -> Result<ReferralCommission> {
        let commission = self
            .stores
            .commissions
            .referral(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("referral commission", id))?;

        let description = match self.stores.parties.vendor(commission.referred_vendor).await? {
            Some(vendor) => match vendor.shop_name {
                Some(shop) => format!("Referral commission for {} ({})", vendor.name, shop),
                None => format!("Referral commission for {}", vendor.name),
            },
            None => "Referral commission".to_string(),
        };

        let stamp = AdminStamp::new(approver, notes);
        let transaction_id = generate_transaction_id(id);
        let settled = self
            .stores
            .commissions
            .settle_referral(id, &stamp, &transaction_id, &description)
            .await?;

        info!(
            commission = %id,
            referrer = %settled.referrer,
            amount = %settled.breakdown.amount,
            "referral commission approved"
        );
        Ok(settled)
    }

    /// Reject a pending referral commission. Balance-neutral.
    pub async fn reject_referral(
        &self,
        id: CommissionId,
        approver: AdminId,
        notes: Option<String>,
    ) -> Result<ReferralCommission> {
        let stamp = AdminStamp::new(approver, notes);
        let rejected = self.stores.commissions.reject_referral(id, &stamp).await?;
        info!(commission = %id, "referral commission rejected");
        Ok(rejected)
    }

    /// Approve a pending employee commission: flip to paid and credit the
    /// super-employee's wallet.
    pub async fn approve_employee(
        &self,
        id: CommissionId,
        approver: AdminId,
        notes: Option<String>,
    ) -> Result<EmployeeCommission> {
        let commission = self
            .stores
            .commissions
            .employee(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("employee commission", id))?;

        let description = match self.stores.parties.vendor(commission.seller).await? {
            Some(seller) => match seller.shop_name {
                Some(shop) => format!("Commission for seller: {} ({})", seller.name, shop),
                None => format!("Commission for seller: {}", seller.name),
            },
            None => "Commission for seller".to_string(),
        };

        let stamp = AdminStamp::new(approver, notes);
        let transaction_id = generate_transaction_id(id);
        let settled = self
            .stores
            .commissions
            .settle_employee(id, &stamp, &transaction_id, &description)
            .await?;

        info!(
            commission = %id,
            employee = %settled.employee,
            amount = %settled.breakdown.amount,
            "employee commission approved"
        );
        Ok(settled)
    }

    /// Reject a pending employee commission. Balance-neutral.
    pub async fn reject_employee(
        &self,
        id: CommissionId,
        approver: AdminId,
        notes: Option<String>,
    ) -> Result<EmployeeCommission> {
        let stamp = AdminStamp::new(approver, notes);
        let rejected = self.stores.commissions.reject_employee(id, &stamp).await?;
        info!(commission = %id, "employee commission rejected");
        Ok(rejected)
    }

    /// Approve a batch of employee commissions, collecting per-id outcomes.
    /// One failure doesn't stop the rest.
    pub async fn approve_employee_batch(
        &self,
        ids: &[CommissionId],
        approver: AdminId,
        notes: Option<String>,
    ) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(ids.len());
        for &id in ids {
            let result = self.approve_employee(id, approver, notes.clone()).await;
            outcomes.push(BatchOutcome {
                commission: id,
                result,
            });
        }
        outcomes
    }

    pub async fn referral(&self, id: CommissionId) -> Result<Option<ReferralCommission>> {
        self.stores.commissions.referral(id).await
    }

    pub async fn employee(&self, id: CommissionId) -> Result<Option<EmployeeCommission>> {
        self.stores.commissions.employee(id).await
    }

    pub async fn list_referrals(
        &self,
        referrer: Option<VendorId>,
        status: Option<CommissionStatus>,
    ) -> Result<Vec<ReferralCommission>> {
        self.stores.commissions.list_referrals(referrer, status).await
    }

    pub async fn list_employee_commissions(
        &self,
        employee: Option<EmployeeId>,
        status: Option<CommissionStatus>,
    ) -> Result<Vec<EmployeeCommission>> {
        self.stores
            .commissions
            .list_employee_commissions(employee, status)
            .await
    }

    pub async fn referral_statistics(&self) -> Result<Vec<StatusRollup>> {
        self.stores.commissions.referral_rollup().await
    }

    pub async fn employee_statistics(
        &self,
        employee: Option<EmployeeId>,
    ) -> Result<Vec<StatusRollup>> {
        self.stores.commissions.employee_rollup(employee).await
    }
}

/// External-facing settlement reference recorded on paid commissions.
fn generate_transaction_id(commission: CommissionId) -> String {
    format!("TXN_{}_{}", Utc::now().timestamp_millis(), commission)
}
