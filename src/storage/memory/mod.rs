//! In-memory storage implementations for testing.
//!
//! One shared state behind a single lock implements every store trait, so
//! multi-record operations (settlement, withdrawal approval) are atomic the
//! same way the SQLite transactions are.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::model::{
    AdminId, AdminStamp, CommissionId, CommissionStatus, EmployeeCommission, EmployeeId,
    EmployeeProfile, EmployeeRole, PaymentRecord, ReferralCommission, ReferralPolicyPatch,
    StatusRollup, Subscription, SubscriptionId, SubscriptionStatus, SubscriptionSummary,
    SystemSettings, TransactionKind, VendorCommissionOverride, VendorId, VendorProfile, Wallet,
    WalletOwner, WalletSummary, WalletTransaction, WithdrawalId, WithdrawalPolicyPatch,
    WithdrawalRequest, WithdrawalStatus,
};
use crate::storage::{
    CommissionStore, PartyStore, SettingsStore, Stores, SubscriptionStore, WalletStore,
    WithdrawalStore,
};

#[derive(Default)]
struct State {
    subscriptions: HashMap<SubscriptionId, Subscription>,
    wallets: HashMap<Uuid, Wallet>,
    referral_commissions: HashMap<CommissionId, ReferralCommission>,
    employee_commissions: HashMap<CommissionId, EmployeeCommission>,
    withdrawals: HashMap<WithdrawalId, WithdrawalRequest>,
    settings: Option<SystemSettings>,
    overrides: HashMap<VendorId, VendorCommissionOverride>,
    vendors: HashMap<VendorId, VendorProfile>,
    employees: HashMap<EmployeeId, EmployeeProfile>,
}

impl State {
    fn wallet_mut(&mut self, owner_id: Uuid) -> Result<&mut Wallet> {
        self.wallets
            .get_mut(&owner_id)
            .ok_or_else(|| LedgerError::not_found("wallet", owner_id))
    }

    fn credit_wallet(
        &mut self,
        owner_id: Uuid,
        amount: Decimal,
        description: &str,
        reference: Option<&str>,
    ) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(
                "credit amount must be greater than zero".into(),
            ));
        }
        let wallet = self.wallet_mut(owner_id)?;
        wallet.balance += amount;
        wallet.transactions.push(WalletTransaction::credit(
            amount,
            description,
            reference.map(String::from),
        ));
        Ok(wallet.balance)
    }

    fn debit_wallet(
        &mut self,
        owner_id: Uuid,
        amount: Decimal,
        description: &str,
        reference: Option<&str>,
    ) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(
                "debit amount must be greater than zero".into(),
            ));
        }
        let wallet = self.wallet_mut(owner_id)?;
        if amount > wallet.balance {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available: wallet.balance,
            });
        }
        wallet.balance -= amount;
        wallet.transactions.push(WalletTransaction::debit(
            amount,
            description,
            reference.map(String::from),
        ));
        Ok(wallet.balance)
    }
}

fn rollup<'a, I>(items: I) -> Vec<StatusRollup>
where
    I: Iterator<Item = (&'a str, Decimal)>,
{
    let mut rollups: Vec<StatusRollup> = Vec::new();
    for (status, amount) in items {
        match rollups.iter_mut().find(|r| r.status == status) {
            Some(rollup) => {
                rollup.count += 1;
                rollup.total_amount += amount;
            }
            None => rollups.push(StatusRollup {
                status: status.to_string(),
                count: 1,
                total_amount: amount,
                average_amount: Decimal::ZERO,
            }),
        }
    }
    for rollup in &mut rollups {
        rollup.average_amount = rollup.total_amount / Decimal::from(rollup.count);
    }
    rollups
}

/// In-memory store set. Cloneable; clones share state.
#[derive(Clone, Default)]
pub struct MemoryStores {
    state: Arc<RwLock<State>>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Package as trait objects for the service layer.
    pub fn into_stores(self) -> Stores {
        let shared = Arc::new(self);
        Stores {
            subscriptions: shared.clone(),
            wallets: shared.clone(),
            commissions: shared.clone(),
            withdrawals: shared.clone(),
            settings: shared.clone(),
            parties: shared,
        }
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStores {
    async fn insert(&self, subscription: &Subscription) -> Result<()> {
        self.state
            .write()
            .await
            .subscriptions
            .insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>> {
        Ok(self.state.read().await.subscriptions.get(&id).cloned())
    }

    async fn find_by_gateway_subscription(&self, gateway_id: &str) -> Result<Option<Subscription>> {
        Ok(self
            .state
            .read()
            .await
            .subscriptions
            .values()
            .find(|s| s.gateway_subscription_id.as_deref() == Some(gateway_id))
            .cloned())
    }

    async fn find_by_gateway_payment(&self, payment_id: &str) -> Result<Option<Subscription>> {
        Ok(self
            .state
            .read()
            .await
            .subscriptions
            .values()
            .find(|s| s.gateway_payment_id.as_deref() == Some(payment_id))
            .cloned())
    }

    async fn activate(
        &self,
        id: SubscriptionId,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        gateway_payment_id: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let subscription = state
            .subscriptions
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("subscription", id))?;
        subscription.status = SubscriptionStatus::Active;
        subscription.start_date = Some(start_date);
        subscription.end_date = Some(end_date);
        if let Some(payment_id) = gateway_payment_id {
            subscription.gateway_payment_id = Some(payment_id.to_string());
        }
        subscription.updated_at = Utc::now();
        Ok(())
    }

    async fn cancel(&self, id: SubscriptionId, cancelled_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        let subscription = state
            .subscriptions
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("subscription", id))?;
        subscription.status = SubscriptionStatus::Cancelled;
        subscription.cancelled_at = Some(cancelled_at);
        subscription.updated_at = Utc::now();
        Ok(())
    }

    async fn fail(&self, id: SubscriptionId) -> Result<()> {
        let mut state = self.state.write().await;
        let subscription = state
            .subscriptions
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("subscription", id))?;
        subscription.status = SubscriptionStatus::Failed;
        subscription.updated_at = Utc::now();
        Ok(())
    }

    async fn append_payment(&self, id: SubscriptionId, record: &PaymentRecord) -> Result<()> {
        let mut state = self.state.write().await;
        let subscription = state
            .subscriptions
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("subscription", id))?;
        subscription.payment_history.push(record.clone());
        Ok(())
    }
}

#[async_trait]
impl WalletStore for MemoryStores {
    async fn ensure(&self, owner: WalletOwner) -> Result<()> {
        self.state
            .write()
            .await
            .wallets
            .entry(owner.id)
            .or_insert_with(|| Wallet {
                balance: Decimal::ZERO,
                transactions: Vec::new(),
            });
        Ok(())
    }

    async fn credit(
        &self,
        owner: WalletOwner,
        amount: Decimal,
        description: &str,
        reference: Option<&str>,
    ) -> Result<Decimal> {
        self.state
            .write()
            .await
            .credit_wallet(owner.id, amount, description, reference)
    }

    async fn debit(
        &self,
        owner: WalletOwner,
        amount: Decimal,
        description: &str,
        reference: Option<&str>,
    ) -> Result<Decimal> {
        self.state
            .write()
            .await
            .debit_wallet(owner.id, amount, description, reference)
    }

    async fn record_audit(&self, owner: WalletOwner, description: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let wallet = state.wallet_mut(owner.id)?;
        wallet
            .transactions
            .push(WalletTransaction::credit(Decimal::ZERO, description, None));
        Ok(())
    }

    async fn wallet(&self, owner: WalletOwner) -> Result<Option<Wallet>> {
        Ok(self.state.read().await.wallets.get(&owner.id).cloned())
    }

    async fn summary(&self, owner: WalletOwner, recent: usize) -> Result<Option<WalletSummary>> {
        let state = self.state.read().await;
        let Some(wallet) = state.wallets.get(&owner.id) else {
            return Ok(None);
        };

        let mut total_credits = Decimal::ZERO;
        let mut total_debits = Decimal::ZERO;
        for t in &wallet.transactions {
            match t.kind {
                TransactionKind::Credit => total_credits += t.amount,
                TransactionKind::Debit => total_debits += t.amount,
            }
        }

        Ok(Some(WalletSummary {
            balance: wallet.balance,
            total_credits,
            total_debits,
            transaction_count: wallet.transactions.len(),
            recent_transactions: wallet.transactions.iter().rev().take(recent).cloned().collect(),
        }))
    }
}

#[async_trait]
impl CommissionStore for MemoryStores {
    async fn insert_referral(&self, commission: &ReferralCommission) -> Result<bool> {
        let mut state = self.state.write().await;
        let duplicate = state.referral_commissions.values().any(|c| {
            c.referrer == commission.referrer && c.subscription == commission.subscription
        });
        if duplicate {
            return Ok(false);
        }
        state
            .referral_commissions
            .insert(commission.id, commission.clone());
        Ok(true)
    }

    async fn insert_employee(&self, commission: &EmployeeCommission) -> Result<bool> {
        let mut state = self.state.write().await;
        let duplicate = state.employee_commissions.values().any(|c| {
            c.employee == commission.employee
                && c.seller == commission.seller
                && c.subscription == commission.subscription
        });
        if duplicate {
            return Ok(false);
        }
        state
            .employee_commissions
            .insert(commission.id, commission.clone());
        Ok(true)
    }

    async fn referral(&self, id: CommissionId) -> Result<Option<ReferralCommission>> {
        Ok(self.state.read().await.referral_commissions.get(&id).cloned())
    }

    async fn employee(&self, id: CommissionId) -> Result<Option<EmployeeCommission>> {
        Ok(self.state.read().await.employee_commissions.get(&id).cloned())
    }

    async fn settle_referral(
        &self,
        id: CommissionId,
        stamp: &AdminStamp,
        transaction_id: &str,
        wallet_description: &str,
    ) -> Result<ReferralCommission> {
        let mut state = self.state.write().await;

        let commission = state
            .referral_commissions
            .get(&id)
            .ok_or_else(|| LedgerError::not_found("referral commission", id))?;
        if commission.status != CommissionStatus::Pending {
            return Err(LedgerError::InvalidState(
                "commission has already been processed".into(),
            ));
        }
        let referrer = commission.referrer;
        let amount = commission.breakdown.amount;

        // Credit before flipping so a missing wallet leaves the record
        // pending, mirroring the transactional rollback.
        state.credit_wallet(referrer, amount, wallet_description, Some(&id.to_string()))?;

        let commission = state
            .referral_commissions
            .get_mut(&id)
            .expect("checked above");
        commission.status = CommissionStatus::Paid;
        commission.payment.paid_at = Some(stamp.processed_at);
        commission.payment.transaction_id = Some(transaction_id.to_string());
        commission.admin = Some(stamp.clone());
        commission.updated_at = Utc::now();
        Ok(commission.clone())
    }

    async fn settle_employee(
        &self,
        id: CommissionId,
        stamp: &AdminStamp,
        transaction_id: &str,
        wallet_description: &str,
    ) -> Result<EmployeeCommission> {
        let mut state = self.state.write().await;

        let commission = state
            .employee_commissions
            .get(&id)
            .ok_or_else(|| LedgerError::not_found("employee commission", id))?;
        if commission.status != CommissionStatus::Pending {
            return Err(LedgerError::InvalidState(
                "commission has already been processed".into(),
            ));
        }
        let employee = commission.employee;
        let amount = commission.breakdown.amount;

        state.credit_wallet(employee, amount, wallet_description, Some(&id.to_string()))?;

        if let Some(profile) = state.employees.get_mut(&employee) {
            profile.total_commission_earned += amount;
            profile.last_commission_at = Some(Utc::now());
        }

        let commission = state
            .employee_commissions
            .get_mut(&id)
            .expect("checked above");
        commission.status = CommissionStatus::Paid;
        commission.payment.paid_at = Some(stamp.processed_at);
        commission.payment.transaction_id = Some(transaction_id.to_string());
        commission.admin = Some(stamp.clone());
        commission.updated_at = Utc::now();
        Ok(commission.clone())
    }

    async fn reject_referral(
        &self,
        id: CommissionId,
        stamp: &AdminStamp,
    ) -> Result<ReferralCommission> {
        let mut state = self.state.write().await;
        let commission = state
            .referral_commissions
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("referral commission", id))?;
        if commission.status != CommissionStatus::Pending {
            return Err(LedgerError::InvalidState(
                "commission has already been processed".into(),
            ));
        }
        commission.status = CommissionStatus::Cancelled;
        commission.admin = Some(stamp.clone());
        commission.updated_at = Utc::now();
        Ok(commission.clone())
    }

    async fn reject_employee(
        &self,
        id: CommissionId,
        stamp: &AdminStamp,
    ) -> Result<EmployeeCommission> {
        let mut state = self.state.write().await;
        let commission = state
            .employee_commissions
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("employee commission", id))?;
        if commission.status != CommissionStatus::Pending {
            return Err(LedgerError::InvalidState(
                "commission has already been processed".into(),
            ));
        }
        commission.status = CommissionStatus::Cancelled;
        commission.admin = Some(stamp.clone());
        commission.updated_at = Utc::now();
        Ok(commission.clone())
    }

    async fn list_referrals(
        &self,
        referrer: Option<VendorId>,
        status: Option<CommissionStatus>,
    ) -> Result<Vec<ReferralCommission>> {
        let state = self.state.read().await;
        let mut commissions: Vec<_> = state
            .referral_commissions
            .values()
            .filter(|c| referrer.map_or(true, |r| c.referrer == r))
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        commissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(commissions)
    }

    async fn list_employee_commissions(
        &self,
        employee: Option<EmployeeId>,
        status: Option<CommissionStatus>,
    ) -> Result<Vec<EmployeeCommission>> {
        let state = self.state.read().await;
        let mut commissions: Vec<_> = state
            .employee_commissions
            .values()
            .filter(|c| employee.map_or(true, |e| c.employee == e))
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        commissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(commissions)
    }

    async fn referral_rollup(&self) -> Result<Vec<StatusRollup>> {
        let state = self.state.read().await;
        Ok(rollup(
            state
                .referral_commissions
                .values()
                .map(|c| (c.status.as_str(), c.breakdown.amount)),
        ))
    }

    async fn employee_rollup(&self, employee: Option<EmployeeId>) -> Result<Vec<StatusRollup>> {
        let state = self.state.read().await;
        Ok(rollup(
            state
                .employee_commissions
                .values()
                .filter(|c| employee.map_or(true, |e| c.employee == e))
                .map(|c| (c.status.as_str(), c.breakdown.amount)),
        ))
    }
}

#[async_trait]
impl WithdrawalStore for MemoryStores {
    async fn insert(&self, request: &WithdrawalRequest) -> Result<()> {
        self.state
            .write()
            .await
            .withdrawals
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn get(&self, id: WithdrawalId) -> Result<Option<WithdrawalRequest>> {
        Ok(self.state.read().await.withdrawals.get(&id).cloned())
    }

    async fn approve(
        &self,
        id: WithdrawalId,
        stamp: &AdminStamp,
        transaction_id: &str,
    ) -> Result<WithdrawalRequest> {
        let mut state = self.state.write().await;

        let request = state
            .withdrawals
            .get(&id)
            .ok_or_else(|| LedgerError::not_found("withdrawal request", id))?;
        if request.status != WithdrawalStatus::Pending {
            return Err(LedgerError::InvalidState(
                "withdrawal request has already been processed".into(),
            ));
        }
        let owner = request.owner;
        let amount = request.amount;
        let description = format!(
            "Withdrawal processed via {}",
            request.method.as_str().to_uppercase()
        );

        // The balance check happens here, at approval time; a failure leaves
        // the request pending.
        state.debit_wallet(owner, amount, &description, Some(&id.to_string()))?;

        let request = state.withdrawals.get_mut(&id).expect("checked above");
        request.status = WithdrawalStatus::Approved;
        request.processed_at = Some(stamp.processed_at);
        request.processed_by = Some(stamp.processed_by);
        request.admin_notes = stamp.notes.clone();
        request.transaction_id = Some(transaction_id.to_string());
        Ok(request.clone())
    }

    async fn reject(&self, id: WithdrawalId, stamp: &AdminStamp) -> Result<WithdrawalRequest> {
        let mut state = self.state.write().await;

        let request = state
            .withdrawals
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("withdrawal request", id))?;
        if request.status != WithdrawalStatus::Pending {
            return Err(LedgerError::InvalidState(
                "withdrawal request has already been processed".into(),
            ));
        }
        request.status = WithdrawalStatus::Rejected;
        request.processed_at = Some(stamp.processed_at);
        request.processed_by = Some(stamp.processed_by);
        request.admin_notes = stamp.notes.clone();
        let owner = request.owner;
        let request = request.clone();

        let description = format!(
            "Withdrawal request rejected: {}",
            stamp.notes.as_deref().unwrap_or("No reason provided")
        );
        if let Ok(wallet) = state.wallet_mut(owner) {
            wallet.transactions.push(WalletTransaction::credit(
                Decimal::ZERO,
                description,
                Some(id.to_string()),
            ));
        }
        Ok(request)
    }

    async fn list(
        &self,
        owner: Option<VendorId>,
        status: Option<WithdrawalStatus>,
    ) -> Result<Vec<WithdrawalRequest>> {
        let state = self.state.read().await;
        let mut requests: Vec<_> = state
            .withdrawals
            .values()
            .filter(|r| owner.map_or(true, |o| r.owner == o))
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(requests)
    }

    async fn rollup(&self) -> Result<Vec<StatusRollup>> {
        let state = self.state.read().await;
        Ok(rollup(
            state
                .withdrawals
                .values()
                .map(|r| (r.status.as_str(), r.amount)),
        ))
    }
}

#[async_trait]
impl SettingsStore for MemoryStores {
    async fn settings(&self) -> Result<SystemSettings> {
        let mut state = self.state.write().await;
        Ok(state
            .settings
            .get_or_insert_with(SystemSettings::default)
            .clone())
    }

    async fn update_referral_policy(
        &self,
        patch: &ReferralPolicyPatch,
        admin: AdminId,
    ) -> Result<SystemSettings> {
        let mut state = self.state.write().await;
        let settings = state.settings.get_or_insert_with(SystemSettings::default);
        if let Some(percentage) = patch.percentage {
            settings.referral.percentage = percentage;
        }
        if let Some(is_active) = patch.is_active {
            settings.referral.is_active = is_active;
        }
        if let Some(minimum) = patch.minimum_subscription_amount {
            settings.referral.minimum_subscription_amount = minimum;
        }
        if let Some(maximum) = patch.maximum_commission_per_referral {
            settings.referral.maximum_commission_per_referral = maximum;
        }
        settings.updated_by = Some(admin);
        settings.updated_at = Some(Utc::now());
        Ok(settings.clone())
    }

    async fn update_withdrawal_policy(
        &self,
        patch: &WithdrawalPolicyPatch,
        admin: AdminId,
    ) -> Result<SystemSettings> {
        let mut state = self.state.write().await;
        let settings = state.settings.get_or_insert_with(SystemSettings::default);
        if let Some(minimum) = patch.minimum_amount {
            settings.withdrawal.minimum_amount = minimum;
        }
        if let Some(maximum) = patch.maximum_amount {
            settings.withdrawal.maximum_amount = maximum;
        }
        settings.updated_by = Some(admin);
        settings.updated_at = Some(Utc::now());
        Ok(settings.clone())
    }

    async fn vendor_override(&self, vendor: VendorId) -> Result<Option<VendorCommissionOverride>> {
        Ok(self
            .state
            .read()
            .await
            .overrides
            .get(&vendor)
            .filter(|o| o.is_active)
            .cloned())
    }

    async fn set_vendor_override(
        &self,
        vendor: VendorId,
        percentage: Decimal,
        admin: AdminId,
        notes: Option<&str>,
    ) -> Result<VendorCommissionOverride> {
        let now = Utc::now();
        let record = VendorCommissionOverride {
            vendor,
            percentage,
            is_custom: percentage
                != Decimal::from(crate::model::DEFAULT_VENDOR_COMMISSION_PERCENT),
            is_active: true,
            set_by: admin,
            notes: notes.map(String::from),
            created_at: now,
            updated_at: now,
        };
        self.state
            .write()
            .await
            .overrides
            .insert(vendor, record.clone());
        Ok(record)
    }
}

#[async_trait]
impl PartyStore for MemoryStores {
    async fn insert_vendor(&self, vendor: &VendorProfile) -> Result<()> {
        let mut state = self.state.write().await;
        state.vendors.insert(vendor.id, vendor.clone());
        state.wallets.entry(vendor.id).or_insert_with(|| Wallet {
            balance: Decimal::ZERO,
            transactions: Vec::new(),
        });
        Ok(())
    }

    async fn insert_employee(&self, employee: &EmployeeProfile) -> Result<()> {
        let mut state = self.state.write().await;
        state.employees.insert(employee.id, employee.clone());
        if employee.role == EmployeeRole::SuperEmployee {
            state.wallets.entry(employee.id).or_insert_with(|| Wallet {
                balance: Decimal::ZERO,
                transactions: Vec::new(),
            });
        }
        Ok(())
    }

    async fn vendor(&self, id: VendorId) -> Result<Option<VendorProfile>> {
        Ok(self.state.read().await.vendors.get(&id).cloned())
    }

    async fn employee(&self, id: EmployeeId) -> Result<Option<EmployeeProfile>> {
        Ok(self.state.read().await.employees.get(&id).cloned())
    }

    async fn update_vendor_subscription(
        &self,
        vendor: VendorId,
        summary: &SubscriptionSummary,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let profile = state
            .vendors
            .get_mut(&vendor)
            .ok_or_else(|| LedgerError::not_found("vendor", vendor))?;
        profile.subscription = summary.clone();
        Ok(())
    }

    async fn deactivate_vendor_subscription(&self, vendor: VendorId) -> Result<()> {
        let mut state = self.state.write().await;
        let profile = state
            .vendors
            .get_mut(&vendor)
            .ok_or_else(|| LedgerError::not_found("vendor", vendor))?;
        profile.subscription.is_active = false;
        Ok(())
    }

    async fn record_seller_assignment(&self, employees: &[EmployeeId]) -> Result<()> {
        let mut state = self.state.write().await;
        for id in employees {
            if let Some(profile) = state.employees.get_mut(id) {
                profile.total_sellers_assigned += 1;
            }
        }
        Ok(())
    }
}
