//! Storage interfaces and implementations.
//!
//! Every invariant-bearing transition lives behind these traits as a single
//! atomic operation: conditional status flips that report whether they
//! matched, and wallet mutations that adjust the balance and append the
//! ledger entry together. Services compose lookups and validation around
//! them but never split a transition across calls.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::Result;
use crate::model::{
    AdminId, AdminStamp, CommissionId, CommissionStatus, EmployeeCommission, EmployeeId,
    EmployeeProfile, PaymentRecord, ReferralCommission, ReferralPolicyPatch, StatusRollup,
    Subscription, SubscriptionId, SubscriptionSummary, SystemSettings, VendorCommissionOverride,
    VendorId, VendorProfile, Wallet, WalletOwner, WalletSummary, WithdrawalId, WithdrawalPolicyPatch,
    WithdrawalRequest, WithdrawalStatus,
};

pub mod memory;
pub mod schema;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStores;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStores;

/// Subscription record persistence.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn insert(&self, subscription: &Subscription) -> Result<()>;

    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>>;

    /// Look up by the gateway's subscription reference.
    async fn find_by_gateway_subscription(&self, gateway_id: &str) -> Result<Option<Subscription>>;

    /// Look up by the gateway's payment reference.
    async fn find_by_gateway_payment(&self, payment_id: &str) -> Result<Option<Subscription>>;

    /// Transition to active with the activation window and payment id.
    async fn activate(
        &self,
        id: SubscriptionId,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        gateway_payment_id: Option<&str>,
    ) -> Result<()>;

    /// Transition to cancelled.
    async fn cancel(&self, id: SubscriptionId, cancelled_at: DateTime<Utc>) -> Result<()>;

    /// Transition to failed.
    async fn fail(&self, id: SubscriptionId) -> Result<()>;

    /// Append to the payment history. Never rewrites existing entries.
    async fn append_payment(&self, id: SubscriptionId, record: &PaymentRecord) -> Result<()>;
}

/// Wallet persistence. One wallet per owning party.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Create an empty wallet if the owner has none.
    async fn ensure(&self, owner: WalletOwner) -> Result<()>;

    /// Append a credit and raise the balance. Returns the new balance.
    async fn credit(
        &self,
        owner: WalletOwner,
        amount: Decimal,
        description: &str,
        reference: Option<&str>,
    ) -> Result<Decimal>;

    /// Append a debit and lower the balance. Fails with
    /// `InsufficientBalance` when `amount` exceeds the balance; the balance
    /// is never clamped. Returns the new balance.
    async fn debit(
        &self,
        owner: WalletOwner,
        amount: Decimal,
        description: &str,
        reference: Option<&str>,
    ) -> Result<Decimal>;

    /// Append a zero-amount entry for audit trails; the balance is
    /// untouched.
    async fn record_audit(&self, owner: WalletOwner, description: &str) -> Result<()>;

    async fn wallet(&self, owner: WalletOwner) -> Result<Option<Wallet>>;

    /// Aggregate view with the `recent` newest transactions.
    async fn summary(&self, owner: WalletOwner, recent: usize) -> Result<Option<WalletSummary>>;
}

/// Commission ledger persistence for both record types.
#[async_trait]
pub trait CommissionStore: Send + Sync {
    /// Insert a pending referral commission. Returns false (and inserts
    /// nothing) when a record already exists for the same
    /// (referrer, subscription) pair.
    async fn insert_referral(&self, commission: &ReferralCommission) -> Result<bool>;

    /// Insert a pending employee commission. Returns false when a record
    /// already exists for the same (employee, seller, subscription) triple.
    async fn insert_employee(&self, commission: &EmployeeCommission) -> Result<bool>;

    async fn referral(&self, id: CommissionId) -> Result<Option<ReferralCommission>>;

    async fn employee(&self, id: CommissionId) -> Result<Option<EmployeeCommission>>;

    /// Flip a pending referral commission to paid and credit the referrer's
    /// wallet, in one atomic scope. Fails with `InvalidState` when the
    /// record is not pending; the wallet is then untouched.
    async fn settle_referral(
        &self,
        id: CommissionId,
        stamp: &AdminStamp,
        transaction_id: &str,
        wallet_description: &str,
    ) -> Result<ReferralCommission>;

    /// Flip a pending employee commission to paid, credit the
    /// super-employee's wallet, and update its earning statistics, in one
    /// atomic scope.
    async fn settle_employee(
        &self,
        id: CommissionId,
        stamp: &AdminStamp,
        transaction_id: &str,
        wallet_description: &str,
    ) -> Result<EmployeeCommission>;

    /// Flip a pending referral commission to cancelled. No wallet mutation.
    async fn reject_referral(&self, id: CommissionId, stamp: &AdminStamp)
        -> Result<ReferralCommission>;

    /// Flip a pending employee commission to cancelled. No wallet mutation.
    async fn reject_employee(&self, id: CommissionId, stamp: &AdminStamp)
        -> Result<EmployeeCommission>;

    /// Newest-first listing, optionally scoped to a referrer and/or status.
    async fn list_referrals(
        &self,
        referrer: Option<VendorId>,
        status: Option<CommissionStatus>,
    ) -> Result<Vec<ReferralCommission>>;

    /// Newest-first listing, optionally scoped to an employee and/or status.
    async fn list_employee_commissions(
        &self,
        employee: Option<EmployeeId>,
        status: Option<CommissionStatus>,
    ) -> Result<Vec<EmployeeCommission>>;

    /// Per-status {count, total, average} across referral commissions.
    async fn referral_rollup(&self) -> Result<Vec<StatusRollup>>;

    /// Per-status rollup across employee commissions, optionally scoped to
    /// one employee.
    async fn employee_rollup(&self, employee: Option<EmployeeId>) -> Result<Vec<StatusRollup>>;
}

/// Withdrawal request persistence.
#[async_trait]
pub trait WithdrawalStore: Send + Sync {
    async fn insert(&self, request: &WithdrawalRequest) -> Result<()>;

    async fn get(&self, id: WithdrawalId) -> Result<Option<WithdrawalRequest>>;

    /// Flip a pending request to approved and debit the owner's wallet in
    /// one atomic scope. `InvalidState` when not pending;
    /// `InsufficientBalance` (with both untouched) when the balance no
    /// longer covers the amount.
    async fn approve(
        &self,
        id: WithdrawalId,
        stamp: &AdminStamp,
        transaction_id: &str,
    ) -> Result<WithdrawalRequest>;

    /// Flip a pending request to rejected and append a zero-amount audit
    /// entry to the owner's wallet. The balance is untouched.
    async fn reject(&self, id: WithdrawalId, stamp: &AdminStamp) -> Result<WithdrawalRequest>;

    /// Newest-first listing, optionally scoped to an owner and/or status.
    async fn list(
        &self,
        owner: Option<VendorId>,
        status: Option<WithdrawalStatus>,
    ) -> Result<Vec<WithdrawalRequest>>;

    /// Per-status {count, total, average} across withdrawal requests.
    async fn rollup(&self) -> Result<Vec<StatusRollup>>;
}

/// Settings singleton and per-vendor override persistence.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load the singleton, creating it with defaults on first read.
    async fn settings(&self) -> Result<SystemSettings>;

    async fn update_referral_policy(
        &self,
        patch: &ReferralPolicyPatch,
        admin: AdminId,
    ) -> Result<SystemSettings>;

    async fn update_withdrawal_policy(
        &self,
        patch: &WithdrawalPolicyPatch,
        admin: AdminId,
    ) -> Result<SystemSettings>;

    /// The vendor's active override, if any.
    async fn vendor_override(&self, vendor: VendorId) -> Result<Option<VendorCommissionOverride>>;

    /// Create or replace a vendor's override.
    async fn set_vendor_override(
        &self,
        vendor: VendorId,
        percentage: Decimal,
        admin: AdminId,
        notes: Option<&str>,
    ) -> Result<VendorCommissionOverride>;
}

/// Vendor and employee profile persistence.
#[async_trait]
pub trait PartyStore: Send + Sync {
    /// Insert a vendor and create its empty wallet.
    async fn insert_vendor(&self, vendor: &VendorProfile) -> Result<()>;

    /// Insert an employee; super-employees get an empty wallet.
    async fn insert_employee(&self, employee: &EmployeeProfile) -> Result<()>;

    async fn vendor(&self, id: VendorId) -> Result<Option<VendorProfile>>;

    async fn employee(&self, id: EmployeeId) -> Result<Option<EmployeeProfile>>;

    /// Mirror subscription state onto the vendor profile.
    async fn update_vendor_subscription(
        &self,
        vendor: VendorId,
        summary: &SubscriptionSummary,
    ) -> Result<()>;

    /// Clear the vendor's active-subscription flag, leaving the rest of the
    /// summary for audit.
    async fn deactivate_vendor_subscription(&self, vendor: VendorId) -> Result<()>;

    /// Bump seller-assignment counters after a commission is created.
    async fn record_seller_assignment(&self, employees: &[EmployeeId]) -> Result<()>;
}

/// The full set of stores a service layer needs.
#[derive(Clone)]
pub struct Stores {
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub wallets: Arc<dyn WalletStore>,
    pub commissions: Arc<dyn CommissionStore>,
    pub withdrawals: Arc<dyn WithdrawalStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub parties: Arc<dyn PartyStore>,
}

/// Initialize storage based on configuration.
#[cfg(feature = "sqlite")]
pub async fn init_storage(config: &crate::config::StorageConfig) -> Result<Stores> {
    use crate::config::StorageType;
    use tracing::info;

    match config.storage_type {
        StorageType::Sqlite => {
            info!("Storage: sqlite at {}", config.sqlite.path);

            if config.sqlite.path != ":memory:" {
                if let Some(parent) = std::path::Path::new(&config.sqlite.path).parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| sqlx::Error::Io(std::io::Error::other(e)))?;
                }
            }

            let pool = sqlx::SqlitePool::connect(&format!(
                "sqlite:{}?mode=rwc",
                config.sqlite.path
            ))
            .await?;

            let stores = SqliteStores::new(pool);
            stores.init().await?;
            Ok(stores.into_stores())
        }
    }
}
