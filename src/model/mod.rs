//! Domain records and state machines.
//!
//! Records are plain data; every state transition with an invariant behind it
//! (commission settlement, withdrawal processing, wallet mutation) goes
//! through the storage layer's conditional updates, never through in-place
//! mutation of these structs.

mod commission;
mod party;
mod settings;
mod subscription;
mod wallet;
mod withdrawal;

pub use commission::{
    AdminStamp, CommissionBreakdown, CommissionStatus, District, EmployeeCommission,
    PaymentStamp, Period, ReferralCommission, StatusRollup,
};
pub use party::{
    CommissionSettings, EmployeeProfile, EmployeeRole, OwnerKind, VendorProfile, WalletOwner,
};
pub use settings::{
    ReferralPolicy, ReferralPolicyPatch, SystemSettings, VendorCommissionOverride,
    WithdrawalPolicy, WithdrawalPolicyPatch, DEFAULT_VENDOR_COMMISSION_PERCENT,
};
pub use subscription::{
    PaymentOutcome, PaymentRecord, PlanTag, Subscription, SubscriptionStatus,
    SubscriptionSummary,
};
pub use wallet::{TransactionKind, Wallet, WalletSummary, WalletTransaction};
pub use withdrawal::{BankAccount, PayoutMethod, WithdrawalRequest, WithdrawalStatus};

use uuid::Uuid;

/// Opaque identifier aliases. All cross-references are by id, never by
/// embedding; wallets and withdrawal requests are owned by their party.
pub type VendorId = Uuid;
pub type EmployeeId = Uuid;
pub type AdminId = Uuid;
pub type SubscriptionId = Uuid;
pub type CommissionId = Uuid;
pub type WithdrawalId = Uuid;
pub type TransactionId = Uuid;
