//! SQLite storage integration tests.
//!
//! Run with: cargo test --test storage_sqlite
//!
//! Uses an in-memory database, no external dependencies required. The pool
//! is capped at one connection so `:memory:` means one shared database.

#![cfg(feature = "sqlite")]

mod common;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use payledger::error::LedgerError;
use payledger::model::{
    AdminStamp, CommissionStatus, PayoutMethod, TransactionKind, WalletOwner, WithdrawalRequest,
    WithdrawalStatus,
};
use payledger::storage::{
    CommissionStore, PartyStore, SettingsStore, SqliteStores, Stores, SubscriptionStore,
    WalletStore, WithdrawalStore,
};

use common::{
    pending_employee_commission, pending_referral_commission, sample_subscription, sample_vendor,
    upi,
};

async fn connect() -> Stores {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite");

    let stores = SqliteStores::new(pool);
    stores.init().await.expect("Failed to create schema");
    stores.into_stores()
}

#[tokio::test]
async fn test_wallet_balance_invariant() {
    let stores = connect().await;
    let vendor = sample_vendor(None, None);
    stores.parties.insert_vendor(&vendor).await.unwrap();
    let owner = WalletOwner::vendor(vendor.id);

    let balance = stores.wallets.credit(owner, dec!(100.50), "c1", None).await.unwrap();
    assert_eq!(balance, dec!(100.50));
    let balance = stores.wallets.credit(owner, dec!(49.50), "c2", Some("ref-1")).await.unwrap();
    assert_eq!(balance, dec!(150));
    let balance = stores.wallets.debit(owner, dec!(25), "d1", None).await.unwrap();
    assert_eq!(balance, dec!(125));

    let wallet = stores.wallets.wallet(owner).await.unwrap().unwrap();
    assert_eq!(wallet.balance, dec!(125));
    assert_eq!(wallet.derived_balance(), wallet.balance);
    assert_eq!(wallet.transactions.len(), 3);
    assert_eq!(wallet.transactions[0].kind, TransactionKind::Credit);
    assert_eq!(wallet.transactions[2].kind, TransactionKind::Debit);
    assert_eq!(wallet.transactions[1].reference.as_deref(), Some("ref-1"));
}

#[tokio::test]
async fn test_wallet_debit_beyond_balance_rejected() {
    let stores = connect().await;
    let vendor = sample_vendor(None, None);
    stores.parties.insert_vendor(&vendor).await.unwrap();
    let owner = WalletOwner::vendor(vendor.id);

    stores.wallets.credit(owner, dec!(300), "seed", None).await.unwrap();
    let err = stores.wallets.debit(owner, dec!(500), "too much", None).await.unwrap_err();
    match err {
        LedgerError::InsufficientBalance {
            requested,
            available,
        } => {
            assert_eq!(requested, dec!(500));
            assert_eq!(available, dec!(300));
        }
        other => panic!("unexpected error: {other}"),
    }

    // Nothing was applied: no debit entry, balance intact.
    let wallet = stores.wallets.wallet(owner).await.unwrap().unwrap();
    assert_eq!(wallet.balance, dec!(300));
    assert_eq!(wallet.transactions.len(), 1);
}

#[tokio::test]
async fn test_referral_commission_uniqueness() {
    let stores = connect().await;
    let referrer = sample_vendor(None, None);
    let vendor = sample_vendor(Some(referrer.id), None);
    stores.parties.insert_vendor(&referrer).await.unwrap();
    stores.parties.insert_vendor(&vendor).await.unwrap();

    let subscription = sample_subscription(vendor.id, dec!(899));
    stores.subscriptions.insert(&subscription).await.unwrap();

    let commission = pending_referral_commission(referrer.id, vendor.id, subscription.id);
    assert!(stores.commissions.insert_referral(&commission).await.unwrap());

    // Same (referrer, subscription) pair with a fresh id: rejected by the
    // unique index, reported as a duplicate, not an error.
    let mut duplicate = pending_referral_commission(referrer.id, vendor.id, subscription.id);
    duplicate.id = Uuid::new_v4();
    assert!(!stores.commissions.insert_referral(&duplicate).await.unwrap());

    let all = stores.commissions.list_referrals(None, None).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_employee_commission_uniqueness() {
    let stores = connect().await;
    let seller = sample_vendor(None, None);
    stores.parties.insert_vendor(&seller).await.unwrap();
    let subscription = sample_subscription(seller.id, dec!(899));
    stores.subscriptions.insert(&subscription).await.unwrap();
    let employee = Uuid::new_v4();

    let commission = pending_employee_commission(employee, seller.id, subscription.id);
    assert!(stores.commissions.insert_employee(&commission).await.unwrap());

    let mut duplicate = pending_employee_commission(employee, seller.id, subscription.id);
    duplicate.id = Uuid::new_v4();
    assert!(!stores.commissions.insert_employee(&duplicate).await.unwrap());
}

#[tokio::test]
async fn test_settle_referral_is_atomic_and_single_shot() {
    let stores = connect().await;
    let referrer = sample_vendor(None, None);
    let vendor = sample_vendor(Some(referrer.id), None);
    stores.parties.insert_vendor(&referrer).await.unwrap();
    stores.parties.insert_vendor(&vendor).await.unwrap();
    let subscription = sample_subscription(vendor.id, dec!(899));
    stores.subscriptions.insert(&subscription).await.unwrap();

    let commission = pending_referral_commission(referrer.id, vendor.id, subscription.id);
    stores.commissions.insert_referral(&commission).await.unwrap();

    let stamp = AdminStamp::new(Uuid::new_v4(), Some("approved".into()));
    let settled = stores
        .commissions
        .settle_referral(commission.id, &stamp, "TXN_1", "Referral commission")
        .await
        .unwrap();
    assert_eq!(settled.status, CommissionStatus::Paid);
    assert_eq!(settled.payment.transaction_id.as_deref(), Some("TXN_1"));
    assert!(settled.payment.paid_at.is_some());
    assert!(settled.admin.is_some());

    let wallet = stores
        .wallets
        .wallet(WalletOwner::vendor(referrer.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wallet.balance, commission.breakdown.amount);
    assert_eq!(
        wallet.transactions[0].reference.as_deref(),
        Some(commission.id.to_string().as_str())
    );

    // Second settlement attempt: InvalidState, wallet untouched.
    let err = stores
        .commissions
        .settle_referral(commission.id, &stamp, "TXN_2", "Referral commission")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));

    let wallet = stores
        .wallets
        .wallet(WalletOwner::vendor(referrer.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wallet.transactions.len(), 1);
}

#[tokio::test]
async fn test_settle_rolls_back_when_wallet_missing() {
    let stores = connect().await;
    // Referrer inserted without a wallet row: commission exists but the
    // credit can't land.
    let referrer_id = Uuid::new_v4();
    let vendor = sample_vendor(Some(referrer_id), None);
    stores.parties.insert_vendor(&vendor).await.unwrap();
    let subscription = sample_subscription(vendor.id, dec!(899));
    stores.subscriptions.insert(&subscription).await.unwrap();

    let commission = pending_referral_commission(referrer_id, vendor.id, subscription.id);
    stores.commissions.insert_referral(&commission).await.unwrap();

    let stamp = AdminStamp::new(Uuid::new_v4(), None);
    let err = stores
        .commissions
        .settle_referral(commission.id, &stamp, "TXN_1", "Referral commission")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));

    // The status flip rolled back with the failed credit.
    let commission = stores
        .commissions
        .referral(commission.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(commission.status, CommissionStatus::Pending);
}

#[tokio::test]
async fn test_reject_referral_leaves_wallet_untouched() {
    let stores = connect().await;
    let referrer = sample_vendor(None, None);
    let vendor = sample_vendor(Some(referrer.id), None);
    stores.parties.insert_vendor(&referrer).await.unwrap();
    stores.parties.insert_vendor(&vendor).await.unwrap();
    let subscription = sample_subscription(vendor.id, dec!(899));
    stores.subscriptions.insert(&subscription).await.unwrap();

    let commission = pending_referral_commission(referrer.id, vendor.id, subscription.id);
    stores.commissions.insert_referral(&commission).await.unwrap();

    let stamp = AdminStamp::new(Uuid::new_v4(), Some("not eligible".into()));
    let rejected = stores
        .commissions
        .reject_referral(commission.id, &stamp)
        .await
        .unwrap();
    assert_eq!(rejected.status, CommissionStatus::Cancelled);

    let wallet = stores
        .wallets
        .wallet(WalletOwner::vendor(referrer.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wallet.balance, Decimal::ZERO);
    assert!(wallet.transactions.is_empty());
}

#[tokio::test]
async fn test_withdrawal_approve_debits_and_flips_together() {
    let stores = connect().await;
    let vendor = sample_vendor(None, None);
    stores.parties.insert_vendor(&vendor).await.unwrap();
    let owner = WalletOwner::vendor(vendor.id);
    stores.wallets.credit(owner, dec!(500), "seed", None).await.unwrap();

    let request = WithdrawalRequest {
        id: Uuid::new_v4(),
        owner: vendor.id,
        amount: dec!(200),
        method: upi(),
        status: WithdrawalStatus::Pending,
        requested_at: Utc::now(),
        processed_at: None,
        processed_by: None,
        admin_notes: None,
        transaction_id: None,
    };
    stores.withdrawals.insert(&request).await.unwrap();

    let stamp = AdminStamp::new(Uuid::new_v4(), None);
    let approved = stores
        .withdrawals
        .approve(request.id, &stamp, "TXN_W1")
        .await
        .unwrap();
    assert_eq!(approved.status, WithdrawalStatus::Approved);
    assert_eq!(approved.transaction_id.as_deref(), Some("TXN_W1"));
    assert!(approved.processed_at.is_some());

    let wallet = stores.wallets.wallet(owner).await.unwrap().unwrap();
    assert_eq!(wallet.balance, dec!(300));
    assert_eq!(wallet.transactions.len(), 2);

    // Double processing is InvalidState.
    let err = stores
        .withdrawals
        .approve(request.id, &stamp, "TXN_W2")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));
}

#[tokio::test]
async fn test_withdrawal_approve_insufficient_balance_rolls_back() {
    let stores = connect().await;
    let vendor = sample_vendor(None, None);
    stores.parties.insert_vendor(&vendor).await.unwrap();
    let owner = WalletOwner::vendor(vendor.id);
    stores.wallets.credit(owner, dec!(300), "seed", None).await.unwrap();

    let request = WithdrawalRequest {
        id: Uuid::new_v4(),
        owner: vendor.id,
        amount: dec!(500),
        method: upi(),
        status: WithdrawalStatus::Pending,
        requested_at: Utc::now(),
        processed_at: None,
        processed_by: None,
        admin_notes: None,
        transaction_id: None,
    };
    stores.withdrawals.insert(&request).await.unwrap();

    let stamp = AdminStamp::new(Uuid::new_v4(), None);
    let err = stores
        .withdrawals
        .approve(request.id, &stamp, "TXN_W1")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

    // The flip rolled back with the failed debit.
    let request = stores.withdrawals.get(request.id).await.unwrap().unwrap();
    assert_eq!(request.status, WithdrawalStatus::Pending);
    assert!(request.transaction_id.is_none());
    let wallet = stores.wallets.wallet(owner).await.unwrap().unwrap();
    assert_eq!(wallet.balance, dec!(300));
    assert_eq!(wallet.transactions.len(), 1);
}

#[tokio::test]
async fn test_withdrawal_reject_adds_audit_entry() {
    let stores = connect().await;
    let vendor = sample_vendor(None, None);
    stores.parties.insert_vendor(&vendor).await.unwrap();
    let owner = WalletOwner::vendor(vendor.id);
    stores.wallets.credit(owner, dec!(300), "seed", None).await.unwrap();

    let request = WithdrawalRequest {
        id: Uuid::new_v4(),
        owner: vendor.id,
        amount: dec!(200),
        method: PayoutMethod::Bank(common::bank_account()),
        status: WithdrawalStatus::Pending,
        requested_at: Utc::now(),
        processed_at: None,
        processed_by: None,
        admin_notes: None,
        transaction_id: None,
    };
    stores.withdrawals.insert(&request).await.unwrap();

    let stamp = AdminStamp::new(Uuid::new_v4(), Some("account mismatch".into()));
    let rejected = stores.withdrawals.reject(request.id, &stamp).await.unwrap();
    assert_eq!(rejected.status, WithdrawalStatus::Rejected);

    let wallet = stores.wallets.wallet(owner).await.unwrap().unwrap();
    assert_eq!(wallet.balance, dec!(300));
    let audit = wallet.transactions.last().unwrap();
    assert_eq!(audit.amount, Decimal::ZERO);
    assert!(audit.description.contains("account mismatch"));

    // Round-trips the bank details too.
    let request = stores.withdrawals.get(request.id).await.unwrap().unwrap();
    assert_eq!(request.method, PayoutMethod::Bank(common::bank_account()));
}

#[tokio::test]
async fn test_settings_singleton_and_override() {
    let stores = connect().await;

    // First read creates the defaults.
    let settings = stores.settings.settings().await.unwrap();
    assert_eq!(settings.referral.percentage, dec!(3));
    assert!(settings.referral.is_active);
    assert_eq!(settings.withdrawal.minimum_amount, dec!(100));
    assert!(settings.updated_by.is_none());

    let admin = Uuid::new_v4();
    let updated = stores
        .settings
        .update_referral_policy(
            &payledger::model::ReferralPolicyPatch {
                percentage: Some(dec!(5)),
                maximum_commission_per_referral: Some(dec!(2000)),
                ..Default::default()
            },
            admin,
        )
        .await
        .unwrap();
    assert_eq!(updated.referral.percentage, dec!(5));
    assert_eq!(updated.referral.maximum_commission_per_referral, dec!(2000));
    // Untouched fields persist.
    assert_eq!(updated.referral.minimum_subscription_amount, dec!(100));
    assert_eq!(updated.updated_by, Some(admin));

    let vendor = Uuid::new_v4();
    assert!(stores.settings.vendor_override(vendor).await.unwrap().is_none());
    let override_ = stores
        .settings
        .set_vendor_override(vendor, dec!(7.5), admin, Some("negotiated"))
        .await
        .unwrap();
    assert!(override_.is_custom);

    let loaded = stores.settings.vendor_override(vendor).await.unwrap().unwrap();
    assert_eq!(loaded.percentage, dec!(7.5));
    assert_eq!(loaded.set_by, admin);

    // Re-setting replaces in place.
    stores
        .settings
        .set_vendor_override(vendor, dec!(10), admin, None)
        .await
        .unwrap();
    let loaded = stores.settings.vendor_override(vendor).await.unwrap().unwrap();
    assert_eq!(loaded.percentage, dec!(10));
    assert!(!loaded.is_custom);
}

#[tokio::test]
async fn test_subscription_round_trip_and_payment_history() {
    let stores = connect().await;
    let vendor = sample_vendor(None, None);
    stores.parties.insert_vendor(&vendor).await.unwrap();
    let subscription = sample_subscription(vendor.id, dec!(899));
    stores.subscriptions.insert(&subscription).await.unwrap();

    let found = stores
        .subscriptions
        .find_by_gateway_subscription(subscription.gateway_subscription_id.as_deref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, subscription.id);
    assert_eq!(found.amount, dec!(899));

    let start = Utc::now();
    let end = start + chrono::Duration::days(365);
    stores
        .subscriptions
        .activate(subscription.id, start, end, Some("pay_abc"))
        .await
        .unwrap();

    stores
        .subscriptions
        .append_payment(
            subscription.id,
            &payledger::model::PaymentRecord {
                amount: dec!(899),
                outcome: payledger::model::PaymentOutcome::Success,
                gateway_payment_id: Some("pay_abc".to_string()),
                description: "Subscription payment".to_string(),
                recorded_at: Utc::now(),
            },
        )
        .await
        .unwrap();

    let loaded = stores.subscriptions.get(subscription.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, payledger::model::SubscriptionStatus::Active);
    assert_eq!(loaded.gateway_payment_id.as_deref(), Some("pay_abc"));
    assert_eq!(loaded.payment_history.len(), 1);
    assert_eq!(loaded.payment_history[0].amount, dec!(899));

    let by_payment = stores
        .subscriptions
        .find_by_gateway_payment("pay_abc")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_payment.id, subscription.id);
}

#[tokio::test]
async fn test_rollups_aggregate_by_status() {
    let stores = connect().await;
    let referrer = sample_vendor(None, None);
    stores.parties.insert_vendor(&referrer).await.unwrap();

    for (amount, settle) in [(dec!(100), true), (dec!(50), false), (dec!(30), false)] {
        let vendor = sample_vendor(Some(referrer.id), None);
        stores.parties.insert_vendor(&vendor).await.unwrap();
        let subscription = sample_subscription(vendor.id, dec!(899));
        stores.subscriptions.insert(&subscription).await.unwrap();

        let mut commission = pending_referral_commission(referrer.id, vendor.id, subscription.id);
        commission.breakdown.amount = amount;
        stores.commissions.insert_referral(&commission).await.unwrap();
        if settle {
            let stamp = AdminStamp::new(Uuid::new_v4(), None);
            stores
                .commissions
                .settle_referral(commission.id, &stamp, "TXN", "Referral commission")
                .await
                .unwrap();
        }
    }

    let rollups = stores.commissions.referral_rollup().await.unwrap();
    let paid = rollups.iter().find(|r| r.status == "paid").unwrap();
    assert_eq!(paid.count, 1);
    assert_eq!(paid.total_amount, dec!(100));
    let pending = rollups.iter().find(|r| r.status == "pending").unwrap();
    assert_eq!(pending.count, 2);
    assert_eq!(pending.total_amount, dec!(80));
    assert_eq!(pending.average_amount, dec!(40));
}
