//! Service-layer tests over the in-memory stores.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::gateway::{PaymentFailed, SubscriptionActivated, SubscriptionCancelled};
use crate::model::{
    BankAccount, CommissionSettings, CommissionStatus, EmployeeProfile, EmployeeRole, PayoutMethod,
    PlanTag, ReferralPolicyPatch, Subscription, SubscriptionStatus, SubscriptionSummary,
    VendorProfile, WalletOwner, WithdrawalStatus,
};
use crate::services::{
    ActivationOutcome, CommissionLedger, EventDisposition, SubscriptionIngestor,
    WithdrawalWorkflow,
};
use crate::storage::{
    CommissionStore, MemoryStores, PartyStore, SettingsStore, Stores, SubscriptionStore,
    WalletStore,
};

fn stores() -> Stores {
    MemoryStores::new().into_stores()
}

fn admin() -> Uuid {
    Uuid::new_v4()
}

async fn seed_vendor(
    stores: &Stores,
    name: &str,
    referred_by: Option<Uuid>,
    assigned_employee: Option<Uuid>,
) -> VendorProfile {
    let vendor = VendorProfile {
        id: Uuid::new_v4(),
        name: name.to_string(),
        shop_name: Some(format!("{name} Stores")),
        city: Some("Chennai".to_string()),
        state: Some("Tamil Nadu".to_string()),
        referral_code: Some(format!("REF{}", &name.to_uppercase())),
        referred_by,
        assigned_employee,
        subscription: SubscriptionSummary {
            is_active: false,
            plan: None,
            start_date: None,
            end_date: None,
            gateway_subscription_id: None,
            gateway_payment_id: None,
        },
    };
    stores.parties.insert_vendor(&vendor).await.unwrap();
    vendor
}

async fn seed_super_employee(
    stores: &Stores,
    percentage: Decimal,
    is_active: bool,
) -> EmployeeProfile {
    let employee = EmployeeProfile {
        id: Uuid::new_v4(),
        name: "Super Employee".to_string(),
        employee_code: "SUP001".to_string(),
        role: EmployeeRole::SuperEmployee,
        super_employee: None,
        employee_commission_percentage: Decimal::ZERO,
        commission_settings: CommissionSettings {
            percentage,
            is_active,
        },
        total_sellers_assigned: 0,
        total_commission_earned: Decimal::ZERO,
        last_commission_at: None,
    };
    stores.parties.insert_employee(&employee).await.unwrap();
    employee
}

async fn seed_regular_employee(
    stores: &Stores,
    personal_rate: Decimal,
    supervisor: Uuid,
) -> EmployeeProfile {
    let employee = EmployeeProfile {
        id: Uuid::new_v4(),
        name: "Field Employee".to_string(),
        employee_code: "EMP001".to_string(),
        role: EmployeeRole::Employee,
        super_employee: Some(supervisor),
        employee_commission_percentage: personal_rate,
        commission_settings: CommissionSettings {
            percentage: Decimal::ZERO,
            is_active: false,
        },
        total_sellers_assigned: 0,
        total_commission_earned: Decimal::ZERO,
        last_commission_at: None,
    };
    stores.parties.insert_employee(&employee).await.unwrap();
    employee
}

async fn seed_subscription(
    stores: &Stores,
    vendor: Uuid,
    amount: Decimal,
    gateway_id: &str,
) -> Subscription {
    let now = Utc::now();
    let subscription = Subscription {
        id: Uuid::new_v4(),
        vendor,
        plan: PlanTag::OneYear,
        amount,
        currency: "INR".to_string(),
        status: SubscriptionStatus::Pending,
        start_date: None,
        end_date: None,
        gateway_subscription_id: Some(gateway_id.to_string()),
        gateway_payment_id: None,
        gateway_order_id: None,
        cancelled_at: None,
        payment_history: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    stores.subscriptions.insert(&subscription).await.unwrap();
    subscription
}

fn activation(gateway_id: &str, payment_id: &str) -> SubscriptionActivated {
    let now = Utc::now();
    SubscriptionActivated {
        gateway_subscription_id: gateway_id.to_string(),
        gateway_payment_id: Some(payment_id.to_string()),
        start_date: now,
        end_date: now + Duration::days(365),
    }
}

fn upi() -> PayoutMethod {
    PayoutMethod::Upi {
        upi_id: "vendor@okicici".to_string(),
    }
}

#[tokio::test]
async fn test_referral_settlement_end_to_end() {
    let stores = stores();
    let ingestor = SubscriptionIngestor::new(stores.clone());
    let ledger = CommissionLedger::new(stores.clone());

    let referrer = seed_vendor(&stores, "Referrer", None, None).await;
    let vendor = seed_vendor(&stores, "Vendor", Some(referrer.id), None).await;
    let subscription = seed_subscription(&stores, vendor.id, dec!(899), "sub_001").await;

    let outcome = ingestor.on_activated(&activation("sub_001", "pay_001")).await.unwrap();
    let ActivationOutcome::Applied {
        referral_commission: Some(commission_id),
        employee_commission: None,
    } = outcome
    else {
        panic!("expected a referral commission and no employee commission");
    };

    // Default policy: 3% of 899, under the 1000 cap.
    let commission = ledger.referral(commission_id).await.unwrap().unwrap();
    assert_eq!(commission.status, CommissionStatus::Pending);
    assert_eq!(commission.breakdown.amount, dec!(26.97));
    assert_eq!(commission.referrer, referrer.id);
    assert_eq!(commission.referred_vendor, vendor.id);
    assert_eq!(commission.subscription, subscription.id);

    // No wallet is touched until approval.
    let wallet = stores
        .wallets
        .wallet(WalletOwner::vendor(referrer.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wallet.balance, Decimal::ZERO);

    let settled = ledger
        .approve_referral(commission_id, admin(), Some("ok".into()))
        .await
        .unwrap();
    assert_eq!(settled.status, CommissionStatus::Paid);
    assert!(settled.payment.transaction_id.is_some());

    let wallet = stores
        .wallets
        .wallet(WalletOwner::vendor(referrer.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wallet.balance, dec!(26.97));
    assert_eq!(wallet.derived_balance(), wallet.balance);
    assert_eq!(wallet.transactions.len(), 1);
    assert!(wallet.transactions[0].description.contains("Vendor"));
}

#[tokio::test]
async fn test_activation_is_idempotent_under_redelivery() {
    let stores = stores();
    let ingestor = SubscriptionIngestor::new(stores.clone());

    let referrer = seed_vendor(&stores, "Referrer", None, None).await;
    let supervisor = seed_super_employee(&stores, dec!(5), true).await;
    let vendor = seed_vendor(&stores, "Vendor", Some(referrer.id), Some(supervisor.id)).await;
    seed_subscription(&stores, vendor.id, dec!(899), "sub_002").await;

    let event = activation("sub_002", "pay_002");
    let first = ingestor.on_activated(&event).await.unwrap();
    assert!(matches!(first, ActivationOutcome::Applied { .. }));

    let second = ingestor.on_activated(&event).await.unwrap();
    assert_eq!(second, ActivationOutcome::AlreadyActive);

    let referrals = stores.commissions.list_referrals(None, None).await.unwrap();
    assert_eq!(referrals.len(), 1);
    let employee_commissions = stores
        .commissions
        .list_employee_commissions(None, None)
        .await
        .unwrap();
    assert_eq!(employee_commissions.len(), 1);
}

#[tokio::test]
async fn test_reactivation_with_different_payment_id_conflicts() {
    let stores = stores();
    let ingestor = SubscriptionIngestor::new(stores.clone());

    let vendor = seed_vendor(&stores, "Vendor", None, None).await;
    seed_subscription(&stores, vendor.id, dec!(899), "sub_003").await;

    ingestor.on_activated(&activation("sub_003", "pay_a")).await.unwrap();
    let err = ingestor
        .on_activated(&activation("sub_003", "pay_b"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));
}

#[tokio::test]
async fn test_unknown_subscription_is_acknowledged() {
    let stores = stores();
    let ingestor = SubscriptionIngestor::new(stores.clone());

    let outcome = ingestor
        .on_activated(&activation("sub_missing", "pay_x"))
        .await
        .unwrap();
    assert_eq!(outcome, ActivationOutcome::UnknownSubscription);

    let disposition = ingestor
        .on_cancelled(&SubscriptionCancelled {
            gateway_subscription_id: "sub_missing".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(disposition, EventDisposition::Ignored);
}

#[tokio::test]
async fn test_below_minimum_subscription_earns_no_commission() {
    let stores = stores();
    let ingestor = SubscriptionIngestor::new(stores.clone());

    let referrer = seed_vendor(&stores, "Referrer", None, None).await;
    let vendor = seed_vendor(&stores, "Vendor", Some(referrer.id), None).await;
    seed_subscription(&stores, vendor.id, dec!(99), "sub_004").await;

    let outcome = ingestor.on_activated(&activation("sub_004", "pay_004")).await.unwrap();
    assert_eq!(
        outcome,
        ActivationOutcome::Applied {
            referral_commission: None,
            employee_commission: None,
        }
    );
}

#[tokio::test]
async fn test_vendor_override_takes_precedence() {
    let stores = stores();
    let ingestor = SubscriptionIngestor::new(stores.clone());

    let referrer = seed_vendor(&stores, "Referrer", None, None).await;
    let vendor = seed_vendor(&stores, "Vendor", Some(referrer.id), None).await;
    seed_subscription(&stores, vendor.id, dec!(899), "sub_005").await;

    stores
        .settings
        .set_vendor_override(referrer.id, dec!(7), admin(), Some("negotiated"))
        .await
        .unwrap();

    let outcome = ingestor.on_activated(&activation("sub_005", "pay_005")).await.unwrap();
    let ActivationOutcome::Applied {
        referral_commission: Some(id),
        ..
    } = outcome
    else {
        panic!("expected referral commission");
    };

    let commission = stores.commissions.referral(id).await.unwrap().unwrap();
    assert_eq!(commission.breakdown.percentage, dec!(7));
    assert_eq!(commission.breakdown.amount, dec!(62.93));
}

#[tokio::test]
async fn test_commission_cap_applies() {
    let stores = stores();
    let ingestor = SubscriptionIngestor::new(stores.clone());
    let admin_id = admin();

    let referrer = seed_vendor(&stores, "Referrer", None, None).await;
    let vendor = seed_vendor(&stores, "Vendor", Some(referrer.id), None).await;
    seed_subscription(&stores, vendor.id, dec!(20000), "sub_006").await;

    stores
        .settings
        .update_referral_policy(
            &ReferralPolicyPatch {
                percentage: Some(dec!(10)),
                ..Default::default()
            },
            admin_id,
        )
        .await
        .unwrap();

    let outcome = ingestor.on_activated(&activation("sub_006", "pay_006")).await.unwrap();
    let ActivationOutcome::Applied {
        referral_commission: Some(id),
        ..
    } = outcome
    else {
        panic!("expected referral commission");
    };

    let commission = stores.commissions.referral(id).await.unwrap().unwrap();
    assert_eq!(commission.breakdown.amount, dec!(1000));
}

#[tokio::test]
async fn test_double_approval_credits_wallet_once() {
    let stores = stores();
    let ingestor = SubscriptionIngestor::new(stores.clone());
    let ledger = CommissionLedger::new(stores.clone());

    let referrer = seed_vendor(&stores, "Referrer", None, None).await;
    let vendor = seed_vendor(&stores, "Vendor", Some(referrer.id), None).await;
    seed_subscription(&stores, vendor.id, dec!(899), "sub_007").await;

    let ActivationOutcome::Applied {
        referral_commission: Some(id),
        ..
    } = ingestor.on_activated(&activation("sub_007", "pay_007")).await.unwrap()
    else {
        panic!("expected referral commission");
    };

    ledger.approve_referral(id, admin(), None).await.unwrap();
    let err = ledger.approve_referral(id, admin(), None).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));

    let wallet = stores
        .wallets
        .wallet(WalletOwner::vendor(referrer.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wallet.balance, dec!(26.97));
    assert_eq!(wallet.transactions.len(), 1);
}

#[tokio::test]
async fn test_commission_rejection_is_balance_neutral() {
    let stores = stores();
    let ingestor = SubscriptionIngestor::new(stores.clone());
    let ledger = CommissionLedger::new(stores.clone());

    let referrer = seed_vendor(&stores, "Referrer", None, None).await;
    let vendor = seed_vendor(&stores, "Vendor", Some(referrer.id), None).await;
    seed_subscription(&stores, vendor.id, dec!(899), "sub_008").await;

    let ActivationOutcome::Applied {
        referral_commission: Some(id),
        ..
    } = ingestor.on_activated(&activation("sub_008", "pay_008")).await.unwrap()
    else {
        panic!("expected referral commission");
    };

    let rejected = ledger
        .reject_referral(id, admin(), Some("duplicate signup".into()))
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

    // Terminal: a later approval cannot resurrect it.
    let err = ledger.approve_referral(id, admin(), None).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));
}

#[tokio::test]
async fn test_employee_commission_routes_to_super_employee() {
    let stores = stores();
    let ingestor = SubscriptionIngestor::new(stores.clone());
    let ledger = CommissionLedger::new(stores.clone());

    let supervisor = seed_super_employee(&stores, dec!(5), true).await;
    let field = seed_regular_employee(&stores, dec!(2), supervisor.id).await;
    let vendor = seed_vendor(&stores, "Seller", None, Some(field.id)).await;
    seed_subscription(&stores, vendor.id, dec!(899), "sub_009").await;

    let ActivationOutcome::Applied {
        referral_commission: None,
        employee_commission: Some(id),
    } = ingestor.on_activated(&activation("sub_009", "pay_009")).await.unwrap()
    else {
        panic!("expected employee commission only");
    };

    // Payee is the supervisor, at the subordinate's 2% rate.
    let commission = stores.commissions.employee(id).await.unwrap().unwrap();
    assert_eq!(commission.employee, supervisor.id);
    assert_eq!(commission.breakdown.percentage, dec!(2));
    assert_eq!(commission.breakdown.amount, dec!(17.98));
    assert_eq!(commission.district.name, "Chennai");

    ledger.approve_employee(id, admin(), None).await.unwrap();

    let wallet = stores
        .wallets
        .wallet(WalletOwner::super_employee(supervisor.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wallet.balance, dec!(17.98));

    let profile = stores.parties.employee(supervisor.id).await.unwrap().unwrap();
    assert_eq!(profile.total_commission_earned, dec!(17.98));
    assert!(profile.last_commission_at.is_some());
}

#[tokio::test]
async fn test_cancellation_clears_vendor_flag_and_keeps_paid_commissions() {
    let stores = stores();
    let ingestor = SubscriptionIngestor::new(stores.clone());
    let ledger = CommissionLedger::new(stores.clone());

    let referrer = seed_vendor(&stores, "Referrer", None, None).await;
    let vendor = seed_vendor(&stores, "Vendor", Some(referrer.id), None).await;
    seed_subscription(&stores, vendor.id, dec!(899), "sub_010").await;

    let ActivationOutcome::Applied {
        referral_commission: Some(id),
        ..
    } = ingestor.on_activated(&activation("sub_010", "pay_010")).await.unwrap()
    else {
        panic!("expected referral commission");
    };
    ledger.approve_referral(id, admin(), None).await.unwrap();

    let profile = stores.parties.vendor(vendor.id).await.unwrap().unwrap();
    assert!(profile.subscription.is_active);

    ingestor
        .on_cancelled(&SubscriptionCancelled {
            gateway_subscription_id: "sub_010".to_string(),
        })
        .await
        .unwrap();

    let profile = stores.parties.vendor(vendor.id).await.unwrap().unwrap();
    assert!(!profile.subscription.is_active);

    // The settled commission stands.
    let commission = stores.commissions.referral(id).await.unwrap().unwrap();
    assert_eq!(commission.status, CommissionStatus::Paid);
    let wallet = stores
        .wallets
        .wallet(WalletOwner::vendor(referrer.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wallet.balance, dec!(26.97));
}

#[tokio::test]
async fn test_payment_failure_fails_subscription() {
    let stores = stores();
    let ingestor = SubscriptionIngestor::new(stores.clone());

    let vendor = seed_vendor(&stores, "Vendor", None, None).await;
    let subscription = seed_subscription(&stores, vendor.id, dec!(899), "sub_011").await;

    ingestor.on_activated(&activation("sub_011", "pay_011")).await.unwrap();

    let disposition = ingestor
        .on_payment_failed(&PaymentFailed {
            gateway_payment_id: "pay_011".to_string(),
            amount: dec!(899),
            reason: Some("card declined".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(disposition, EventDisposition::Applied);

    let subscription = stores.subscriptions.get(subscription.id).await.unwrap().unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::Failed);
    assert_eq!(subscription.payment_history.len(), 1);

    let profile = stores.parties.vendor(vendor.id).await.unwrap().unwrap();
    assert!(!profile.subscription.is_active);
}

#[tokio::test]
async fn test_withdrawal_request_validations() {
    let stores = stores();
    let workflow = WithdrawalWorkflow::new(stores.clone());

    let vendor = seed_vendor(&stores, "Vendor", None, None).await;
    stores
        .wallets
        .credit(WalletOwner::vendor(vendor.id), dec!(300), "seed", None)
        .await
        .unwrap();

    // Below the policy minimum.
    let err = workflow.request(vendor.id, dec!(50), upi()).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    // More than the balance.
    let err = workflow.request(vendor.id, dec!(500), upi()).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

    // Malformed UPI id.
    let err = workflow
        .request(
            vendor.id,
            dec!(200),
            PayoutMethod::Upi {
                upi_id: "not-a-upi-id".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    // Malformed IFSC.
    let err = workflow
        .request(
            vendor.id,
            dec!(200),
            PayoutMethod::Bank(BankAccount {
                account_number: "123456789012".to_string(),
                ifsc_code: "BAD".to_string(),
                account_holder_name: "Vendor".to_string(),
                bank_name: "HDFC".to_string(),
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    // A valid request goes through.
    let request = workflow.request(vendor.id, dec!(200), upi()).await.unwrap();
    assert_eq!(request.status, WithdrawalStatus::Pending);
}

#[tokio::test]
async fn test_withdrawal_approval_rechecks_balance() {
    let stores = stores();
    let workflow = WithdrawalWorkflow::new(stores.clone());

    let vendor = seed_vendor(&stores, "Vendor", None, None).await;
    let owner = WalletOwner::vendor(vendor.id);
    stores.wallets.credit(owner, dec!(500), "seed", None).await.unwrap();

    let request = workflow.request(vendor.id, dec!(500), upi()).await.unwrap();

    // The balance drains between request and approval.
    stores.wallets.debit(owner, dec!(200), "drain", None).await.unwrap();

    let err = workflow
        .approve(request.id, admin(), "TXN123", None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

    // Wallet and request both unchanged.
    let wallet = stores.wallets.wallet(owner).await.unwrap().unwrap();
    assert_eq!(wallet.balance, dec!(300));
    let request = workflow.get(request.id).await.unwrap().unwrap();
    assert_eq!(request.status, WithdrawalStatus::Pending);

    // A covered approval succeeds and debits exactly once.
    let request = workflow.request(vendor.id, dec!(300), upi()).await.unwrap();
    let approved = workflow
        .approve(request.id, admin(), "TXN124", None)
        .await
        .unwrap();
    assert_eq!(approved.status, WithdrawalStatus::Approved);
    assert_eq!(approved.transaction_id.as_deref(), Some("TXN124"));

    let wallet = stores.wallets.wallet(owner).await.unwrap().unwrap();
    assert_eq!(wallet.balance, Decimal::ZERO);
    assert_eq!(wallet.derived_balance(), Decimal::ZERO);
}

#[tokio::test]
async fn test_withdrawal_approval_requires_transaction_id() {
    let stores = stores();
    let workflow = WithdrawalWorkflow::new(stores.clone());

    let vendor = seed_vendor(&stores, "Vendor", None, None).await;
    stores
        .wallets
        .credit(WalletOwner::vendor(vendor.id), dec!(500), "seed", None)
        .await
        .unwrap();
    let request = workflow.request(vendor.id, dec!(200), upi()).await.unwrap();

    let err = workflow.approve(request.id, admin(), "  ", None).await.unwrap_err();
    assert!(matches!(err, LedgerError::MissingTransactionId));

    let request = workflow.get(request.id).await.unwrap().unwrap();
    assert_eq!(request.status, WithdrawalStatus::Pending);
}

#[tokio::test]
async fn test_withdrawal_rejection_is_terminal_and_balance_neutral() {
    let stores = stores();
    let workflow = WithdrawalWorkflow::new(stores.clone());

    let vendor = seed_vendor(&stores, "Vendor", None, None).await;
    let owner = WalletOwner::vendor(vendor.id);
    stores.wallets.credit(owner, dec!(500), "seed", None).await.unwrap();
    let request = workflow.request(vendor.id, dec!(200), upi()).await.unwrap();

    let rejected = workflow
        .reject(request.id, admin(), Some("details mismatch".into()))
        .await
        .unwrap();
    assert_eq!(rejected.status, WithdrawalStatus::Rejected);

    let wallet = stores.wallets.wallet(owner).await.unwrap().unwrap();
    assert_eq!(wallet.balance, dec!(500));
    // Audit entry only: zero amount.
    let audit = wallet.transactions.last().unwrap();
    assert_eq!(audit.amount, Decimal::ZERO);
    assert!(audit.description.contains("rejected"));

    // Terminal both ways.
    let err = workflow
        .approve(request.id, admin(), "TXN125", None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));
}

#[tokio::test]
async fn test_employee_batch_approval_collects_outcomes() {
    let stores = stores();
    let ingestor = SubscriptionIngestor::new(stores.clone());
    let ledger = CommissionLedger::new(stores.clone());

    let supervisor = seed_super_employee(&stores, dec!(5), true).await;
    let seller_a = seed_vendor(&stores, "SellerA", None, Some(supervisor.id)).await;
    let seller_b = seed_vendor(&stores, "SellerB", None, Some(supervisor.id)).await;
    seed_subscription(&stores, seller_a.id, dec!(899), "sub_012").await;
    seed_subscription(&stores, seller_b.id, dec!(559), "sub_013").await;

    let ActivationOutcome::Applied {
        employee_commission: Some(first),
        ..
    } = ingestor.on_activated(&activation("sub_012", "pay_012")).await.unwrap()
    else {
        panic!("expected employee commission");
    };
    let ActivationOutcome::Applied {
        employee_commission: Some(second),
        ..
    } = ingestor.on_activated(&activation("sub_013", "pay_013")).await.unwrap()
    else {
        panic!("expected employee commission");
    };

    // Reject one first so the batch sees a terminal record.
    ledger.reject_employee(second, admin(), None).await.unwrap();

    let outcomes = ledger
        .approve_employee_batch(&[first, second], admin(), None)
        .await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].result.is_ok());
    assert!(matches!(
        outcomes[1].result,
        Err(LedgerError::InvalidState(_))
    ));

    let wallet = stores
        .wallets
        .wallet(WalletOwner::super_employee(supervisor.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wallet.balance, dec!(44.95));
}

#[tokio::test]
async fn test_concurrent_approvals_credit_wallet_once() {
    let stores = stores();
    let ingestor = SubscriptionIngestor::new(stores.clone());

    let referrer = seed_vendor(&stores, "Referrer", None, None).await;
    let vendor = seed_vendor(&stores, "Vendor", Some(referrer.id), None).await;
    seed_subscription(&stores, vendor.id, dec!(899), "sub_014").await;

    let ActivationOutcome::Applied {
        referral_commission: Some(id),
        ..
    } = ingestor.on_activated(&activation("sub_014", "pay_014")).await.unwrap()
    else {
        panic!("expected referral commission");
    };

    let ledger = std::sync::Arc::new(CommissionLedger::new(stores.clone()));
    let admin_id = admin();
    let attempts = futures::future::join_all((0..4).map(|_| {
        let ledger = ledger.clone();
        async move { ledger.approve_referral(id, admin_id, None).await }
    }))
    .await;

    let successes = attempts.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for failure in attempts.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            failure.as_ref().unwrap_err(),
            LedgerError::InvalidState(_)
        ));
    }

    let wallet = stores
        .wallets
        .wallet(WalletOwner::vendor(referrer.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wallet.balance, dec!(26.97));
    assert_eq!(wallet.transactions.len(), 1);
}

#[tokio::test]
async fn test_settings_admin_validates_inputs() {
    let stores = stores();
    let settings = crate::services::SettingsAdmin::new(stores.clone());
    let admin_id = admin();

    let err = settings
        .update_referral_policy(
            ReferralPolicyPatch {
                percentage: Some(dec!(150)),
                ..Default::default()
            },
            admin_id,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = settings
        .set_vendor_override(Uuid::new_v4(), dec!(-1), admin_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = settings
        .update_withdrawal_policy(
            crate::model::WithdrawalPolicyPatch {
                minimum_amount: Some(dec!(1000)),
                maximum_amount: Some(dec!(500)),
            },
            admin_id,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let updated = settings
        .update_referral_policy(
            ReferralPolicyPatch {
                percentage: Some(dec!(5)),
                ..Default::default()
            },
            admin_id,
        )
        .await
        .unwrap();
    assert_eq!(updated.referral.percentage, dec!(5));
    assert_eq!(updated.updated_by, Some(admin_id));
}

#[tokio::test]
async fn test_wallet_summary_tracks_totals() {
    let stores = stores();
    let vendor = seed_vendor(&stores, "Vendor", None, None).await;
    let owner = WalletOwner::vendor(vendor.id);

    stores.wallets.credit(owner, dec!(100), "c1", None).await.unwrap();
    stores.wallets.credit(owner, dec!(200), "c2", None).await.unwrap();
    stores.wallets.debit(owner, dec!(50), "d1", None).await.unwrap();

    let summary = stores.wallets.summary(owner, 2).await.unwrap().unwrap();
    assert_eq!(summary.balance, dec!(250));
    assert_eq!(summary.total_credits, dec!(300));
    assert_eq!(summary.total_debits, dec!(50));
    assert_eq!(summary.transaction_count, 3);
    assert_eq!(summary.recent_transactions.len(), 2);
    assert_eq!(summary.recent_transactions[0].description, "d1");
}
