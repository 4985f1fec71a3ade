//! Shared fixtures for integration tests.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use payledger::model::{
    BankAccount, CommissionBreakdown, CommissionStatus, District, EmployeeCommission,
    PaymentStamp, PayoutMethod, Period, PlanTag, ReferralCommission, Subscription,
    SubscriptionStatus, SubscriptionSummary, VendorProfile,
};

pub fn sample_vendor(referred_by: Option<Uuid>, assigned_employee: Option<Uuid>) -> VendorProfile {
    let id = Uuid::new_v4();
    VendorProfile {
        id,
        name: format!("Vendor {}", &id.to_string()[..8]),
        shop_name: Some("Corner Shop".to_string()),
        city: Some("Chennai".to_string()),
        state: Some("Tamil Nadu".to_string()),
        referral_code: Some(format!("REF{}", &id.simple().to_string()[..8].to_uppercase())),
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
    }
}

pub fn sample_subscription(vendor: Uuid, amount: Decimal) -> Subscription {
    let id = Uuid::new_v4();
    let now = Utc::now();
    Subscription {
        id,
        vendor,
        plan: PlanTag::OneYear,
        amount,
        currency: "INR".to_string(),
        status: SubscriptionStatus::Pending,
        start_date: None,
        end_date: None,
        gateway_subscription_id: Some(format!("sub_{}", id.simple())),
        gateway_payment_id: None,
        gateway_order_id: None,
        cancelled_at: None,
        payment_history: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

pub fn pending_referral_commission(
    referrer: Uuid,
    referred_vendor: Uuid,
    subscription: Uuid,
) -> ReferralCommission {
    let now = Utc::now();
    ReferralCommission {
        id: Uuid::new_v4(),
        referrer,
        referred_vendor,
        referral_code: "REFCODE1".to_string(),
        breakdown: CommissionBreakdown {
            percentage: dec!(3),
            amount: dec!(26.97),
            subscription_amount: dec!(899),
        },
        currency: "INR".to_string(),
        plan: PlanTag::OneYear,
        subscription,
        status: CommissionStatus::Pending,
        payment: PaymentStamp::default(),
        admin: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn pending_employee_commission(
    employee: Uuid,
    seller: Uuid,
    subscription: Uuid,
) -> EmployeeCommission {
    let now = Utc::now();
    EmployeeCommission {
        id: Uuid::new_v4(),
        employee,
        seller,
        subscription,
        breakdown: CommissionBreakdown {
            percentage: dec!(5),
            amount: dec!(44.95),
            subscription_amount: dec!(899),
        },
        status: CommissionStatus::Pending,
        district: District {
            name: "Chennai".to_string(),
            state: "Tamil Nadu".to_string(),
        },
        period: Period {
            start_date: now,
            end_date: now + Duration::days(365),
        },
        payment: PaymentStamp::default(),
        admin: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn upi() -> PayoutMethod {
    PayoutMethod::Upi {
        upi_id: "vendor@okicici".to_string(),
    }
}

pub fn bank_account() -> BankAccount {
    BankAccount {
        account_number: "123456789012".to_string(),
        ifsc_code: "HDFC0001234".to_string(),
        account_holder_name: "A Vendor".to_string(),
        bank_name: "HDFC Bank".to_string(),
    }
}
