//! Database schema definitions using sea-query.
//!
//! Identifier enums for type-safe query building plus the DDL executed by
//! `init()`. Monetary columns are stored as canonical decimal strings;
//! timestamps as RFC 3339 text; append-ordering rides on SQLite's rowid.

use sea_query::Iden;

/// Subscriptions table schema.
#[derive(Iden)]
pub enum Subscriptions {
    Table,
    Id,
    VendorId,
    Plan,
    Amount,
    Currency,
    Status,
    StartDate,
    EndDate,
    GatewaySubscriptionId,
    GatewayPaymentId,
    GatewayOrderId,
    CancelledAt,
    CreatedAt,
    UpdatedAt,
}

/// Subscription payment history table schema.
#[derive(Iden)]
pub enum SubscriptionPayments {
    Table,
    SubscriptionId,
    Amount,
    Outcome,
    GatewayPaymentId,
    Description,
    RecordedAt,
}

/// Wallets table schema.
#[derive(Iden)]
pub enum Wallets {
    Table,
    OwnerId,
    OwnerKind,
    Balance,
    CreatedAt,
    UpdatedAt,
}

/// Wallet transactions table schema.
#[derive(Iden)]
pub enum WalletTransactions {
    Table,
    Id,
    OwnerId,
    Kind,
    Amount,
    Description,
    Reference,
    CreatedAt,
}

/// Referral commissions table schema.
#[derive(Iden)]
pub enum ReferralCommissions {
    Table,
    Id,
    ReferrerId,
    ReferredVendorId,
    ReferralCode,
    Percentage,
    Amount,
    SubscriptionAmount,
    Currency,
    Plan,
    SubscriptionId,
    Status,
    PaidAt,
    TransactionId,
    ProcessedBy,
    ProcessedAt,
    AdminNotes,
    CreatedAt,
    UpdatedAt,
}

/// Employee commissions table schema.
#[derive(Iden)]
pub enum EmployeeCommissions {
    Table,
    Id,
    EmployeeId,
    SellerId,
    SubscriptionId,
    Percentage,
    Amount,
    SubscriptionAmount,
    Status,
    DistrictName,
    DistrictState,
    PeriodStart,
    PeriodEnd,
    PaidAt,
    TransactionId,
    ProcessedBy,
    ProcessedAt,
    AdminNotes,
    CreatedAt,
    UpdatedAt,
}

/// Withdrawal requests table schema.
#[derive(Iden)]
pub enum WithdrawalRequests {
    Table,
    Id,
    OwnerId,
    Amount,
    Method,
    UpiId,
    AccountNumber,
    IfscCode,
    AccountHolderName,
    BankName,
    Status,
    RequestedAt,
    ProcessedAt,
    ProcessedBy,
    AdminNotes,
    TransactionId,
}

/// System settings singleton table schema.
#[derive(Iden)]
pub enum SystemSettings {
    Table,
    Id,
    ReferralPercentage,
    ReferralActive,
    MinSubscriptionAmount,
    MaxCommissionPerReferral,
    WithdrawalMin,
    WithdrawalMax,
    UpdatedBy,
    UpdatedAt,
}

/// Vendor commission overrides table schema.
#[derive(Iden)]
pub enum VendorCommissionOverrides {
    Table,
    VendorId,
    Percentage,
    IsCustom,
    IsActive,
    SetBy,
    Notes,
    CreatedAt,
    UpdatedAt,
}

/// Vendors table schema (the slice the settlement core owns).
#[derive(Iden)]
pub enum Vendors {
    Table,
    Id,
    Name,
    ShopName,
    City,
    State,
    ReferralCode,
    ReferredBy,
    AssignedEmployee,
    SubActive,
    SubPlan,
    SubStart,
    SubEnd,
    SubGatewaySubscriptionId,
    SubGatewayPaymentId,
}

/// Employees table schema.
#[derive(Iden)]
pub enum Employees {
    Table,
    Id,
    Name,
    EmployeeCode,
    Role,
    SuperEmployeeId,
    EmployeeCommissionPercentage,
    CommissionPercentage,
    CommissionActive,
    TotalSellersAssigned,
    TotalCommissionEarned,
    LastCommissionAt,
}

/// SQL for creating the subscriptions tables.
pub const CREATE_SUBSCRIPTIONS_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS subscriptions (
    id TEXT PRIMARY KEY,
    vendor_id TEXT NOT NULL,
    plan TEXT NOT NULL,
    amount TEXT NOT NULL,
    currency TEXT NOT NULL DEFAULT 'INR',
    status TEXT NOT NULL,
    start_date TEXT,
    end_date TEXT,
    gateway_subscription_id TEXT,
    gateway_payment_id TEXT,
    gateway_order_id TEXT,
    cancelled_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_subscriptions_vendor ON subscriptions(vendor_id);
CREATE INDEX IF NOT EXISTS idx_subscriptions_status ON subscriptions(status);
CREATE INDEX IF NOT EXISTS idx_subscriptions_gateway_sub ON subscriptions(gateway_subscription_id);
CREATE INDEX IF NOT EXISTS idx_subscriptions_gateway_pay ON subscriptions(gateway_payment_id);

CREATE TABLE IF NOT EXISTS subscription_payments (
    subscription_id TEXT NOT NULL,
    amount TEXT NOT NULL,
    outcome TEXT NOT NULL,
    gateway_payment_id TEXT,
    description TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_subscription_payments_sub ON subscription_payments(subscription_id);
"#;

/// SQL for creating the wallet tables.
pub const CREATE_WALLET_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS wallets (
    owner_id TEXT PRIMARY KEY,
    owner_kind TEXT NOT NULL,
    balance TEXT NOT NULL DEFAULT '0',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS wallet_transactions (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('credit', 'debit')),
    amount TEXT NOT NULL,
    description TEXT NOT NULL,
    reference TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_wallet_transactions_owner ON wallet_transactions(owner_id);
"#;

/// SQL for creating the commission tables.
///
/// The unique indexes on (referrer, subscription) and
/// (employee, seller, subscription) are what make commission creation
/// idempotent under webhook redelivery.
pub const CREATE_COMMISSION_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS referral_commissions (
    id TEXT PRIMARY KEY,
    referrer_id TEXT NOT NULL,
    referred_vendor_id TEXT NOT NULL,
    referral_code TEXT NOT NULL,
    percentage TEXT NOT NULL,
    amount TEXT NOT NULL,
    subscription_amount TEXT NOT NULL,
    currency TEXT NOT NULL DEFAULT 'INR',
    plan TEXT NOT NULL,
    subscription_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    paid_at TEXT,
    transaction_id TEXT,
    processed_by TEXT,
    processed_at TEXT,
    admin_notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS uniq_referral_commission
    ON referral_commissions(referrer_id, subscription_id);
CREATE INDEX IF NOT EXISTS idx_referral_commissions_status ON referral_commissions(status);

CREATE TABLE IF NOT EXISTS employee_commissions (
    id TEXT PRIMARY KEY,
    employee_id TEXT NOT NULL,
    seller_id TEXT NOT NULL,
    subscription_id TEXT NOT NULL,
    percentage TEXT NOT NULL,
    amount TEXT NOT NULL,
    subscription_amount TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    district_name TEXT NOT NULL,
    district_state TEXT NOT NULL,
    period_start TEXT NOT NULL,
    period_end TEXT NOT NULL,
    paid_at TEXT,
    transaction_id TEXT,
    processed_by TEXT,
    processed_at TEXT,
    admin_notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS uniq_employee_commission
    ON employee_commissions(employee_id, seller_id, subscription_id);
CREATE INDEX IF NOT EXISTS idx_employee_commissions_status ON employee_commissions(status);
"#;

/// SQL for creating the withdrawal requests table.
pub const CREATE_WITHDRAWAL_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS withdrawal_requests (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    amount TEXT NOT NULL,
    method TEXT NOT NULL CHECK (method IN ('upi', 'bank')),
    upi_id TEXT,
    account_number TEXT,
    ifsc_code TEXT,
    account_holder_name TEXT,
    bank_name TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    requested_at TEXT NOT NULL,
    processed_at TEXT,
    processed_by TEXT,
    admin_notes TEXT,
    transaction_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_withdrawal_requests_owner ON withdrawal_requests(owner_id);
CREATE INDEX IF NOT EXISTS idx_withdrawal_requests_status ON withdrawal_requests(status);
"#;

/// SQL for creating the settings tables.
pub const CREATE_SETTINGS_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS system_settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    referral_percentage TEXT NOT NULL,
    referral_active INTEGER NOT NULL,
    min_subscription_amount TEXT NOT NULL,
    max_commission_per_referral TEXT NOT NULL,
    withdrawal_min TEXT NOT NULL,
    withdrawal_max TEXT NOT NULL,
    updated_by TEXT,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS vendor_commission_overrides (
    vendor_id TEXT PRIMARY KEY,
    percentage TEXT NOT NULL,
    is_custom INTEGER NOT NULL,
    is_active INTEGER NOT NULL,
    set_by TEXT NOT NULL,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// SQL for creating the party tables.
pub const CREATE_PARTY_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS vendors (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    shop_name TEXT,
    city TEXT,
    state TEXT,
    referral_code TEXT,
    referred_by TEXT,
    assigned_employee TEXT,
    sub_active INTEGER NOT NULL DEFAULT 0,
    sub_plan TEXT,
    sub_start TEXT,
    sub_end TEXT,
    sub_gateway_subscription_id TEXT,
    sub_gateway_payment_id TEXT
);

CREATE TABLE IF NOT EXISTS employees (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    employee_code TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('employee', 'super_employee')),
    super_employee_id TEXT,
    employee_commission_percentage TEXT NOT NULL DEFAULT '0',
    commission_percentage TEXT NOT NULL DEFAULT '0',
    commission_active INTEGER NOT NULL DEFAULT 0,
    total_sellers_assigned INTEGER NOT NULL DEFAULT 0,
    total_commission_earned TEXT NOT NULL DEFAULT '0',
    last_commission_at TEXT
);
"#;
