//! SQLite CommissionStore implementation.
//!
//! Settlement is one transaction: the conditional status flip, the wallet
//! credit, and (for employee commissions) the earnings counters commit or
//! roll back together. A flip that matches zero rows aborts with
//! `InvalidState` before any wallet write.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_query::{Expr, OnConflict, Order, Query, SimpleExpr, SqliteQueryBuilder};
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::error::{LedgerError, Result};
use crate::model::{
    AdminStamp, CommissionId, CommissionStatus, District, EmployeeCommission, EmployeeId,
    CommissionBreakdown, PaymentStamp, Period, ReferralCommission, StatusRollup, VendorId,
};
use crate::storage::schema::{EmployeeCommissions, Employees, ReferralCommissions};
use crate::storage::CommissionStore;

use super::helpers::{
    apply_credit, begin_immediate, commit, fmt_datetime, parse_datetime, parse_decimal,
    parse_enum, parse_opt_datetime, parse_opt_uuid, parse_uuid, rollback, rollup_rows,
};

/// SQLite implementation of CommissionStore.
pub struct SqliteCommissionStore {
    pool: SqlitePool,
}

const REFERRAL_COLUMNS: [ReferralCommissions; 18] = [
    ReferralCommissions::Id,
    ReferralCommissions::ReferrerId,
    ReferralCommissions::ReferredVendorId,
    ReferralCommissions::ReferralCode,
    ReferralCommissions::Percentage,
    ReferralCommissions::Amount,
    ReferralCommissions::SubscriptionAmount,
    ReferralCommissions::Currency,
    ReferralCommissions::Plan,
    ReferralCommissions::SubscriptionId,
    ReferralCommissions::Status,
    ReferralCommissions::PaidAt,
    ReferralCommissions::TransactionId,
    ReferralCommissions::ProcessedBy,
    ReferralCommissions::ProcessedAt,
    ReferralCommissions::AdminNotes,
    ReferralCommissions::CreatedAt,
    ReferralCommissions::UpdatedAt,
];

const EMPLOYEE_COLUMNS: [EmployeeCommissions; 19] = [
    EmployeeCommissions::Id,
    EmployeeCommissions::EmployeeId,
    EmployeeCommissions::SellerId,
    EmployeeCommissions::SubscriptionId,
    EmployeeCommissions::Percentage,
    EmployeeCommissions::Amount,
    EmployeeCommissions::SubscriptionAmount,
    EmployeeCommissions::Status,
    EmployeeCommissions::DistrictName,
    EmployeeCommissions::DistrictState,
    EmployeeCommissions::PeriodStart,
    EmployeeCommissions::PeriodEnd,
    EmployeeCommissions::PaidAt,
    EmployeeCommissions::TransactionId,
    EmployeeCommissions::ProcessedBy,
    EmployeeCommissions::ProcessedAt,
    EmployeeCommissions::AdminNotes,
    EmployeeCommissions::CreatedAt,
    EmployeeCommissions::UpdatedAt,
];

fn referral_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ReferralCommission> {
    let admin = match parse_opt_uuid(row.get("processed_by"))? {
        Some(processed_by) => Some(AdminStamp {
            processed_by,
            processed_at: parse_opt_datetime(row.get("processed_at"))?
                .unwrap_or_else(Utc::now),
            notes: row.get("admin_notes"),
        }),
        None => None,
    };

    Ok(ReferralCommission {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        referrer: parse_uuid(&row.get::<String, _>("referrer_id"))?,
        referred_vendor: parse_uuid(&row.get::<String, _>("referred_vendor_id"))?,
        referral_code: row.get("referral_code"),
        breakdown: CommissionBreakdown {
            percentage: parse_decimal(&row.get::<String, _>("percentage"))?,
            amount: parse_decimal(&row.get::<String, _>("amount"))?,
            subscription_amount: parse_decimal(&row.get::<String, _>("subscription_amount"))?,
        },
        currency: row.get("currency"),
        plan: parse_enum(&row.get::<String, _>("plan"))?,
        subscription: parse_uuid(&row.get::<String, _>("subscription_id"))?,
        status: parse_enum(&row.get::<String, _>("status"))?,
        payment: PaymentStamp {
            paid_at: parse_opt_datetime(row.get("paid_at"))?,
            transaction_id: row.get("transaction_id"),
        },
        admin,
        created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
        updated_at: parse_datetime(&row.get::<String, _>("updated_at"))?,
    })
}

fn employee_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<EmployeeCommission> {
    let admin = match parse_opt_uuid(row.get("processed_by"))? {
        Some(processed_by) => Some(AdminStamp {
            processed_by,
            processed_at: parse_opt_datetime(row.get("processed_at"))?
                .unwrap_or_else(Utc::now),
            notes: row.get("admin_notes"),
        }),
        None => None,
    };

    Ok(EmployeeCommission {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        employee: parse_uuid(&row.get::<String, _>("employee_id"))?,
        seller: parse_uuid(&row.get::<String, _>("seller_id"))?,
        subscription: parse_uuid(&row.get::<String, _>("subscription_id"))?,
        breakdown: CommissionBreakdown {
            percentage: parse_decimal(&row.get::<String, _>("percentage"))?,
            amount: parse_decimal(&row.get::<String, _>("amount"))?,
            subscription_amount: parse_decimal(&row.get::<String, _>("subscription_amount"))?,
        },
        status: parse_enum(&row.get::<String, _>("status"))?,
        district: District {
            name: row.get("district_name"),
            state: row.get("district_state"),
        },
        period: Period {
            start_date: parse_datetime(&row.get::<String, _>("period_start"))?,
            end_date: parse_datetime(&row.get::<String, _>("period_end"))?,
        },
        payment: PaymentStamp {
            paid_at: parse_opt_datetime(row.get("paid_at"))?,
            transaction_id: row.get("transaction_id"),
        },
        admin,
        created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
        updated_at: parse_datetime(&row.get::<String, _>("updated_at"))?,
    })
}

impl SqliteCommissionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Conditional pending→target flip. Zero matched rows distinguishes
    /// missing records from already-processed ones.
    async fn flip_referral(
        conn: &mut SqliteConnection,
        id: CommissionId,
        target: CommissionStatus,
        stamp: &AdminStamp,
        payment: Option<&str>,
    ) -> Result<ReferralCommission> {
        let mut values: Vec<(ReferralCommissions, SimpleExpr)> = vec![
            (ReferralCommissions::Status, target.as_str().into()),
            (
                ReferralCommissions::ProcessedBy,
                stamp.processed_by.to_string().into(),
            ),
            (
                ReferralCommissions::ProcessedAt,
                fmt_datetime(stamp.processed_at).into(),
            ),
            (
                ReferralCommissions::AdminNotes,
                stamp.notes.as_deref().into(),
            ),
            (
                ReferralCommissions::UpdatedAt,
                fmt_datetime(Utc::now()).into(),
            ),
        ];
        if let Some(transaction_id) = payment {
            values.push((ReferralCommissions::TransactionId, transaction_id.into()));
            values.push((
                ReferralCommissions::PaidAt,
                fmt_datetime(stamp.processed_at).into(),
            ));
        }

        let query = Query::update()
            .table(ReferralCommissions::Table)
            .values(values)
            .and_where(Expr::col(ReferralCommissions::Id).eq(id.to_string()))
            .and_where(
                Expr::col(ReferralCommissions::Status).eq(CommissionStatus::Pending.as_str()),
            )
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&mut *conn).await?;
        if result.rows_affected() == 0 {
            return Err(Self::referral_flip_failure(conn, id).await);
        }

        let query = Query::select()
            .columns(REFERRAL_COLUMNS)
            .from(ReferralCommissions::Table)
            .and_where(Expr::col(ReferralCommissions::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query).fetch_one(&mut *conn).await?;
        referral_from_row(&row)
    }

    async fn referral_flip_failure(conn: &mut SqliteConnection, id: CommissionId) -> LedgerError {
        let query = Query::select()
            .column(ReferralCommissions::Id)
            .from(ReferralCommissions::Table)
            .and_where(Expr::col(ReferralCommissions::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);
        match sqlx::query(&query).fetch_optional(&mut *conn).await {
            Ok(Some(_)) => {
                LedgerError::InvalidState("commission has already been processed".into())
            }
            Ok(None) => LedgerError::not_found("referral commission", id),
            Err(e) => e.into(),
        }
    }

    async fn flip_employee(
        conn: &mut SqliteConnection,
        id: CommissionId,
        target: CommissionStatus,
        stamp: &AdminStamp,
        payment: Option<&str>,
    ) -> Result<EmployeeCommission> {
        let mut values: Vec<(EmployeeCommissions, SimpleExpr)> = vec![
            (EmployeeCommissions::Status, target.as_str().into()),
            (
                EmployeeCommissions::ProcessedBy,
                stamp.processed_by.to_string().into(),
            ),
            (
                EmployeeCommissions::ProcessedAt,
                fmt_datetime(stamp.processed_at).into(),
            ),
            (
                EmployeeCommissions::AdminNotes,
                stamp.notes.as_deref().into(),
            ),
            (
                EmployeeCommissions::UpdatedAt,
                fmt_datetime(Utc::now()).into(),
            ),
        ];
        if let Some(transaction_id) = payment {
            values.push((EmployeeCommissions::TransactionId, transaction_id.into()));
            values.push((
                EmployeeCommissions::PaidAt,
                fmt_datetime(stamp.processed_at).into(),
            ));
        }

        let query = Query::update()
            .table(EmployeeCommissions::Table)
            .values(values)
            .and_where(Expr::col(EmployeeCommissions::Id).eq(id.to_string()))
            .and_where(
                Expr::col(EmployeeCommissions::Status).eq(CommissionStatus::Pending.as_str()),
            )
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&mut *conn).await?;
        if result.rows_affected() == 0 {
            return Err(Self::employee_flip_failure(conn, id).await);
        }

        let query = Query::select()
            .columns(EMPLOYEE_COLUMNS)
            .from(EmployeeCommissions::Table)
            .and_where(Expr::col(EmployeeCommissions::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query).fetch_one(&mut *conn).await?;
        employee_from_row(&row)
    }

    async fn employee_flip_failure(conn: &mut SqliteConnection, id: CommissionId) -> LedgerError {
        let query = Query::select()
            .column(EmployeeCommissions::Id)
            .from(EmployeeCommissions::Table)
            .and_where(Expr::col(EmployeeCommissions::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);
        match sqlx::query(&query).fetch_optional(&mut *conn).await {
            Ok(Some(_)) => {
                LedgerError::InvalidState("commission has already been processed".into())
            }
            Ok(None) => LedgerError::not_found("employee commission", id),
            Err(e) => e.into(),
        }
    }

    /// Bump the payee's earning counters after a settlement.
    async fn record_earnings(
        conn: &mut SqliteConnection,
        employee: EmployeeId,
        amount: Decimal,
    ) -> Result<()> {
        let query = Query::select()
            .column(Employees::TotalCommissionEarned)
            .from(Employees::Table)
            .and_where(Expr::col(Employees::Id).eq(employee.to_string()))
            .to_string(SqliteQueryBuilder);
        let Some(row) = sqlx::query(&query).fetch_optional(&mut *conn).await? else {
            return Ok(());
        };
        let earned = parse_decimal(&row.get::<String, _>(0))? + amount;

        let query = Query::update()
            .table(Employees::Table)
            .values([
                (
                    Employees::TotalCommissionEarned,
                    earned.to_string().into(),
                ),
                (
                    Employees::LastCommissionAt,
                    fmt_datetime(Utc::now()).into(),
                ),
            ])
            .and_where(Expr::col(Employees::Id).eq(employee.to_string()))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;
        Ok(())
    }
}

#[async_trait]
impl CommissionStore for SqliteCommissionStore {
    async fn insert_referral(&self, commission: &ReferralCommission) -> Result<bool> {
        let query = Query::insert()
            .into_table(ReferralCommissions::Table)
            .columns(REFERRAL_COLUMNS)
            .values_panic([
                commission.id.to_string().into(),
                commission.referrer.to_string().into(),
                commission.referred_vendor.to_string().into(),
                commission.referral_code.as_str().into(),
                commission.breakdown.percentage.to_string().into(),
                commission.breakdown.amount.to_string().into(),
                commission.breakdown.subscription_amount.to_string().into(),
                commission.currency.as_str().into(),
                commission.plan.as_str().into(),
                commission.subscription.to_string().into(),
                commission.status.as_str().into(),
                commission.payment.paid_at.map(fmt_datetime).into(),
                commission.payment.transaction_id.as_deref().into(),
                commission.admin.as_ref().map(|a| a.processed_by.to_string()).into(),
                commission
                    .admin
                    .as_ref()
                    .map(|a| fmt_datetime(a.processed_at))
                    .into(),
                commission
                    .admin
                    .as_ref()
                    .and_then(|a| a.notes.as_deref())
                    .into(),
                fmt_datetime(commission.created_at).into(),
                fmt_datetime(commission.updated_at).into(),
            ])
            .on_conflict(
                OnConflict::columns([
                    ReferralCommissions::ReferrerId,
                    ReferralCommissions::SubscriptionId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_employee(&self, commission: &EmployeeCommission) -> Result<bool> {
        let query = Query::insert()
            .into_table(EmployeeCommissions::Table)
            .columns(EMPLOYEE_COLUMNS)
            .values_panic([
                commission.id.to_string().into(),
                commission.employee.to_string().into(),
                commission.seller.to_string().into(),
                commission.subscription.to_string().into(),
                commission.breakdown.percentage.to_string().into(),
                commission.breakdown.amount.to_string().into(),
                commission.breakdown.subscription_amount.to_string().into(),
                commission.status.as_str().into(),
                commission.district.name.as_str().into(),
                commission.district.state.as_str().into(),
                fmt_datetime(commission.period.start_date).into(),
                fmt_datetime(commission.period.end_date).into(),
                commission.payment.paid_at.map(fmt_datetime).into(),
                commission.payment.transaction_id.as_deref().into(),
                commission.admin.as_ref().map(|a| a.processed_by.to_string()).into(),
                commission
                    .admin
                    .as_ref()
                    .map(|a| fmt_datetime(a.processed_at))
                    .into(),
                commission
                    .admin
                    .as_ref()
                    .and_then(|a| a.notes.as_deref())
                    .into(),
                fmt_datetime(commission.created_at).into(),
                fmt_datetime(commission.updated_at).into(),
            ])
            .on_conflict(
                OnConflict::columns([
                    EmployeeCommissions::EmployeeId,
                    EmployeeCommissions::SellerId,
                    EmployeeCommissions::SubscriptionId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn referral(&self, id: CommissionId) -> Result<Option<ReferralCommission>> {
        let query = Query::select()
            .columns(REFERRAL_COLUMNS)
            .from(ReferralCommissions::Table)
            .and_where(Expr::col(ReferralCommissions::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(referral_from_row).transpose()
    }

    async fn employee(&self, id: CommissionId) -> Result<Option<EmployeeCommission>> {
        let query = Query::select()
            .columns(EMPLOYEE_COLUMNS)
            .from(EmployeeCommissions::Table)
            .and_where(Expr::col(EmployeeCommissions::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(employee_from_row).transpose()
    }

    async fn settle_referral(
        &self,
        id: CommissionId,
        stamp: &AdminStamp,
        transaction_id: &str,
        wallet_description: &str,
    ) -> Result<ReferralCommission> {
        let mut conn = begin_immediate(&self.pool).await?;

        let result: Result<ReferralCommission> = async {
            let commission = Self::flip_referral(
                &mut conn,
                id,
                CommissionStatus::Paid,
                stamp,
                Some(transaction_id),
            )
            .await?;
            apply_credit(
                &mut conn,
                commission.referrer,
                commission.breakdown.amount,
                wallet_description,
                Some(&id.to_string()),
            )
            .await?;
            Ok(commission)
        }
        .await;

        match result {
            Ok(commission) => {
                commit(&mut conn).await?;
                Ok(commission)
            }
            Err(e) => {
                rollback(&mut conn).await;
                Err(e)
            }
        }
    }

    async fn settle_employee(
        &self,
        id: CommissionId,
        stamp: &AdminStamp,
        transaction_id: &str,
        wallet_description: &str,
    ) -> Result<EmployeeCommission> {
        let mut conn = begin_immediate(&self.pool).await?;

        let result: Result<EmployeeCommission> = async {
            let commission = Self::flip_employee(
                &mut conn,
                id,
                CommissionStatus::Paid,
                stamp,
                Some(transaction_id),
            )
            .await?;
            apply_credit(
                &mut conn,
                commission.employee,
                commission.breakdown.amount,
                wallet_description,
                Some(&id.to_string()),
            )
            .await?;
            Self::record_earnings(&mut conn, commission.employee, commission.breakdown.amount)
                .await?;
            Ok(commission)
        }
        .await;

        match result {
            Ok(commission) => {
                commit(&mut conn).await?;
                Ok(commission)
            }
            Err(e) => {
                rollback(&mut conn).await;
                Err(e)
            }
        }
    }

    async fn reject_referral(
        &self,
        id: CommissionId,
        stamp: &AdminStamp,
    ) -> Result<ReferralCommission> {
        let mut conn = begin_immediate(&self.pool).await?;
        let result =
            Self::flip_referral(&mut conn, id, CommissionStatus::Cancelled, stamp, None).await;
        match result {
            Ok(commission) => {
                commit(&mut conn).await?;
                Ok(commission)
            }
            Err(e) => {
                rollback(&mut conn).await;
                Err(e)
            }
        }
    }

    async fn reject_employee(
        &self,
        id: CommissionId,
        stamp: &AdminStamp,
    ) -> Result<EmployeeCommission> {
        let mut conn = begin_immediate(&self.pool).await?;
        let result =
            Self::flip_employee(&mut conn, id, CommissionStatus::Cancelled, stamp, None).await;
        match result {
            Ok(commission) => {
                commit(&mut conn).await?;
                Ok(commission)
            }
            Err(e) => {
                rollback(&mut conn).await;
                Err(e)
            }
        }
    }

    async fn list_referrals(
        &self,
        referrer: Option<VendorId>,
        status: Option<CommissionStatus>,
    ) -> Result<Vec<ReferralCommission>> {
        let mut query = Query::select()
            .columns(REFERRAL_COLUMNS)
            .from(ReferralCommissions::Table)
            .order_by(ReferralCommissions::CreatedAt, Order::Desc)
            .to_owned();
        if let Some(referrer) = referrer {
            query.and_where(Expr::col(ReferralCommissions::ReferrerId).eq(referrer.to_string()));
        }
        if let Some(status) = status {
            query.and_where(Expr::col(ReferralCommissions::Status).eq(status.as_str()));
        }

        let rows = sqlx::query(&query.to_string(SqliteQueryBuilder))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(referral_from_row).collect()
    }

    async fn list_employee_commissions(
        &self,
        employee: Option<EmployeeId>,
        status: Option<CommissionStatus>,
    ) -> Result<Vec<EmployeeCommission>> {
        let mut query = Query::select()
            .columns(EMPLOYEE_COLUMNS)
            .from(EmployeeCommissions::Table)
            .order_by(EmployeeCommissions::CreatedAt, Order::Desc)
            .to_owned();
        if let Some(employee) = employee {
            query.and_where(Expr::col(EmployeeCommissions::EmployeeId).eq(employee.to_string()));
        }
        if let Some(status) = status {
            query.and_where(Expr::col(EmployeeCommissions::Status).eq(status.as_str()));
        }

        let rows = sqlx::query(&query.to_string(SqliteQueryBuilder))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(employee_from_row).collect()
    }

    async fn referral_rollup(&self) -> Result<Vec<StatusRollup>> {
        let query = Query::select()
            .columns([ReferralCommissions::Status, ReferralCommissions::Amount])
            .from(ReferralCommissions::Table)
            .to_string(SqliteQueryBuilder);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            pairs.push((
                row.get::<String, _>("status"),
                parse_decimal(&row.get::<String, _>("amount"))?,
            ));
        }
        Ok(rollup_rows(pairs))
    }

    async fn employee_rollup(&self, employee: Option<EmployeeId>) -> Result<Vec<StatusRollup>> {
        let mut query = Query::select()
            .columns([EmployeeCommissions::Status, EmployeeCommissions::Amount])
            .from(EmployeeCommissions::Table)
            .to_owned();
        if let Some(employee) = employee {
            query.and_where(Expr::col(EmployeeCommissions::EmployeeId).eq(employee.to_string()));
        }
        let rows = sqlx::query(&query.to_string(SqliteQueryBuilder))
            .fetch_all(&self.pool)
            .await?;
        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            pairs.push((
                row.get::<String, _>("status"),
                parse_decimal(&row.get::<String, _>("amount"))?,
            ));
        }
        Ok(rollup_rows(pairs))
    }
}
