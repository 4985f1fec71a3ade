//! SQLite WithdrawalStore implementation.
//!
//! Approval is one transaction: the conditional pending→approved flip and
//! the wallet debit commit or roll back together. The balance check happens
//! at approval time against the live balance, not the one seen at request
//! time.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_query::{Expr, Order, Query, SimpleExpr, SqliteQueryBuilder};
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::error::{LedgerError, Result};
use crate::model::{
    AdminStamp, BankAccount, PayoutMethod, StatusRollup, TransactionKind, VendorId,
    WithdrawalId, WithdrawalRequest, WithdrawalStatus,
};
use crate::storage::schema::WithdrawalRequests;
use crate::storage::WithdrawalStore;

use super::helpers::{
    append_entry, apply_debit, begin_immediate, commit, decode_err, fmt_datetime, parse_datetime,
    parse_decimal, parse_enum, parse_opt_datetime, parse_opt_uuid, parse_uuid, rollback,
    rollup_rows,
};

/// SQLite implementation of WithdrawalStore.
pub struct SqliteWithdrawalStore {
    pool: SqlitePool,
}

const WITHDRAWAL_COLUMNS: [WithdrawalRequests; 15] = [
    WithdrawalRequests::Id,
    WithdrawalRequests::OwnerId,
    WithdrawalRequests::Amount,
    WithdrawalRequests::Method,
    WithdrawalRequests::UpiId,
    WithdrawalRequests::AccountNumber,
    WithdrawalRequests::IfscCode,
    WithdrawalRequests::AccountHolderName,
    WithdrawalRequests::BankName,
    WithdrawalRequests::Status,
    WithdrawalRequests::RequestedAt,
    WithdrawalRequests::ProcessedAt,
    WithdrawalRequests::ProcessedBy,
    WithdrawalRequests::AdminNotes,
    WithdrawalRequests::TransactionId,
];

fn request_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<WithdrawalRequest> {
    let method = match row.get::<String, _>("method").as_str() {
        "upi" => PayoutMethod::Upi {
            upi_id: row
                .get::<Option<String>, _>("upi_id")
                .ok_or_else(|| decode_err("upi withdrawal without upi_id"))?,
        },
        "bank" => PayoutMethod::Bank(BankAccount {
            account_number: row
                .get::<Option<String>, _>("account_number")
                .ok_or_else(|| decode_err("bank withdrawal without account number"))?,
            ifsc_code: row
                .get::<Option<String>, _>("ifsc_code")
                .ok_or_else(|| decode_err("bank withdrawal without IFSC code"))?,
            account_holder_name: row.get::<Option<String>, _>("account_holder_name").unwrap_or_default(),
            bank_name: row.get::<Option<String>, _>("bank_name").unwrap_or_default(),
        }),
        other => return Err(decode_err(format!("unknown payout method: {other}"))),
    };

    Ok(WithdrawalRequest {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        owner: parse_uuid(&row.get::<String, _>("owner_id"))?,
        amount: parse_decimal(&row.get::<String, _>("amount"))?,
        method,
        status: parse_enum(&row.get::<String, _>("status"))?,
        requested_at: parse_datetime(&row.get::<String, _>("requested_at"))?,
        processed_at: parse_opt_datetime(row.get("processed_at"))?,
        processed_by: parse_opt_uuid(row.get("processed_by"))?,
        admin_notes: row.get("admin_notes"),
        transaction_id: row.get("transaction_id"),
    })
}

impl SqliteWithdrawalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Conditional pending→target flip; zero matched rows distinguishes
    /// missing requests from already-processed ones.
    async fn flip(
        conn: &mut SqliteConnection,
        id: WithdrawalId,
        target: WithdrawalStatus,
        stamp: &AdminStamp,
        transaction_id: Option<&str>,
    ) -> Result<WithdrawalRequest> {
        let mut values: Vec<(WithdrawalRequests, SimpleExpr)> = vec![
            (WithdrawalRequests::Status, target.as_str().into()),
            (
                WithdrawalRequests::ProcessedAt,
                fmt_datetime(stamp.processed_at).into(),
            ),
            (
                WithdrawalRequests::ProcessedBy,
                stamp.processed_by.to_string().into(),
            ),
            (
                WithdrawalRequests::AdminNotes,
                stamp.notes.as_deref().into(),
            ),
        ];
        if let Some(transaction_id) = transaction_id {
            values.push((WithdrawalRequests::TransactionId, transaction_id.into()));
        }

        let query = Query::update()
            .table(WithdrawalRequests::Table)
            .values(values)
            .and_where(Expr::col(WithdrawalRequests::Id).eq(id.to_string()))
            .and_where(
                Expr::col(WithdrawalRequests::Status).eq(WithdrawalStatus::Pending.as_str()),
            )
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&mut *conn).await?;
        if result.rows_affected() == 0 {
            let query = Query::select()
                .column(WithdrawalRequests::Id)
                .from(WithdrawalRequests::Table)
                .and_where(Expr::col(WithdrawalRequests::Id).eq(id.to_string()))
                .to_string(SqliteQueryBuilder);
            return Err(match sqlx::query(&query).fetch_optional(&mut *conn).await {
                Ok(Some(_)) => LedgerError::InvalidState(
                    "withdrawal request has already been processed".into(),
                ),
                Ok(None) => LedgerError::not_found("withdrawal request", id),
                Err(e) => e.into(),
            });
        }

        let query = Query::select()
            .columns(WITHDRAWAL_COLUMNS)
            .from(WithdrawalRequests::Table)
            .and_where(Expr::col(WithdrawalRequests::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query).fetch_one(&mut *conn).await?;
        request_from_row(&row)
    }
}

#[async_trait]
impl WithdrawalStore for SqliteWithdrawalStore {
    async fn insert(&self, request: &WithdrawalRequest) -> Result<()> {
        let (upi_id, account) = match &request.method {
            PayoutMethod::Upi { upi_id } => (Some(upi_id.as_str()), None),
            PayoutMethod::Bank(account) => (None, Some(account)),
        };

        let query = Query::insert()
            .into_table(WithdrawalRequests::Table)
            .columns(WITHDRAWAL_COLUMNS)
            .values_panic([
                request.id.to_string().into(),
                request.owner.to_string().into(),
                request.amount.to_string().into(),
                request.method.as_str().into(),
                upi_id.into(),
                account.map(|a| a.account_number.as_str()).into(),
                account.map(|a| a.ifsc_code.as_str()).into(),
                account.map(|a| a.account_holder_name.as_str()).into(),
                account.map(|a| a.bank_name.as_str()).into(),
                request.status.as_str().into(),
                fmt_datetime(request.requested_at).into(),
                request.processed_at.map(fmt_datetime).into(),
                request.processed_by.map(|id| id.to_string()).into(),
                request.admin_notes.as_deref().into(),
                request.transaction_id.as_deref().into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn get(&self, id: WithdrawalId) -> Result<Option<WithdrawalRequest>> {
        let query = Query::select()
            .columns(WITHDRAWAL_COLUMNS)
            .from(WithdrawalRequests::Table)
            .and_where(Expr::col(WithdrawalRequests::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(request_from_row).transpose()
    }

    async fn approve(
        &self,
        id: WithdrawalId,
        stamp: &AdminStamp,
        transaction_id: &str,
    ) -> Result<WithdrawalRequest> {
        let mut conn = begin_immediate(&self.pool).await?;

        let result: Result<WithdrawalRequest> = async {
            let request = Self::flip(
                &mut conn,
                id,
                WithdrawalStatus::Approved,
                stamp,
                Some(transaction_id),
            )
            .await?;
            let description = format!(
                "Withdrawal processed via {}",
                request.method.as_str().to_uppercase()
            );
            apply_debit(
                &mut conn,
                request.owner,
                request.amount,
                &description,
                Some(&id.to_string()),
            )
            .await?;
            Ok(request)
        }
        .await;

        match result {
            Ok(request) => {
                commit(&mut conn).await?;
                Ok(request)
            }
            Err(e) => {
                rollback(&mut conn).await;
                Err(e)
            }
        }
    }

    async fn reject(&self, id: WithdrawalId, stamp: &AdminStamp) -> Result<WithdrawalRequest> {
        let mut conn = begin_immediate(&self.pool).await?;

        let result: Result<WithdrawalRequest> = async {
            let request =
                Self::flip(&mut conn, id, WithdrawalStatus::Rejected, stamp, None).await?;
            // Zero-amount entry for the audit trail; the balance is
            // untouched.
            let description = format!(
                "Withdrawal request rejected: {}",
                stamp.notes.as_deref().unwrap_or("No reason provided")
            );
            append_entry(
                &mut conn,
                request.owner,
                TransactionKind::Credit,
                Decimal::ZERO,
                &description,
                Some(&id.to_string()),
            )
            .await?;
            Ok(request)
        }
        .await;

        match result {
            Ok(request) => {
                commit(&mut conn).await?;
                Ok(request)
            }
            Err(e) => {
                rollback(&mut conn).await;
                Err(e)
            }
        }
    }

    async fn list(
        &self,
        owner: Option<VendorId>,
        status: Option<WithdrawalStatus>,
    ) -> Result<Vec<WithdrawalRequest>> {
        let mut query = Query::select()
            .columns(WITHDRAWAL_COLUMNS)
            .from(WithdrawalRequests::Table)
            .order_by(WithdrawalRequests::RequestedAt, Order::Desc)
            .to_owned();
        if let Some(owner) = owner {
            query.and_where(Expr::col(WithdrawalRequests::OwnerId).eq(owner.to_string()));
        }
        if let Some(status) = status {
            query.and_where(Expr::col(WithdrawalRequests::Status).eq(status.as_str()));
        }

        let rows = sqlx::query(&query.to_string(SqliteQueryBuilder))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(request_from_row).collect()
    }

    async fn rollup(&self) -> Result<Vec<StatusRollup>> {
        let query = Query::select()
            .columns([WithdrawalRequests::Status, WithdrawalRequests::Amount])
            .from(WithdrawalRequests::Table)
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
}
