//! Shared SQLite helpers: value codecs, transaction scoping, and the wallet
//! mutation primitives reused by the commission and withdrawal stores.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sea_query::{Expr, Query, SqliteQueryBuilder};
use sqlx::pool::PoolConnection;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::model::TransactionKind;
use crate::storage::schema::{Wallets, WalletTransactions};

/// Wrap a decode failure in the storage error channel.
pub(crate) fn decode_err(msg: impl Into<String>) -> LedgerError {
    LedgerError::Storage(sqlx::Error::Decode(msg.into().into()))
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| decode_err(format!("bad uuid {s:?}: {e}")))
}

pub(crate) fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).map_err(|e| decode_err(format!("bad decimal {s:?}: {e}")))
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode_err(format!("bad timestamp {s:?}: {e}")))
}

/// Canonical timestamp encoding: RFC 3339 UTC with fixed precision, so the
/// column also sorts chronologically as text.
pub(crate) fn fmt_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
    s.as_deref().map(parse_uuid).transpose()
}

pub(crate) fn parse_opt_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_datetime).transpose()
}

pub(crate) fn parse_enum<T: FromStr<Err = String>>(s: &str) -> Result<T> {
    s.parse().map_err(decode_err)
}

/// Acquire a connection and open an immediate transaction.
///
/// BEGIN IMMEDIATE takes the write lock upfront, preventing deadlocks when
/// concurrent DEFERRED transactions race to upgrade from shared to
/// exclusive.
pub(crate) async fn begin_immediate(pool: &SqlitePool) -> Result<PoolConnection<Sqlite>> {
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(conn)
}

pub(crate) async fn commit(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query("COMMIT").execute(&mut *conn).await?;
    Ok(())
}

pub(crate) async fn rollback(conn: &mut SqliteConnection) {
    let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
}

/// Current balance of a wallet, if the wallet exists.
pub(crate) async fn wallet_balance(
    conn: &mut SqliteConnection,
    owner_id: Uuid,
) -> Result<Option<Decimal>> {
    let query = Query::select()
        .column(Wallets::Balance)
        .from(Wallets::Table)
        .and_where(Expr::col(Wallets::OwnerId).eq(owner_id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => {
            let balance: String = row.get(0);
            Ok(Some(parse_decimal(&balance)?))
        }
        None => Ok(None),
    }
}

async fn write_balance(
    conn: &mut SqliteConnection,
    owner_id: Uuid,
    balance: Decimal,
) -> Result<()> {
    let query = Query::update()
        .table(Wallets::Table)
        .values([
            (Wallets::Balance, balance.to_string().into()),
            (Wallets::UpdatedAt, fmt_datetime(Utc::now()).into()),
        ])
        .and_where(Expr::col(Wallets::OwnerId).eq(owner_id.to_string()))
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

/// Append one ledger entry. Ordering rides on rowid; entries are never
/// updated or deleted.
pub(crate) async fn append_entry(
    conn: &mut SqliteConnection,
    owner_id: Uuid,
    kind: TransactionKind,
    amount: Decimal,
    description: &str,
    reference: Option<&str>,
) -> Result<()> {
    let query = Query::insert()
        .into_table(WalletTransactions::Table)
        .columns([
            WalletTransactions::Id,
            WalletTransactions::OwnerId,
            WalletTransactions::Kind,
            WalletTransactions::Amount,
            WalletTransactions::Description,
            WalletTransactions::Reference,
            WalletTransactions::CreatedAt,
        ])
        .values_panic([
            Uuid::new_v4().to_string().into(),
            owner_id.to_string().into(),
            kind.as_str().into(),
            amount.to_string().into(),
            description.into(),
            reference.into(),
            fmt_datetime(Utc::now()).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

/// Fold (status, amount) pairs into per-status {count, total, average}
/// rollups.
pub(crate) fn rollup_rows(rows: Vec<(String, Decimal)>) -> Vec<crate::model::StatusRollup> {
    use crate::model::StatusRollup;

    let mut rollups: Vec<StatusRollup> = Vec::new();
    for (status, amount) in rows {
        match rollups.iter_mut().find(|r| r.status == status) {
            Some(rollup) => {
                rollup.count += 1;
                rollup.total_amount += amount;
            }
            None => rollups.push(StatusRollup {
                status,
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

/// Credit a wallet inside the caller's transaction. Returns the new balance.
pub(crate) async fn apply_credit(
    conn: &mut SqliteConnection,
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
    let balance = wallet_balance(conn, owner_id)
        .await?
        .ok_or_else(|| LedgerError::not_found("wallet", owner_id))?;
    let new_balance = balance + amount;
    write_balance(conn, owner_id, new_balance).await?;
    append_entry(conn, owner_id, TransactionKind::Credit, amount, description, reference).await?;
    Ok(new_balance)
}

/// Debit a wallet inside the caller's transaction. Rejects (never clamps)
/// debits beyond the balance. Returns the new balance.
pub(crate) async fn apply_debit(
    conn: &mut SqliteConnection,
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
    let balance = wallet_balance(conn, owner_id)
        .await?
        .ok_or_else(|| LedgerError::not_found("wallet", owner_id))?;
    if amount > balance {
        return Err(LedgerError::InsufficientBalance {
            requested: amount,
            available: balance,
        });
    }
    let new_balance = balance - amount;
    write_balance(conn, owner_id, new_balance).await?;
    append_entry(conn, owner_id, TransactionKind::Debit, amount, description, reference).await?;
    Ok(new_balance)
}
