//! SQLite WalletStore implementation.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_query::{Expr, OnConflict, Order, Query, SqliteQueryBuilder};
use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::model::{
    TransactionKind, Wallet, WalletOwner, WalletSummary, WalletTransaction,
};
use crate::storage::schema::{WalletTransactions, Wallets};
use crate::storage::WalletStore;

use super::helpers::{
    append_entry, apply_credit, apply_debit, begin_immediate, commit, fmt_datetime,
    parse_datetime, parse_decimal, parse_enum, parse_uuid, rollback,
};

/// SQLite implementation of WalletStore.
pub struct SqliteWalletStore {
    pool: SqlitePool,
}

impl SqliteWalletStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn transactions(&self, owner: WalletOwner) -> Result<Vec<WalletTransaction>> {
        let query = Query::select()
            .columns([
                WalletTransactions::Id,
                WalletTransactions::Kind,
                WalletTransactions::Amount,
                WalletTransactions::Description,
                WalletTransactions::Reference,
                WalletTransactions::CreatedAt,
            ])
            .from(WalletTransactions::Table)
            .and_where(Expr::col(WalletTransactions::OwnerId).eq(owner.id.to_string()))
            .order_by_expr(Expr::cust("rowid"), Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        let mut transactions = Vec::with_capacity(rows.len());
        for row in rows {
            transactions.push(WalletTransaction {
                id: parse_uuid(&row.get::<String, _>("id"))?,
                kind: parse_enum(&row.get::<String, _>("kind"))?,
                amount: parse_decimal(&row.get::<String, _>("amount"))?,
                description: row.get("description"),
                reference: row.get("reference"),
                created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
            });
        }
        Ok(transactions)
    }
}

#[async_trait]
impl WalletStore for SqliteWalletStore {
    async fn ensure(&self, owner: WalletOwner) -> Result<()> {
        let now = fmt_datetime(Utc::now());
        // An existing wallet (and its balance) wins.
        let query = Query::insert()
            .into_table(Wallets::Table)
            .columns([
                Wallets::OwnerId,
                Wallets::OwnerKind,
                Wallets::Balance,
                Wallets::CreatedAt,
                Wallets::UpdatedAt,
            ])
            .values_panic([
                owner.id.to_string().into(),
                owner.kind.as_str().into(),
                "0".into(),
                now.clone().into(),
                now.into(),
            ])
            .on_conflict(
                OnConflict::column(Wallets::OwnerId)
                    .do_nothing()
                    .to_owned(),
            )
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn credit(
        &self,
        owner: WalletOwner,
        amount: Decimal,
        description: &str,
        reference: Option<&str>,
    ) -> Result<Decimal> {
        let mut conn = begin_immediate(&self.pool).await?;
        let result = apply_credit(&mut conn, owner.id, amount, description, reference).await;
        match result {
            Ok(balance) => {
                commit(&mut conn).await?;
                Ok(balance)
            }
            Err(e) => {
                rollback(&mut conn).await;
                Err(e)
            }
        }
    }

    async fn debit(
        &self,
        owner: WalletOwner,
        amount: Decimal,
        description: &str,
        reference: Option<&str>,
    ) -> Result<Decimal> {
        let mut conn = begin_immediate(&self.pool).await?;
        let result = apply_debit(&mut conn, owner.id, amount, description, reference).await;
        match result {
            Ok(balance) => {
                commit(&mut conn).await?;
                Ok(balance)
            }
            Err(e) => {
                rollback(&mut conn).await;
                Err(e)
            }
        }
    }

    async fn record_audit(&self, owner: WalletOwner, description: &str) -> Result<()> {
        let mut conn = begin_immediate(&self.pool).await?;
        let result = append_entry(
            &mut conn,
            owner.id,
            TransactionKind::Credit,
            Decimal::ZERO,
            description,
            None,
        )
        .await;
        match result {
            Ok(()) => commit(&mut conn).await,
            Err(e) => {
                rollback(&mut conn).await;
                Err(e)
            }
        }
    }

    async fn wallet(&self, owner: WalletOwner) -> Result<Option<Wallet>> {
        let query = Query::select()
            .column(Wallets::Balance)
            .from(Wallets::Table)
            .and_where(Expr::col(Wallets::OwnerId).eq(owner.id.to_string()))
            .to_string(SqliteQueryBuilder);

        let Some(row) = sqlx::query(&query).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        let balance = parse_decimal(&row.get::<String, _>("balance"))?;
        let transactions = self.transactions(owner).await?;

        Ok(Some(Wallet {
            balance,
            transactions,
        }))
    }

    async fn summary(&self, owner: WalletOwner, recent: usize) -> Result<Option<WalletSummary>> {
        let Some(wallet) = self.wallet(owner).await? else {
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

        let recent_transactions = wallet
            .transactions
            .iter()
            .rev()
            .take(recent)
            .cloned()
            .collect();

        Ok(Some(WalletSummary {
            balance: wallet.balance,
            total_credits,
            total_debits,
            transaction_count: wallet.transactions.len(),
            recent_transactions,
        }))
    }
}
