//! SQLite SubscriptionStore implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::{Row, SqlitePool};

use crate::error::{LedgerError, Result};
use crate::model::{PaymentRecord, Subscription, SubscriptionId, SubscriptionStatus};
use crate::storage::schema::{SubscriptionPayments, Subscriptions};
use crate::storage::SubscriptionStore;

use super::helpers::{
    fmt_datetime, parse_datetime, parse_decimal, parse_enum, parse_opt_datetime, parse_uuid,
};

/// SQLite implementation of SubscriptionStore.
pub struct SqliteSubscriptionStore {
    pool: SqlitePool,
}

impl SqliteSubscriptionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, predicate: sea_query::SimpleExpr) -> Result<Option<Subscription>> {
        let query = Query::select()
            .columns([
                Subscriptions::Id,
                Subscriptions::VendorId,
                Subscriptions::Plan,
                Subscriptions::Amount,
                Subscriptions::Currency,
                Subscriptions::Status,
                Subscriptions::StartDate,
                Subscriptions::EndDate,
                Subscriptions::GatewaySubscriptionId,
                Subscriptions::GatewayPaymentId,
                Subscriptions::GatewayOrderId,
                Subscriptions::CancelledAt,
                Subscriptions::CreatedAt,
                Subscriptions::UpdatedAt,
            ])
            .from(Subscriptions::Table)
            .and_where(predicate)
            .to_string(SqliteQueryBuilder);

        let Some(row) = sqlx::query(&query).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };

        let id = parse_uuid(&row.get::<String, _>("id"))?;
        let payment_history = self.payment_history(id).await?;

        Ok(Some(Subscription {
            id,
            vendor: parse_uuid(&row.get::<String, _>("vendor_id"))?,
            plan: parse_enum(&row.get::<String, _>("plan"))?,
            amount: parse_decimal(&row.get::<String, _>("amount"))?,
            currency: row.get("currency"),
            status: parse_enum(&row.get::<String, _>("status"))?,
            start_date: parse_opt_datetime(row.get("start_date"))?,
            end_date: parse_opt_datetime(row.get("end_date"))?,
            gateway_subscription_id: row.get("gateway_subscription_id"),
            gateway_payment_id: row.get("gateway_payment_id"),
            gateway_order_id: row.get("gateway_order_id"),
            cancelled_at: parse_opt_datetime(row.get("cancelled_at"))?,
            payment_history,
            created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
            updated_at: parse_datetime(&row.get::<String, _>("updated_at"))?,
        }))
    }

    async fn payment_history(&self, id: SubscriptionId) -> Result<Vec<PaymentRecord>> {
        let query = Query::select()
            .columns([
                SubscriptionPayments::Amount,
                SubscriptionPayments::Outcome,
                SubscriptionPayments::GatewayPaymentId,
                SubscriptionPayments::Description,
                SubscriptionPayments::RecordedAt,
            ])
            .from(SubscriptionPayments::Table)
            .and_where(Expr::col(SubscriptionPayments::SubscriptionId).eq(id.to_string()))
            .order_by_expr(Expr::cust("rowid"), Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        let mut history = Vec::with_capacity(rows.len());
        for row in rows {
            history.push(PaymentRecord {
                amount: parse_decimal(&row.get::<String, _>("amount"))?,
                outcome: parse_enum(&row.get::<String, _>("outcome"))?,
                gateway_payment_id: row.get("gateway_payment_id"),
                description: row.get("description"),
                recorded_at: parse_datetime(&row.get::<String, _>("recorded_at"))?,
            });
        }
        Ok(history)
    }

    /// Conditional status write; zero matched rows means the record is
    /// missing or already terminal.
    async fn transition(
        &self,
        id: SubscriptionId,
        target: SubscriptionStatus,
        extra: Vec<(Subscriptions, sea_query::SimpleExpr)>,
    ) -> Result<()> {
        let mut values = vec![
            (Subscriptions::Status, target.as_str().into()),
            (Subscriptions::UpdatedAt, fmt_datetime(Utc::now()).into()),
        ];
        values.extend(extra);

        let query = Query::update()
            .table(Subscriptions::Table)
            .values(values)
            .and_where(Expr::col(Subscriptions::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("subscription", id));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for SqliteSubscriptionStore {
    async fn insert(&self, subscription: &Subscription) -> Result<()> {
        let query = Query::insert()
            .into_table(Subscriptions::Table)
            .columns([
                Subscriptions::Id,
                Subscriptions::VendorId,
                Subscriptions::Plan,
                Subscriptions::Amount,
                Subscriptions::Currency,
                Subscriptions::Status,
                Subscriptions::StartDate,
                Subscriptions::EndDate,
                Subscriptions::GatewaySubscriptionId,
                Subscriptions::GatewayPaymentId,
                Subscriptions::GatewayOrderId,
                Subscriptions::CancelledAt,
                Subscriptions::CreatedAt,
                Subscriptions::UpdatedAt,
            ])
            .values_panic([
                subscription.id.to_string().into(),
                subscription.vendor.to_string().into(),
                subscription.plan.as_str().into(),
                subscription.amount.to_string().into(),
                subscription.currency.as_str().into(),
                subscription.status.as_str().into(),
                subscription.start_date.map(fmt_datetime).into(),
                subscription.end_date.map(fmt_datetime).into(),
                subscription.gateway_subscription_id.as_deref().into(),
                subscription.gateway_payment_id.as_deref().into(),
                subscription.gateway_order_id.as_deref().into(),
                subscription.cancelled_at.map(fmt_datetime).into(),
                fmt_datetime(subscription.created_at).into(),
                fmt_datetime(subscription.updated_at).into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>> {
        self.fetch_one_where(Expr::col(Subscriptions::Id).eq(id.to_string()))
            .await
    }

    async fn find_by_gateway_subscription(&self, gateway_id: &str) -> Result<Option<Subscription>> {
        self.fetch_one_where(Expr::col(Subscriptions::GatewaySubscriptionId).eq(gateway_id))
            .await
    }

    async fn find_by_gateway_payment(&self, payment_id: &str) -> Result<Option<Subscription>> {
        self.fetch_one_where(Expr::col(Subscriptions::GatewayPaymentId).eq(payment_id))
            .await
    }

    async fn activate(
        &self,
        id: SubscriptionId,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        gateway_payment_id: Option<&str>,
    ) -> Result<()> {
        let mut extra = vec![
            (Subscriptions::StartDate, fmt_datetime(start_date).into()),
            (Subscriptions::EndDate, fmt_datetime(end_date).into()),
        ];
        if let Some(payment_id) = gateway_payment_id {
            extra.push((Subscriptions::GatewayPaymentId, payment_id.into()));
        }
        self.transition(id, SubscriptionStatus::Active, extra).await
    }

    async fn cancel(&self, id: SubscriptionId, cancelled_at: DateTime<Utc>) -> Result<()> {
        self.transition(
            id,
            SubscriptionStatus::Cancelled,
            vec![(Subscriptions::CancelledAt, fmt_datetime(cancelled_at).into())],
        )
        .await
    }

    async fn fail(&self, id: SubscriptionId) -> Result<()> {
        self.transition(id, SubscriptionStatus::Failed, vec![]).await
    }

    async fn append_payment(&self, id: SubscriptionId, record: &PaymentRecord) -> Result<()> {
        let query = Query::insert()
            .into_table(SubscriptionPayments::Table)
            .columns([
                SubscriptionPayments::SubscriptionId,
                SubscriptionPayments::Amount,
                SubscriptionPayments::Outcome,
                SubscriptionPayments::GatewayPaymentId,
                SubscriptionPayments::Description,
                SubscriptionPayments::RecordedAt,
            ])
            .values_panic([
                id.to_string().into(),
                record.amount.to_string().into(),
                record.outcome.as_str().into(),
                record.gateway_payment_id.as_deref().into(),
                record.description.as_str().into(),
                fmt_datetime(record.recorded_at).into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }
}
