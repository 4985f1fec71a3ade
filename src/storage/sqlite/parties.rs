//! SQLite PartyStore implementation.

use async_trait::async_trait;
use sea_query::{Expr, Query, SqliteQueryBuilder};
use sqlx::{Row, SqlitePool};

use crate::error::{LedgerError, Result};
use crate::model::{
    CommissionSettings, EmployeeId, EmployeeProfile, EmployeeRole, OwnerKind,
    SubscriptionSummary, VendorId, VendorProfile, WalletOwner,
};
use crate::storage::schema::{Employees, Vendors, Wallets};
use crate::storage::PartyStore;

use super::helpers::{
    fmt_datetime, parse_decimal, parse_enum, parse_opt_datetime, parse_opt_uuid, parse_uuid,
};

/// SQLite implementation of PartyStore.
pub struct SqlitePartyStore {
    pool: SqlitePool,
}

impl SqlitePartyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn create_wallet(&self, owner: WalletOwner) -> Result<()> {
        let now = fmt_datetime(chrono::Utc::now());
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
                sea_query::OnConflict::column(Wallets::OwnerId)
                    .do_nothing()
                    .to_owned(),
            )
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }
}

fn vendor_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<VendorProfile> {
    Ok(VendorProfile {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        name: row.get("name"),
        shop_name: row.get("shop_name"),
        city: row.get("city"),
        state: row.get("state"),
        referral_code: row.get("referral_code"),
        referred_by: parse_opt_uuid(row.get("referred_by"))?,
        assigned_employee: parse_opt_uuid(row.get("assigned_employee"))?,
        subscription: SubscriptionSummary {
            is_active: row.get::<i64, _>("sub_active") != 0,
            plan: row
                .get::<Option<String>, _>("sub_plan")
                .as_deref()
                .map(parse_enum)
                .transpose()?,
            start_date: parse_opt_datetime(row.get("sub_start"))?,
            end_date: parse_opt_datetime(row.get("sub_end"))?,
            gateway_subscription_id: row.get("sub_gateway_subscription_id"),
            gateway_payment_id: row.get("sub_gateway_payment_id"),
        },
    })
}

fn employee_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<EmployeeProfile> {
    Ok(EmployeeProfile {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        name: row.get("name"),
        employee_code: row.get("employee_code"),
        role: parse_enum(&row.get::<String, _>("role"))?,
        super_employee: parse_opt_uuid(row.get("super_employee_id"))?,
        employee_commission_percentage: parse_decimal(
            &row.get::<String, _>("employee_commission_percentage"),
        )?,
        commission_settings: CommissionSettings {
            percentage: parse_decimal(&row.get::<String, _>("commission_percentage"))?,
            is_active: row.get::<i64, _>("commission_active") != 0,
        },
        total_sellers_assigned: row.get::<i64, _>("total_sellers_assigned") as u64,
        total_commission_earned: parse_decimal(&row.get::<String, _>("total_commission_earned"))?,
        last_commission_at: parse_opt_datetime(row.get("last_commission_at"))?,
    })
}

#[async_trait]
impl PartyStore for SqlitePartyStore {
    async fn insert_vendor(&self, vendor: &VendorProfile) -> Result<()> {
        let query = Query::insert()
            .into_table(Vendors::Table)
            .columns([
                Vendors::Id,
                Vendors::Name,
                Vendors::ShopName,
                Vendors::City,
                Vendors::State,
                Vendors::ReferralCode,
                Vendors::ReferredBy,
                Vendors::AssignedEmployee,
                Vendors::SubActive,
                Vendors::SubPlan,
                Vendors::SubStart,
                Vendors::SubEnd,
                Vendors::SubGatewaySubscriptionId,
                Vendors::SubGatewayPaymentId,
            ])
            .values_panic([
                vendor.id.to_string().into(),
                vendor.name.as_str().into(),
                vendor.shop_name.as_deref().into(),
                vendor.city.as_deref().into(),
                vendor.state.as_deref().into(),
                vendor.referral_code.as_deref().into(),
                vendor.referred_by.map(|id| id.to_string()).into(),
                vendor.assigned_employee.map(|id| id.to_string()).into(),
                i32::from(vendor.subscription.is_active).into(),
                vendor.subscription.plan.map(|p| p.as_str()).into(),
                vendor.subscription.start_date.map(fmt_datetime).into(),
                vendor.subscription.end_date.map(fmt_datetime).into(),
                vendor
                    .subscription
                    .gateway_subscription_id
                    .as_deref()
                    .into(),
                vendor.subscription.gateway_payment_id.as_deref().into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        self.create_wallet(WalletOwner::vendor(vendor.id)).await
    }

    async fn insert_employee(&self, employee: &EmployeeProfile) -> Result<()> {
        let query = Query::insert()
            .into_table(Employees::Table)
            .columns([
                Employees::Id,
                Employees::Name,
                Employees::EmployeeCode,
                Employees::Role,
                Employees::SuperEmployeeId,
                Employees::EmployeeCommissionPercentage,
                Employees::CommissionPercentage,
                Employees::CommissionActive,
                Employees::TotalSellersAssigned,
                Employees::TotalCommissionEarned,
                Employees::LastCommissionAt,
            ])
            .values_panic([
                employee.id.to_string().into(),
                employee.name.as_str().into(),
                employee.employee_code.as_str().into(),
                employee.role.as_str().into(),
                employee.super_employee.map(|id| id.to_string()).into(),
                employee.employee_commission_percentage.to_string().into(),
                employee.commission_settings.percentage.to_string().into(),
                i32::from(employee.commission_settings.is_active).into(),
                (employee.total_sellers_assigned as i64).into(),
                employee.total_commission_earned.to_string().into(),
                employee.last_commission_at.map(fmt_datetime).into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;

        // Only super-employees hold wallets; regular employees roll up.
        if employee.role == EmployeeRole::SuperEmployee {
            self.create_wallet(WalletOwner {
                id: employee.id,
                kind: OwnerKind::SuperEmployee,
            })
            .await?;
        }
        Ok(())
    }

    async fn vendor(&self, id: VendorId) -> Result<Option<VendorProfile>> {
        let query = Query::select()
            .columns([
                Vendors::Id,
                Vendors::Name,
                Vendors::ShopName,
                Vendors::City,
                Vendors::State,
                Vendors::ReferralCode,
                Vendors::ReferredBy,
                Vendors::AssignedEmployee,
                Vendors::SubActive,
                Vendors::SubPlan,
                Vendors::SubStart,
                Vendors::SubEnd,
                Vendors::SubGatewaySubscriptionId,
                Vendors::SubGatewayPaymentId,
            ])
            .from(Vendors::Table)
            .and_where(Expr::col(Vendors::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(vendor_from_row).transpose()
    }

    async fn employee(&self, id: EmployeeId) -> Result<Option<EmployeeProfile>> {
        let query = Query::select()
            .columns([
                Employees::Id,
                Employees::Name,
                Employees::EmployeeCode,
                Employees::Role,
                Employees::SuperEmployeeId,
                Employees::EmployeeCommissionPercentage,
                Employees::CommissionPercentage,
                Employees::CommissionActive,
                Employees::TotalSellersAssigned,
                Employees::TotalCommissionEarned,
                Employees::LastCommissionAt,
            ])
            .from(Employees::Table)
            .and_where(Expr::col(Employees::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(employee_from_row).transpose()
    }

    async fn update_vendor_subscription(
        &self,
        vendor: VendorId,
        summary: &SubscriptionSummary,
    ) -> Result<()> {
        let query = Query::update()
            .table(Vendors::Table)
            .values([
                (Vendors::SubActive, i32::from(summary.is_active).into()),
                (Vendors::SubPlan, summary.plan.map(|p| p.as_str()).into()),
                (Vendors::SubStart, summary.start_date.map(fmt_datetime).into()),
                (Vendors::SubEnd, summary.end_date.map(fmt_datetime).into()),
                (
                    Vendors::SubGatewaySubscriptionId,
                    summary.gateway_subscription_id.as_deref().into(),
                ),
                (
                    Vendors::SubGatewayPaymentId,
                    summary.gateway_payment_id.as_deref().into(),
                ),
            ])
            .and_where(Expr::col(Vendors::Id).eq(vendor.to_string()))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("vendor", vendor));
        }
        Ok(())
    }

    async fn deactivate_vendor_subscription(&self, vendor: VendorId) -> Result<()> {
        let query = Query::update()
            .table(Vendors::Table)
            .values([(Vendors::SubActive, 0.into())])
            .and_where(Expr::col(Vendors::Id).eq(vendor.to_string()))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("vendor", vendor));
        }
        Ok(())
    }

    async fn record_seller_assignment(&self, employees: &[EmployeeId]) -> Result<()> {
        for employee in employees {
            let query = Query::update()
                .table(Employees::Table)
                .value(
                    Employees::TotalSellersAssigned,
                    Expr::col(Employees::TotalSellersAssigned).add(1),
                )
                .and_where(Expr::col(Employees::Id).eq(employee.to_string()))
                .to_string(SqliteQueryBuilder);
            sqlx::query(&query).execute(&self.pool).await?;
        }
        Ok(())
    }
}
