//! SQLite SettingsStore implementation.
//!
//! The settings singleton is a single row with a fixed primary key, created
//! with defaults on first read. Updates run read-modify-write under an
//! immediate transaction so concurrent partial updates serialize.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::error::Result;
use crate::model::{
    AdminId, ReferralPolicy, ReferralPolicyPatch, SystemSettings, VendorCommissionOverride,
    VendorId, WithdrawalPolicy, WithdrawalPolicyPatch, DEFAULT_VENDOR_COMMISSION_PERCENT,
};
use crate::storage::schema::{SystemSettings as SettingsTable, VendorCommissionOverrides};
use crate::storage::SettingsStore;

use super::helpers::{
    begin_immediate, commit, fmt_datetime, parse_datetime, parse_decimal, parse_opt_datetime,
    parse_opt_uuid, parse_uuid, rollback,
};

/// Fixed primary key of the settings row.
const SETTINGS_ROW_ID: i32 = 1;

/// SQLite implementation of SettingsStore.
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

fn settings_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SystemSettings> {
    Ok(SystemSettings {
        referral: ReferralPolicy {
            percentage: parse_decimal(&row.get::<String, _>("referral_percentage"))?,
            is_active: row.get::<i64, _>("referral_active") != 0,
            minimum_subscription_amount: parse_decimal(
                &row.get::<String, _>("min_subscription_amount"),
            )?,
            maximum_commission_per_referral: parse_decimal(
                &row.get::<String, _>("max_commission_per_referral"),
            )?,
        },
        withdrawal: WithdrawalPolicy {
            minimum_amount: parse_decimal(&row.get::<String, _>("withdrawal_min"))?,
            maximum_amount: parse_decimal(&row.get::<String, _>("withdrawal_max"))?,
        },
        updated_by: parse_opt_uuid(row.get("updated_by"))?,
        updated_at: parse_opt_datetime(row.get("updated_at"))?,
    })
}

fn override_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<VendorCommissionOverride> {
    Ok(VendorCommissionOverride {
        vendor: parse_uuid(&row.get::<String, _>("vendor_id"))?,
        percentage: parse_decimal(&row.get::<String, _>("percentage"))?,
        is_custom: row.get::<i64, _>("is_custom") != 0,
        is_active: row.get::<i64, _>("is_active") != 0,
        set_by: parse_uuid(&row.get::<String, _>("set_by"))?,
        notes: row.get("notes"),
        created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
        updated_at: parse_datetime(&row.get::<String, _>("updated_at"))?,
    })
}

impl SqliteSettingsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the default row if none exists. Idempotent.
    async fn ensure_row(conn: &mut SqliteConnection) -> Result<()> {
        let defaults = SystemSettings::default();
        let query = Query::insert()
            .into_table(SettingsTable::Table)
            .columns([
                SettingsTable::Id,
                SettingsTable::ReferralPercentage,
                SettingsTable::ReferralActive,
                SettingsTable::MinSubscriptionAmount,
                SettingsTable::MaxCommissionPerReferral,
                SettingsTable::WithdrawalMin,
                SettingsTable::WithdrawalMax,
            ])
            .values_panic([
                SETTINGS_ROW_ID.into(),
                defaults.referral.percentage.to_string().into(),
                i32::from(defaults.referral.is_active).into(),
                defaults
                    .referral
                    .minimum_subscription_amount
                    .to_string()
                    .into(),
                defaults
                    .referral
                    .maximum_commission_per_referral
                    .to_string()
                    .into(),
                defaults.withdrawal.minimum_amount.to_string().into(),
                defaults.withdrawal.maximum_amount.to_string().into(),
            ])
            .on_conflict(OnConflict::column(SettingsTable::Id).do_nothing().to_owned())
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&mut *conn).await?;
        Ok(())
    }

    async fn load(conn: &mut SqliteConnection) -> Result<SystemSettings> {
        Self::ensure_row(conn).await?;
        let query = Query::select()
            .columns([
                SettingsTable::ReferralPercentage,
                SettingsTable::ReferralActive,
                SettingsTable::MinSubscriptionAmount,
                SettingsTable::MaxCommissionPerReferral,
                SettingsTable::WithdrawalMin,
                SettingsTable::WithdrawalMax,
                SettingsTable::UpdatedBy,
                SettingsTable::UpdatedAt,
            ])
            .from(SettingsTable::Table)
            .and_where(Expr::col(SettingsTable::Id).eq(SETTINGS_ROW_ID))
            .to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query).fetch_one(&mut *conn).await?;
        settings_from_row(&row)
    }

    async fn store(
        conn: &mut SqliteConnection,
        settings: &SystemSettings,
        admin: AdminId,
    ) -> Result<()> {
        let query = Query::update()
            .table(SettingsTable::Table)
            .values([
                (
                    SettingsTable::ReferralPercentage,
                    settings.referral.percentage.to_string().into(),
                ),
                (
                    SettingsTable::ReferralActive,
                    i32::from(settings.referral.is_active).into(),
                ),
                (
                    SettingsTable::MinSubscriptionAmount,
                    settings
                        .referral
                        .minimum_subscription_amount
                        .to_string()
                        .into(),
                ),
                (
                    SettingsTable::MaxCommissionPerReferral,
                    settings
                        .referral
                        .maximum_commission_per_referral
                        .to_string()
                        .into(),
                ),
                (
                    SettingsTable::WithdrawalMin,
                    settings.withdrawal.minimum_amount.to_string().into(),
                ),
                (
                    SettingsTable::WithdrawalMax,
                    settings.withdrawal.maximum_amount.to_string().into(),
                ),
                (SettingsTable::UpdatedBy, admin.to_string().into()),
                (SettingsTable::UpdatedAt, fmt_datetime(Utc::now()).into()),
            ])
            .and_where(Expr::col(SettingsTable::Id).eq(SETTINGS_ROW_ID))
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&mut *conn).await?;
        Ok(())
    }

    async fn update_with<F>(&self, admin: AdminId, apply: F) -> Result<SystemSettings>
    where
        F: FnOnce(&mut SystemSettings),
    {
        let mut conn = begin_immediate(&self.pool).await?;
        let result: Result<SystemSettings> = async {
            let mut settings = Self::load(&mut conn).await?;
            apply(&mut settings);
            Self::store(&mut conn, &settings, admin).await?;
            settings.updated_by = Some(admin);
            settings.updated_at = Some(Utc::now());
            Ok(settings)
        }
        .await;

        match result {
            Ok(settings) => {
                commit(&mut conn).await?;
                Ok(settings)
            }
            Err(e) => {
                rollback(&mut conn).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn settings(&self) -> Result<SystemSettings> {
        let mut conn = self.pool.acquire().await?;
        Self::load(&mut conn).await
    }

    async fn update_referral_policy(
        &self,
        patch: &ReferralPolicyPatch,
        admin: AdminId,
    ) -> Result<SystemSettings> {
        let patch = patch.clone();
        self.update_with(admin, move |settings| {
            if let Some(percentage) = patch.percentage {
                settings.referral.percentage = percentage;
            }
            if let Some(is_active) = patch.is_active {
                settings.referral.is_active = is_active;
            }
            if let Some(minimum) = patch.minimum_subscription_amount {
                settings.referral.minimum_subscription_amount = minimum;
            }
            if let Some(maximum) = patch.maximum_commission_per_referral {
                settings.referral.maximum_commission_per_referral = maximum;
            }
        })
        .await
    }

    async fn update_withdrawal_policy(
        &self,
        patch: &WithdrawalPolicyPatch,
        admin: AdminId,
    ) -> Result<SystemSettings> {
        let patch = patch.clone();
        self.update_with(admin, move |settings| {
            if let Some(minimum) = patch.minimum_amount {
                settings.withdrawal.minimum_amount = minimum;
            }
            if let Some(maximum) = patch.maximum_amount {
                settings.withdrawal.maximum_amount = maximum;
            }
        })
        .await
    }

    async fn vendor_override(&self, vendor: VendorId) -> Result<Option<VendorCommissionOverride>> {
        let query = Query::select()
            .columns([
                VendorCommissionOverrides::VendorId,
                VendorCommissionOverrides::Percentage,
                VendorCommissionOverrides::IsCustom,
                VendorCommissionOverrides::IsActive,
                VendorCommissionOverrides::SetBy,
                VendorCommissionOverrides::Notes,
                VendorCommissionOverrides::CreatedAt,
                VendorCommissionOverrides::UpdatedAt,
            ])
            .from(VendorCommissionOverrides::Table)
            .and_where(Expr::col(VendorCommissionOverrides::VendorId).eq(vendor.to_string()))
            .and_where(Expr::col(VendorCommissionOverrides::IsActive).eq(1))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(override_from_row).transpose()
    }

    async fn set_vendor_override(
        &self,
        vendor: VendorId,
        percentage: Decimal,
        admin: AdminId,
        notes: Option<&str>,
    ) -> Result<VendorCommissionOverride> {
        let now = Utc::now();
        let is_custom = percentage != Decimal::from(DEFAULT_VENDOR_COMMISSION_PERCENT);

        let query = Query::insert()
            .into_table(VendorCommissionOverrides::Table)
            .columns([
                VendorCommissionOverrides::VendorId,
                VendorCommissionOverrides::Percentage,
                VendorCommissionOverrides::IsCustom,
                VendorCommissionOverrides::IsActive,
                VendorCommissionOverrides::SetBy,
                VendorCommissionOverrides::Notes,
                VendorCommissionOverrides::CreatedAt,
                VendorCommissionOverrides::UpdatedAt,
            ])
            .values_panic([
                vendor.to_string().into(),
                percentage.to_string().into(),
                i32::from(is_custom).into(),
                1.into(),
                admin.to_string().into(),
                notes.into(),
                fmt_datetime(now).into(),
                fmt_datetime(now).into(),
            ])
            .on_conflict(
                OnConflict::column(VendorCommissionOverrides::VendorId)
                    .update_columns([
                        VendorCommissionOverrides::Percentage,
                        VendorCommissionOverrides::IsCustom,
                        VendorCommissionOverrides::IsActive,
                        VendorCommissionOverrides::SetBy,
                        VendorCommissionOverrides::Notes,
                        VendorCommissionOverrides::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;

        Ok(VendorCommissionOverride {
            vendor,
            percentage,
            is_custom,
            is_active: true,
            set_by: admin,
            notes: notes.map(String::from),
            created_at: now,
            updated_at: now,
        })
    }
}
