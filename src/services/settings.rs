//! Settings administration.
//!
//! Validates policy updates before they reach the settings store. Settings
//! are runtime data; reads flow straight through.

use rust_decimal::Decimal;
use tracing::info;

use crate::error::{LedgerError, Result};
use crate::model::{
    AdminId, ReferralPolicyPatch, SystemSettings, VendorCommissionOverride, VendorId,
    WithdrawalPolicyPatch,
};
use crate::storage::{SettingsStore, Stores};
use crate::validation;

/// Admin-facing settings operations.
pub struct SettingsAdmin {
    stores: Stores,
}

impl SettingsAdmin {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn settings(&self) -> Result<SystemSettings> {
        self.stores.settings.settings().await
    }

    /// Partially update the referral policy.
    pub async fn update_referral_policy(
        &self,
        patch: ReferralPolicyPatch,
        admin: AdminId,
    ) -> Result<SystemSettings> {
        if let Some(percentage) = patch.percentage {
            validation::validate_percentage(percentage)?;
        }
        if let Some(minimum) = patch.minimum_subscription_amount {
            if minimum < Decimal::ZERO {
                return Err(LedgerError::Validation(
                    "minimum subscription amount cannot be negative".into(),
                ));
            }
        }
        if let Some(maximum) = patch.maximum_commission_per_referral {
            validation::validate_amount_positive(maximum)?;
        }

        let settings = self
            .stores
            .settings
            .update_referral_policy(&patch, admin)
            .await?;
        info!(
            percentage = %settings.referral.percentage,
            is_active = settings.referral.is_active,
            "referral policy updated"
        );
        Ok(settings)
    }

    /// Partially update the withdrawal policy.
    pub async fn update_withdrawal_policy(
        &self,
        patch: WithdrawalPolicyPatch,
        admin: AdminId,
    ) -> Result<SystemSettings> {
        if let Some(minimum) = patch.minimum_amount {
            validation::validate_amount_positive(minimum)?;
        }
        if let Some(maximum) = patch.maximum_amount {
            validation::validate_amount_positive(maximum)?;
        }
        if let (Some(minimum), Some(maximum)) = (patch.minimum_amount, patch.maximum_amount) {
            if minimum > maximum {
                return Err(LedgerError::Validation(
                    "minimum withdrawal cannot exceed the maximum".into(),
                ));
            }
        }

        let settings = self
            .stores
            .settings
            .update_withdrawal_policy(&patch, admin)
            .await?;
        info!(
            minimum = %settings.withdrawal.minimum_amount,
            maximum = %settings.withdrawal.maximum_amount,
            "withdrawal policy updated"
        );
        Ok(settings)
    }

    /// Set or replace a vendor's referral-commission override.
    pub async fn set_vendor_override(
        &self,
        vendor: VendorId,
        percentage: Decimal,
        admin: AdminId,
        notes: Option<&str>,
    ) -> Result<VendorCommissionOverride> {
        validation::validate_percentage(percentage)?;
        let override_ = self
            .stores
            .settings
            .set_vendor_override(vendor, percentage, admin, notes)
            .await?;
        info!(vendor = %vendor, percentage = %percentage, "vendor commission override set");
        Ok(override_)
    }

    pub async fn vendor_override(
        &self,
        vendor: VendorId,
    ) -> Result<Option<VendorCommissionOverride>> {
        self.stores.settings.vendor_override(vendor).await
    }
}
