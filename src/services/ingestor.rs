//! Subscription event ingestion.
//!
//! Drives subscription state from verified gateway lifecycle events, mirrors
//! the active window onto the vendor profile, and creates pending commission
//! records on activation. Events referencing unknown subscriptions are
//! reported and acknowledged rather than erroring, so webhook delivery still
//! ACKs and the gateway doesn't redeliver forever.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::gateway::{PaymentCaptured, PaymentFailed, SubscriptionActivated, SubscriptionCancelled};
use crate::model::{
    CommissionBreakdown, CommissionId, CommissionStatus, District, EmployeeCommission,
    PaymentOutcome, PaymentRecord, PaymentStamp, Period, ReferralCommission, Subscription,
    SubscriptionStatus, SubscriptionSummary, VendorProfile,
};
use crate::services::calculator;
use crate::storage::{CommissionStore, PartyStore, SettingsStore, Stores, SubscriptionStore};

/// Result of ingesting an activation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// The subscription was activated; ids of any commissions created.
    Applied {
        referral_commission: Option<CommissionId>,
        employee_commission: Option<CommissionId>,
    },
    /// Redelivery of an event already applied. No-op.
    AlreadyActive,
    /// The gateway reference matched no subscription. Reported, not an
    /// error.
    UnknownSubscription,
}

/// Result of ingesting a non-activation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    Applied,
    /// The referenced subscription is unknown; acknowledged without effect.
    Ignored,
}

/// Applies gateway subscription lifecycle events.
pub struct SubscriptionIngestor {
    stores: Stores,
}

impl SubscriptionIngestor {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Handle `subscription.activated`.
    ///
    /// Idempotent under redelivery: an already-active subscription with the
    /// same payment id is a no-op, and commission creation is deduplicated
    /// by the ledger's uniqueness constraints. An already-active
    /// subscription with a *different* payment id is a conflict.
    pub async fn on_activated(&self, event: &SubscriptionActivated) -> Result<ActivationOutcome> {
        let Some(subscription) = self
            .stores
            .subscriptions
            .find_by_gateway_subscription(&event.gateway_subscription_id)
            .await?
        else {
            warn!(
                gateway_subscription_id = %event.gateway_subscription_id,
                "activation event for unknown subscription"
            );
            return Ok(ActivationOutcome::UnknownSubscription);
        };

        if subscription.status == SubscriptionStatus::Active {
            if subscription.gateway_payment_id == event.gateway_payment_id {
                info!(subscription = %subscription.id, "activation redelivered, no-op");
                return Ok(ActivationOutcome::AlreadyActive);
            }
            return Err(LedgerError::InvalidState(format!(
                "subscription {} already active with a different payment id",
                subscription.id
            )));
        }
        if subscription.status.is_terminal() {
            return Err(LedgerError::InvalidState(format!(
                "subscription {} is {} and cannot be activated",
                subscription.id,
                subscription.status.as_str()
            )));
        }

        self.stores
            .subscriptions
            .activate(
                subscription.id,
                event.start_date,
                event.end_date,
                event.gateway_payment_id.as_deref(),
            )
            .await?;

        let vendor = self
            .stores
            .parties
            .vendor(subscription.vendor)
            .await?
            .ok_or_else(|| LedgerError::not_found("vendor", subscription.vendor))?;

        self.stores
            .parties
            .update_vendor_subscription(
                vendor.id,
                &SubscriptionSummary {
                    is_active: true,
                    plan: Some(subscription.plan),
                    start_date: Some(event.start_date),
                    end_date: Some(event.end_date),
                    gateway_subscription_id: Some(event.gateway_subscription_id.clone()),
                    gateway_payment_id: event.gateway_payment_id.clone(),
                },
            )
            .await?;

        let referral_commission = self.create_referral_commission(&subscription, &vendor).await?;
        let employee_commission = self
            .create_employee_commission(&subscription, &vendor, event)
            .await?;

        info!(
            subscription = %subscription.id,
            referral = ?referral_commission,
            employee = ?employee_commission,
            "subscription activated"
        );

        Ok(ActivationOutcome::Applied {
            referral_commission,
            employee_commission,
        })
    }

    /// Handle `subscription.cancelled`.
    ///
    /// Already-paid commissions stand; cancellation only stops future
    /// commission creation because the subscription leaves `active`.
    pub async fn on_cancelled(&self, event: &SubscriptionCancelled) -> Result<EventDisposition> {
        let Some(subscription) = self
            .stores
            .subscriptions
            .find_by_gateway_subscription(&event.gateway_subscription_id)
            .await?
        else {
            warn!(
                gateway_subscription_id = %event.gateway_subscription_id,
                "cancellation event for unknown subscription"
            );
            return Ok(EventDisposition::Ignored);
        };

        self.stores
            .subscriptions
            .cancel(subscription.id, Utc::now())
            .await?;
        self.stores
            .parties
            .deactivate_vendor_subscription(subscription.vendor)
            .await?;

        info!(subscription = %subscription.id, "subscription cancelled");
        Ok(EventDisposition::Applied)
    }

    /// Handle `payment.captured`: append to the payment history.
    pub async fn on_payment_captured(&self, event: &PaymentCaptured) -> Result<EventDisposition> {
        let Some(subscription) = self
            .stores
            .subscriptions
            .find_by_gateway_payment(&event.gateway_payment_id)
            .await?
        else {
            warn!(
                gateway_payment_id = %event.gateway_payment_id,
                "captured payment for unknown subscription"
            );
            return Ok(EventDisposition::Ignored);
        };

        self.stores
            .subscriptions
            .append_payment(
                subscription.id,
                &PaymentRecord {
                    amount: event.amount,
                    outcome: PaymentOutcome::Success,
                    gateway_payment_id: Some(event.gateway_payment_id.clone()),
                    description: "Subscription payment".to_string(),
                    recorded_at: Utc::now(),
                },
            )
            .await?;
        Ok(EventDisposition::Applied)
    }

    /// Handle `payment.failed`: append to the payment history, force the
    /// subscription into `failed`, and clear the vendor's active flag.
    pub async fn on_payment_failed(&self, event: &PaymentFailed) -> Result<EventDisposition> {
        let Some(subscription) = self
            .stores
            .subscriptions
            .find_by_gateway_payment(&event.gateway_payment_id)
            .await?
        else {
            warn!(
                gateway_payment_id = %event.gateway_payment_id,
                "failed payment for unknown subscription"
            );
            return Ok(EventDisposition::Ignored);
        };

        self.stores
            .subscriptions
            .append_payment(
                subscription.id,
                &PaymentRecord {
                    amount: event.amount,
                    outcome: PaymentOutcome::Failed,
                    gateway_payment_id: Some(event.gateway_payment_id.clone()),
                    description: event
                        .reason
                        .clone()
                        .unwrap_or_else(|| "Payment failed".to_string()),
                    recorded_at: Utc::now(),
                },
            )
            .await?;
        self.stores.subscriptions.fail(subscription.id).await?;
        self.stores
            .parties
            .deactivate_vendor_subscription(subscription.vendor)
            .await?;

        info!(subscription = %subscription.id, "payment failed, subscription marked failed");
        Ok(EventDisposition::Applied)
    }

    /// Create the pending referral commission, if one is due.
    ///
    /// Skips quietly when the vendor has no referrer, the policy yields no
    /// amount, or a record already exists for this (referrer, subscription)
    /// pair. Never touches a wallet.
    async fn create_referral_commission(
        &self,
        subscription: &Subscription,
        vendor: &VendorProfile,
    ) -> Result<Option<CommissionId>> {
        let Some(referrer) = vendor.referred_by else {
            return Ok(None);
        };
        if self.stores.parties.vendor(referrer).await?.is_none() {
            warn!(referrer = %referrer, "referrer vanished, skipping referral commission");
            return Ok(None);
        }

        let settings = self.stores.settings.settings().await?;
        let override_ = self.stores.settings.vendor_override(referrer).await?;
        let percentage =
            calculator::resolve_referral_percentage(override_.as_ref(), Some(&settings));

        let Some(amount) =
            calculator::referral_commission(subscription.amount, percentage, &settings.referral)
        else {
            return Ok(None);
        };

        let now = Utc::now();
        let commission = ReferralCommission {
            id: Uuid::new_v4(),
            referrer,
            referred_vendor: vendor.id,
            referral_code: vendor
                .referral_code
                .clone()
                .unwrap_or_else(|| "REFERRAL".to_string()),
            breakdown: CommissionBreakdown {
                percentage,
                amount,
                subscription_amount: subscription.amount,
            },
            currency: subscription.currency.clone(),
            plan: subscription.plan,
            subscription: subscription.id,
            status: CommissionStatus::Pending,
            payment: PaymentStamp::default(),
            admin: None,
            created_at: now,
            updated_at: now,
        };

        if !self.stores.commissions.insert_referral(&commission).await? {
            info!(
                referrer = %referrer,
                subscription = %subscription.id,
                "referral commission already recorded"
            );
            return Ok(None);
        }

        info!(
            referrer = %referrer,
            amount = %amount,
            "referral commission created"
        );
        Ok(Some(commission.id))
    }

    /// Create the pending employee commission, if a payee resolves.
    async fn create_employee_commission(
        &self,
        subscription: &Subscription,
        vendor: &VendorProfile,
        event: &SubscriptionActivated,
    ) -> Result<Option<CommissionId>> {
        let Some(assigned_id) = vendor.assigned_employee else {
            return Ok(None);
        };
        let Some(assigned) = self.stores.parties.employee(assigned_id).await? else {
            warn!(employee = %assigned_id, "assigned employee vanished, skipping commission");
            return Ok(None);
        };

        let supervisor = match assigned.super_employee {
            Some(id) => self.stores.parties.employee(id).await?,
            None => None,
        };

        let Some((payee, percentage)) =
            calculator::resolve_employee_payee(&assigned, supervisor.as_ref())
        else {
            return Ok(None);
        };

        let amount = calculator::employee_commission(subscription.amount, percentage);
        if amount <= Decimal::ZERO {
            return Ok(None);
        }

        let district = match (&vendor.city, &vendor.state) {
            (Some(city), Some(state)) => District {
                name: city.clone(),
                state: state.clone(),
            },
            _ => District::unknown(),
        };

        let now = Utc::now();
        let commission = EmployeeCommission {
            id: Uuid::new_v4(),
            employee: payee,
            seller: vendor.id,
            subscription: subscription.id,
            breakdown: CommissionBreakdown {
                percentage,
                amount,
                subscription_amount: subscription.amount,
            },
            status: CommissionStatus::Pending,
            district,
            period: Period {
                start_date: event.start_date,
                end_date: event.end_date,
            },
            payment: PaymentStamp::default(),
            admin: None,
            created_at: now,
            updated_at: now,
        };

        if !self.stores.commissions.insert_employee(&commission).await? {
            info!(
                employee = %payee,
                subscription = %subscription.id,
                "employee commission already recorded"
            );
            return Ok(None);
        }

        // The assigned employee and the payee both track the seller; they
        // coincide for direct assignments.
        let mut counters = vec![payee];
        if assigned.id != payee {
            counters.push(assigned.id);
        }
        self.stores.parties.record_seller_assignment(&counters).await?;

        info!(
            employee = %payee,
            amount = %amount,
            "employee commission created"
        );
        Ok(Some(commission.id))
    }
}
