//! Subscription origination.
//!
//! A vendor selecting a plan creates a pending subscription priced from the
//! plan catalog. The gateway holds the authoritative state from there until
//! the activation webhook arrives.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::catalog::PlanCatalog;
use crate::error::{LedgerError, Result};
use crate::model::{PlanTag, Subscription, SubscriptionStatus, VendorId};
use crate::storage::{PartyStore, Stores, SubscriptionStore};

/// Creates subscriptions for vendors.
pub struct SubscriptionOrigination<C: PlanCatalog> {
    stores: Stores,
    catalog: C,
}

impl<C: PlanCatalog> SubscriptionOrigination<C> {
    pub fn new(stores: Stores, catalog: C) -> Self {
        Self { stores, catalog }
    }

    /// Create a pending subscription for a vendor on the given plan.
    ///
    /// The gateway references come from the order the boundary layer
    /// created with the payment gateway before calling in.
    pub async fn create_subscription(
        &self,
        vendor: VendorId,
        plan: PlanTag,
        gateway_subscription_id: Option<String>,
        gateway_order_id: Option<String>,
    ) -> Result<Subscription> {
        if self.stores.parties.vendor(vendor).await?.is_none() {
            return Err(LedgerError::not_found("vendor", vendor));
        }

        let details = self.catalog.plan(plan);
        let now = Utc::now();
        let subscription = Subscription {
            id: Uuid::new_v4(),
            vendor,
            plan,
            amount: details.amount,
            currency: "INR".to_string(),
            status: SubscriptionStatus::Pending,
            start_date: None,
            end_date: None,
            gateway_subscription_id,
            gateway_payment_id: None,
            gateway_order_id,
            cancelled_at: None,
            payment_history: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.stores.subscriptions.insert(&subscription).await?;
        info!(
            subscription = %subscription.id,
            vendor = %vendor,
            plan = %plan,
            amount = %subscription.amount,
            "subscription created"
        );
        Ok(subscription)
    }
}
