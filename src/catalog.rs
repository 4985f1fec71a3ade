//! Subscription plan catalog collaborator.
//!
//! The core treats plan pricing as a lookup table, not owned data. The
//! static catalog carries the three production plans; hosts may substitute
//! their own implementation.

use rust_decimal::Decimal;

use crate::model::PlanTag;

/// Feature limits bundled with a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanFeatures {
    pub max_products: u32,
    pub max_images: u32,
    pub featured_listing: bool,
    pub priority_support: bool,
}

/// Price and duration for one plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanDetails {
    pub amount: Decimal,
    pub duration_days: u32,
    pub features: PlanFeatures,
}

/// Lookup interface for plan pricing.
pub trait PlanCatalog: Send + Sync {
    fn plan(&self, tag: PlanTag) -> PlanDetails;
}

/// The built-in plan table.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPlanCatalog;

impl PlanCatalog for StaticPlanCatalog {
    fn plan(&self, tag: PlanTag) -> PlanDetails {
        match tag {
            PlanTag::ThreeMonths => PlanDetails {
                amount: Decimal::from(559),
                duration_days: 90,
                features: PlanFeatures {
                    max_products: 50,
                    max_images: 25,
                    featured_listing: false,
                    priority_support: false,
                },
            },
            PlanTag::SixMonths => PlanDetails {
                amount: Decimal::from(779),
                duration_days: 180,
                features: PlanFeatures {
                    max_products: 75,
                    max_images: 35,
                    featured_listing: true,
                    priority_support: false,
                },
            },
            PlanTag::OneYear => PlanDetails {
                amount: Decimal::from(899),
                duration_days: 365,
                features: PlanFeatures {
                    max_products: 100,
                    max_images: 50,
                    featured_listing: true,
                    priority_support: true,
                },
            },
        }
    }
}
