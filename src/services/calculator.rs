//! Commission calculation.
//!
//! Pure functions: amounts and payee routing are computed from their inputs
//! alone and never touch storage. The ingestor owns persisting whatever
//! these return, which keeps every calculation auditable and testable in
//! isolation.

use rust_decimal::Decimal;

use crate::model::{
    EmployeeId, EmployeeProfile, EmployeeRole, ReferralPolicy, SystemSettings,
    VendorCommissionOverride, DEFAULT_VENDOR_COMMISSION_PERCENT,
};

/// Referral commission for a subscription amount under the given policy.
///
/// Returns `None` when the policy is inactive or the subscription is below
/// the qualifying minimum; otherwise `amount × percentage / 100` clamped to
/// the per-referral maximum.
pub fn referral_commission(
    subscription_amount: Decimal,
    percentage: Decimal,
    policy: &ReferralPolicy,
) -> Option<Decimal> {
    if !policy.is_active || subscription_amount < policy.minimum_subscription_amount {
        return None;
    }
    let amount = subscription_amount * percentage / Decimal::from(100);
    Some(amount.min(policy.maximum_commission_per_referral))
}

/// Resolve the referral percentage for a referrer.
///
/// An active per-vendor override wins, then the system percentage, then the
/// 10% base rate when no settings exist at all.
pub fn resolve_referral_percentage(
    override_: Option<&VendorCommissionOverride>,
    settings: Option<&SystemSettings>,
) -> Decimal {
    if let Some(override_) = override_.filter(|o| o.is_active) {
        return override_.percentage;
    }
    match settings {
        Some(settings) => settings.referral.percentage,
        None => Decimal::from(DEFAULT_VENDOR_COMMISSION_PERCENT),
    }
}

/// Employee commission is a plain percentage of the subscription amount; no
/// qualifying minimum or cap applies to the employee hierarchy.
pub fn employee_commission(subscription_amount: Decimal, percentage: Decimal) -> Decimal {
    subscription_amount * percentage / Decimal::from(100)
}

/// Resolve who is paid for a seller's subscription, and at what rate.
///
/// The payee is always a super-employee. A seller assigned directly to an
/// active super-employee earns it commission at its own configured rate. A
/// seller assigned to a regular employee earns the employee's
/// super-employee commission at the *regular employee's* personal rate.
/// `None` means no commission is created, which is not an error.
pub fn resolve_employee_payee(
    assigned: &EmployeeProfile,
    supervisor: Option<&EmployeeProfile>,
) -> Option<(EmployeeId, Decimal)> {
    match assigned.role {
        EmployeeRole::SuperEmployee => {
            if assigned.commission_settings.is_active
                && assigned.commission_settings.percentage > Decimal::ZERO
            {
                Some((assigned.id, assigned.commission_settings.percentage))
            } else {
                None
            }
        }
        EmployeeRole::Employee => {
            let supervisor = supervisor?;
            if supervisor.role == EmployeeRole::SuperEmployee
                && supervisor.commission_settings.is_active
                && assigned.employee_commission_percentage > Decimal::ZERO
            {
                Some((supervisor.id, assigned.employee_commission_percentage))
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CommissionSettings;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn policy() -> ReferralPolicy {
        ReferralPolicy {
            percentage: dec!(10),
            is_active: true,
            minimum_subscription_amount: dec!(100),
            maximum_commission_per_referral: dec!(1000),
        }
    }

    fn super_employee(percentage: Decimal, is_active: bool) -> EmployeeProfile {
        EmployeeProfile {
            id: Uuid::new_v4(),
            name: "Super".into(),
            employee_code: "SUP001".into(),
            role: EmployeeRole::SuperEmployee,
            super_employee: None,
            employee_commission_percentage: Decimal::ZERO,
            commission_settings: CommissionSettings {
                percentage,
                is_active,
            },
            total_sellers_assigned: 0,
            total_commission_earned: Decimal::ZERO,
            last_commission_at: None,
        }
    }

    fn regular_employee(personal_rate: Decimal, supervisor: EmployeeId) -> EmployeeProfile {
        EmployeeProfile {
            id: Uuid::new_v4(),
            name: "Field".into(),
            employee_code: "EMP001".into(),
            role: EmployeeRole::Employee,
            super_employee: Some(supervisor),
            employee_commission_percentage: personal_rate,
            commission_settings: CommissionSettings {
                percentage: Decimal::ZERO,
                is_active: false,
            },
            total_sellers_assigned: 0,
            total_commission_earned: Decimal::ZERO,
            last_commission_at: None,
        }
    }

    #[test]
    fn test_referral_commission_uncapped() {
        let amount = referral_commission(dec!(599), dec!(10), &policy());
        assert_eq!(amount, Some(dec!(59.9)));
    }

    #[test]
    fn test_referral_commission_capped() {
        let amount = referral_commission(dec!(20000), dec!(10), &policy());
        assert_eq!(amount, Some(dec!(1000)));
    }

    #[test]
    fn test_referral_commission_below_minimum() {
        assert_eq!(referral_commission(dec!(99), dec!(10), &policy()), None);
    }

    #[test]
    fn test_referral_commission_inactive_policy() {
        let mut policy = policy();
        policy.is_active = false;
        assert_eq!(referral_commission(dec!(599), dec!(10), &policy), None);
    }

    #[test]
    fn test_percentage_resolution_order() {
        let settings = SystemSettings::default();
        let override_ = VendorCommissionOverride {
            vendor: Uuid::new_v4(),
            percentage: dec!(7.5),
            is_custom: true,
            is_active: true,
            set_by: Uuid::new_v4(),
            notes: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        assert_eq!(
            resolve_referral_percentage(Some(&override_), Some(&settings)),
            dec!(7.5)
        );
        assert_eq!(
            resolve_referral_percentage(None, Some(&settings)),
            dec!(3)
        );
        assert_eq!(resolve_referral_percentage(None, None), dec!(10));

        let mut inactive = override_;
        inactive.is_active = false;
        assert_eq!(
            resolve_referral_percentage(Some(&inactive), Some(&settings)),
            dec!(3)
        );
    }

    #[test]
    fn test_employee_commission_amount() {
        assert_eq!(employee_commission(dec!(899), dec!(5)), dec!(44.95));
    }

    #[test]
    fn test_direct_super_employee_payee() {
        let payee = super_employee(dec!(5), true);
        let resolved = resolve_employee_payee(&payee, None);
        assert_eq!(resolved, Some((payee.id, dec!(5))));
    }

    #[test]
    fn test_inactive_super_employee_earns_nothing() {
        let payee = super_employee(dec!(5), false);
        assert_eq!(resolve_employee_payee(&payee, None), None);
    }

    #[test]
    fn test_regular_employee_rolls_up_at_own_rate() {
        let supervisor = super_employee(dec!(5), true);
        let assigned = regular_employee(dec!(2), supervisor.id);
        let resolved = resolve_employee_payee(&assigned, Some(&supervisor));
        // Credit routes to the supervisor, at the subordinate's rate.
        assert_eq!(resolved, Some((supervisor.id, dec!(2))));
    }

    #[test]
    fn test_regular_employee_without_rate_earns_nothing() {
        let supervisor = super_employee(dec!(5), true);
        let assigned = regular_employee(Decimal::ZERO, supervisor.id);
        assert_eq!(resolve_employee_payee(&assigned, Some(&supervisor)), None);
    }

    #[test]
    fn test_regular_employee_under_inactive_supervisor() {
        let supervisor = super_employee(dec!(5), false);
        let assigned = regular_employee(dec!(2), supervisor.id);
        assert_eq!(resolve_employee_payee(&assigned, Some(&supervisor)), None);
    }
}
