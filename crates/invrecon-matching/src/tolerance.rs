//! Tolerance checks and rule resolution.
//!
//! Three pure checks decide whether an observed variance is acceptable, and
//! the resolver picks which configured rule applies to a given
//! (vendor, amount, type) from the tenant's active rule set.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use uuid::Uuid;

use invrecon_core::{MatchingTolerance, ToleranceType};

/// Resolved tolerance bounds for amounts or quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToleranceBounds {
    /// Relative bound, in [0, 1]
    pub percentage: Decimal,
    /// Absolute bound in document units
    pub absolute: Decimal,
}

impl ToleranceBounds {
    /// Default amount tolerance: 5% or $10.
    pub fn default_amount() -> Self {
        Self {
            percentage: dec!(0.05),
            absolute: dec!(10.00),
        }
    }

    /// Default quantity tolerance: 2% or 1 unit.
    pub fn default_quantity() -> Self {
        Self {
            percentage: dec!(0.02),
            absolute: dec!(1.0),
        }
    }
}

/// Default date tolerance in days.
pub const DEFAULT_DATE_TOLERANCE_DAYS: i64 = 7;

/// Check whether two amounts fall within tolerance.
///
/// The variance is `|a - b| / max(a, b)`. A zero reference against a
/// non-zero amount counts as 100% variance; two zeros are within tolerance.
/// Within-tolerance when the relative variance is inside the percentage
/// bound OR the absolute difference is inside the absolute bound.
pub fn check_amount(
    invoice_amount: Decimal,
    reference_amount: Decimal,
    bounds: ToleranceBounds,
) -> (bool, Decimal) {
    let variance = (invoice_amount - reference_amount).abs();
    let larger = invoice_amount.max(reference_amount);
    let percentage_variance = if larger > Decimal::ZERO {
        variance / larger
    } else {
        Decimal::ZERO
    };

    let within = percentage_variance <= bounds.percentage || variance <= bounds.absolute;
    (within, percentage_variance)
}

/// Check whether two quantities fall within tolerance. Same contract as
/// [`check_amount`].
pub fn check_quantity(
    invoice_qty: Decimal,
    reference_qty: Decimal,
    bounds: ToleranceBounds,
) -> (bool, Decimal) {
    check_amount(invoice_qty, reference_qty, bounds)
}

/// Check whether two dates fall within a day tolerance. Returns the
/// absolute difference in days as the variance.
pub fn check_date(
    invoice_date: NaiveDate,
    reference_date: NaiveDate,
    tolerance_days: i64,
) -> (bool, i64) {
    let variance_days = (invoice_date - reference_date).num_days().abs();
    (variance_days <= tolerance_days, variance_days)
}

/// Resolved tolerance policy for one matching comparison.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TolerancePolicy {
    pub amount: ToleranceBounds,
    pub quantity: ToleranceBounds,
    pub date_days: i64,
}

impl Default for TolerancePolicy {
    fn default() -> Self {
        Self {
            amount: ToleranceBounds::default_amount(),
            quantity: ToleranceBounds::default_quantity(),
            date_days: DEFAULT_DATE_TOLERANCE_DAYS,
        }
    }
}

/// Resolve the tolerance policy for a (vendor, amount) pair from the
/// tenant's active rules.
///
/// For each tolerance type the active rule with the highest priority whose
/// vendor and amount scope matches wins; missing bounds fall back to the
/// defaults.
pub fn resolve_policy(
    rules: &[MatchingTolerance],
    vendor_id: Uuid,
    amount: Decimal,
) -> TolerancePolicy {
    let mut policy = TolerancePolicy::default();

    if let Some(rule) = best_rule(rules, ToleranceType::Price, vendor_id, amount) {
        policy.amount = ToleranceBounds {
            percentage: rule
                .percentage_tolerance
                .unwrap_or(policy.amount.percentage),
            absolute: rule.absolute_tolerance.unwrap_or(policy.amount.absolute),
        };
    }
    if let Some(rule) = best_rule(rules, ToleranceType::Quantity, vendor_id, amount) {
        policy.quantity = ToleranceBounds {
            percentage: rule
                .percentage_tolerance
                .unwrap_or(policy.quantity.percentage),
            absolute: rule.absolute_tolerance.unwrap_or(policy.quantity.absolute),
        };
    }
    if let Some(rule) = best_rule(rules, ToleranceType::Date, vendor_id, amount) {
        if let Some(days) = rule.absolute_tolerance {
            policy.date_days = days.trunc().to_i64().unwrap_or(DEFAULT_DATE_TOLERANCE_DAYS);
        }
    }

    policy
}

fn best_rule(
    rules: &[MatchingTolerance],
    tolerance_type: ToleranceType,
    vendor_id: Uuid,
    amount: Decimal,
) -> Option<&MatchingTolerance> {
    rules
        .iter()
        .filter(|r| r.tolerance_type == tolerance_type && r.applies_to(vendor_id, amount))
        .max_by_key(|r| r.priority)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_within_percentage() {
        let (within, variance) = check_amount(dec!(1020.00), dec!(1000.00), ToleranceBounds::default_amount());
        assert!(within);
        assert!(variance < dec!(0.02));
    }

    #[test]
    fn test_amount_within_absolute_only() {
        // 9 dollars off a tiny base blows the percentage but not the absolute bound.
        let (within, variance) = check_amount(dec!(19.00), dec!(10.00), ToleranceBounds::default_amount());
        assert!(within);
        assert!(variance > dec!(0.05));
    }

    #[test]
    fn test_amount_out_of_tolerance() {
        let (within, _) = check_amount(dec!(1200.00), dec!(1000.00), ToleranceBounds::default_amount());
        assert!(!within);
    }

    #[test]
    fn test_zero_against_zero_is_within() {
        let (within, variance) = check_amount(dec!(0), dec!(0), ToleranceBounds::default_amount());
        assert!(within);
        assert_eq!(variance, Decimal::ZERO);
    }

    #[test]
    fn test_date_tolerance() {
        let a = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let b = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        let (within, days) = check_date(a, b, DEFAULT_DATE_TOLERANCE_DAYS);
        assert!(within);
        assert_eq!(days, 5);

        let (within, days) = check_date(a, b, 3);
        assert!(!within);
        assert_eq!(days, 5);
    }

    #[test]
    fn test_resolution_prefers_highest_priority_in_scope() {
        let tenant = Uuid::new_v4();
        let vendor = Uuid::new_v4();

        let broad = MatchingTolerance::new(tenant, ToleranceType::Price, 1)
            .with_percentage(dec!(0.05));
        let vendor_specific = MatchingTolerance::new(tenant, ToleranceType::Price, 5)
            .for_vendor(vendor)
            .with_percentage(dec!(0.10));
        let other_vendor = MatchingTolerance::new(tenant, ToleranceType::Price, 9)
            .for_vendor(Uuid::new_v4())
            .with_percentage(dec!(0.20));

        let rules = vec![broad, vendor_specific, other_vendor];
        let policy = resolve_policy(&rules, vendor, dec!(500));
        assert_eq!(policy.amount.percentage, dec!(0.10));
    }

    #[test]
    fn test_resolution_respects_amount_bracket() {
        let tenant = Uuid::new_v4();
        let vendor = Uuid::new_v4();

        let high_value = MatchingTolerance::new(tenant, ToleranceType::Price, 8)
            .above_amount(dec!(10000))
            .with_percentage(dec!(0.01));

        let rules = vec![high_value];

        // Below the bracket the rule is out of scope; defaults apply.
        let policy = resolve_policy(&rules, vendor, dec!(500));
        assert_eq!(policy.amount.percentage, dec!(0.05));

        let policy = resolve_policy(&rules, vendor, dec!(20000));
        assert_eq!(policy.amount.percentage, dec!(0.01));
    }

    #[test]
    fn test_date_rule_overrides_days() {
        let tenant = Uuid::new_v4();
        let rule = MatchingTolerance::new(tenant, ToleranceType::Date, 3).with_absolute(dec!(14));

        let policy = resolve_policy(&[rule], Uuid::new_v4(), dec!(100));
        assert_eq!(policy.date_days, 14);
    }
}
