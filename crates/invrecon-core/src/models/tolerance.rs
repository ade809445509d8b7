//! Matching tolerance rules and their resolution contract.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a tolerance rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceType {
    /// Monetary amount variance
    Price,
    /// Quantity variance
    Quantity,
    /// Date variance in days
    Date,
}

/// A configurable tolerance rule.
///
/// Scope narrows by vendor and amount bracket: `vendor_id = None` applies to
/// all vendors, `amount_threshold = None` to all amounts. At least one of
/// `percentage_tolerance` / `absolute_tolerance` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingTolerance {
    /// Rule identifier
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Vendor scope; None = all vendors
    pub vendor_id: Option<Uuid>,

    /// Minimum amount the rule applies from; None = all amounts
    pub amount_threshold: Option<Decimal>,

    /// What the rule tolerates
    pub tolerance_type: ToleranceType,

    /// Relative tolerance, in [0, 1]
    pub percentage_tolerance: Option<Decimal>,

    /// Absolute tolerance, >= 0 (days for date rules)
    pub absolute_tolerance: Option<Decimal>,

    /// Resolution priority, 1..=10; higher wins
    pub priority: u8,

    /// Is this rule active
    pub is_active: bool,
}

impl MatchingTolerance {
    /// Create a new active rule scoped to all vendors and amounts.
    pub fn new(tenant_id: Uuid, tolerance_type: ToleranceType, priority: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            vendor_id: None,
            amount_threshold: None,
            tolerance_type,
            percentage_tolerance: None,
            absolute_tolerance: None,
            priority,
            is_active: true,
        }
    }

    /// Scope the rule to a single vendor.
    pub fn for_vendor(mut self, vendor_id: Uuid) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    /// Scope the rule to amounts at or above a threshold.
    pub fn above_amount(mut self, threshold: Decimal) -> Self {
        self.amount_threshold = Some(threshold);
        self
    }

    /// Set the percentage tolerance.
    pub fn with_percentage(mut self, pct: Decimal) -> Self {
        self.percentage_tolerance = Some(pct);
        self
    }

    /// Set the absolute tolerance.
    pub fn with_absolute(mut self, abs: Decimal) -> Self {
        self.absolute_tolerance = Some(abs);
        self
    }

    /// Whether this rule is in scope for the given vendor and amount.
    pub fn applies_to(&self, vendor_id: Uuid, amount: Decimal) -> bool {
        self.is_active
            && self.vendor_id.map_or(true, |v| v == vendor_id)
            && self.amount_threshold.map_or(true, |t| t <= amount)
    }
}
