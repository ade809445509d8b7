//! Match result model and decision enums.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a match was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// PO number, vendor, and amount matched exactly
    Exact,
    /// Tolerance-based fuzzy match
    Fuzzy,
    /// Established by a user
    Manual,
    /// Partial match (subset of lines)
    Partial,
}

/// Decision state of a match result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Awaiting a decision
    Pending,
    /// Approved (automatically or by a user)
    Approved,
    /// Rejected by a user
    Rejected,
    /// Queued for manual review
    ManualReview,
}

/// Who produced the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    /// Automated matching engine
    System,
    /// A user
    User,
}

/// A confidence-scored match between an invoice and its counterpart documents.
///
/// Invariants: `match_status == Approved` iff `approved_at` is set;
/// `requires_review == false` implies `reviewed_at` is unset at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    /// Match result identifier
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Matched invoice
    pub invoice_id: Uuid,

    /// Matched purchase order, if any
    pub purchase_order_id: Option<Uuid>,

    /// Primary matched receipt, if any
    pub receipt_id: Option<Uuid>,

    /// How the match was established
    pub match_type: MatchType,

    /// Weighted confidence, in [0, 1], 4 decimal places
    pub confidence_score: Decimal,

    /// Decision state
    pub match_status: MatchStatus,

    /// Criteria evaluated during matching, keyed by factor name
    pub criteria_met: serde_json::Value,

    /// Tolerance configuration applied, if any
    pub tolerance_applied: Option<serde_json::Value>,

    /// Was the match auto-approved
    pub auto_approved: bool,

    /// Does the match need manual review
    pub requires_review: bool,

    /// Observed amount variance (relative)
    pub amount_variance: Option<Decimal>,

    /// Observed quantity variance (relative)
    pub quantity_variance: Option<Decimal>,

    /// When the match was computed
    pub matched_at: DateTime<Utc>,

    /// When the match was reviewed, if it was
    pub reviewed_at: Option<DateTime<Utc>>,

    /// When the match was approved, if it was
    pub approved_at: Option<DateTime<Utc>>,

    /// Reviewer notes
    pub review_notes: Option<String>,

    /// Reviewing actor
    pub reviewed_by: Option<Uuid>,

    /// Approving actor
    pub approved_by: Option<Uuid>,

    /// Who produced the match
    pub matched_by: MatchedBy,
}

impl MatchResult {
    /// Create a new system match result in pending state.
    pub fn new(
        tenant_id: Uuid,
        invoice_id: Uuid,
        match_type: MatchType,
        confidence_score: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            invoice_id,
            purchase_order_id: None,
            receipt_id: None,
            match_type,
            confidence_score,
            match_status: MatchStatus::Pending,
            criteria_met: serde_json::Value::Object(serde_json::Map::new()),
            tolerance_applied: None,
            auto_approved: false,
            requires_review: false,
            amount_variance: None,
            quantity_variance: None,
            matched_at: Utc::now(),
            reviewed_at: None,
            approved_at: None,
            review_notes: None,
            reviewed_by: None,
            approved_by: None,
            matched_by: MatchedBy::System,
        }
    }

    /// Link the matched purchase order.
    pub fn with_purchase_order(mut self, po_id: Uuid) -> Self {
        self.purchase_order_id = Some(po_id);
        self
    }

    /// Link the primary matched receipt.
    pub fn with_receipt(mut self, receipt_id: Uuid) -> Self {
        self.receipt_id = Some(receipt_id);
        self
    }

    /// Record the approval decision. Auto-approved matches move straight to
    /// Approved with `approved_at` stamped; reviewable matches stay Pending.
    pub fn with_decision(mut self, auto_approved: bool, requires_review: bool) -> Self {
        self.auto_approved = auto_approved;
        self.requires_review = requires_review && !auto_approved;
        if auto_approved {
            self.match_status = MatchStatus::Approved;
            self.approved_at = Some(Utc::now());
        }
        self
    }

    /// Attach the evaluated criteria.
    pub fn with_criteria(mut self, criteria: serde_json::Value) -> Self {
        self.criteria_met = criteria;
        self
    }

    /// Attach observed variances.
    pub fn with_variances(
        mut self,
        amount_variance: Option<Decimal>,
        quantity_variance: Option<Decimal>,
    ) -> Self {
        self.amount_variance = amount_variance;
        self.quantity_variance = quantity_variance;
        self
    }

    /// Attach the applied tolerance configuration.
    pub fn with_tolerance_applied(mut self, tolerance: serde_json::Value) -> Self {
        self.tolerance_applied = Some(tolerance);
        self
    }
}
