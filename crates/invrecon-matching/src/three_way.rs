//! Three-way matching engine (Invoice <-> Purchase Order <-> Receipt).
//!
//! Reconciles an invoice against its purchase order and the goods receipts
//! posted for that order, at both header and line granularity. Line matching
//! pairs each invoice line with its best PO line by item code, description
//! overlap, price, and quantity reasonableness; receipt quantities are
//! aggregated per PO line across all receipts, so split and partial
//! deliveries reconcile correctly.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use invrecon_core::{
    AuditEventType, Invoice, InvoiceLine, MatchResult, MatchType, NewAuditEvent, PurchaseOrder,
    PurchaseOrderLine, Receipt, ReconResult, Storage, ToleranceType,
};

use crate::tolerance::resolve_policy;

/// Candidate PO window relative to the invoice date (fuzzy path).
const PO_WINDOW_DAYS_BACK: i64 = 30;
const PO_WINDOW_DAYS_FORWARD: i64 = 7;

/// Receipt search envelope relative to invoice date and today.
const RECEIPT_WINDOW_DAYS_BACK: i64 = 60;
const RECEIPT_WINDOW_DAYS_FORWARD: i64 = 30;
const RECEIPT_FALLBACK_DAYS_BACK: i64 = 90;

/// Fuzzy PO candidates must be within +-10% of the invoice amount.
const FUZZY_AMOUNT_BAND: Decimal = dec!(0.10);

/// Minimum line confidence for an invoice line to bind to a PO line.
const LINE_MATCH_THRESHOLD: Decimal = dec!(0.7);

/// Algorithm version stamped on audit events.
const ALGORITHM_VERSION: &str = "3-way-1.0.0";

/// Classification of a three-way match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreeWayMatchClass {
    /// Nearly all lines matched inside tolerance
    PerfectMatch,
    /// Receipts cover less than the ordered quantity
    PartialReceipt,
    /// More receipt postings than PO lines
    SplitDelivery,
    /// Header amount variance beyond tolerance
    PriceVariance,
    /// Header quantity variance beyond tolerance
    QuantityVariance,
}

impl ThreeWayMatchClass {
    /// Stable wire name of the class.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerfectMatch => "perfect_match",
            Self::PartialReceipt => "partial_receipt",
            Self::SplitDelivery => "split_delivery",
            Self::PriceVariance => "price_variance",
            Self::QuantityVariance => "quantity_variance",
        }
    }
}

/// One invoice line's reconciliation against PO and receipt lines.
#[derive(Debug, Clone, Serialize)]
pub struct LineMatch {
    pub invoice_line_id: Uuid,
    pub po_line_id: Option<Uuid>,
    pub receipt_line_id: Option<Uuid>,

    pub invoice_quantity: Decimal,
    pub po_quantity: Option<Decimal>,
    pub receipt_quantity: Decimal,

    pub invoice_amount: Decimal,
    pub po_amount: Option<Decimal>,
    pub receipt_amount: Decimal,

    /// Relative quantity variance; 1.0 for unmatched lines
    pub quantity_variance: Decimal,
    /// Relative amount variance; 1.0 for unmatched lines
    pub amount_variance: Decimal,

    pub is_matched: bool,
    pub variance_within_tolerance: bool,
    pub match_confidence: Decimal,
    pub variance_explanation: String,
}

/// Header-level totals for the reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct FinancialSummary {
    pub total_po_amount: Decimal,
    pub total_invoice_amount: Decimal,
    pub total_receipt_amount: Decimal,
    pub net_amount_variance: Decimal,

    pub total_po_quantity: Decimal,
    pub total_invoice_quantity: Decimal,
    pub total_receipt_quantity: Decimal,
    pub net_quantity_variance: Decimal,
}

/// Complete three-way matching outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ThreeWayMatchOutcome {
    pub invoice_id: Uuid,
    pub po_id: Uuid,
    pub receipt_ids: Vec<Uuid>,
    pub match_result_id: Uuid,

    pub class: ThreeWayMatchClass,
    pub overall_confidence: Decimal,

    pub line_matches: Vec<LineMatch>,
    pub summary: FinancialSummary,

    pub amount_within_tolerance: bool,
    pub quantity_within_tolerance: bool,

    pub auto_approved: bool,
    pub requires_review: bool,
    pub exception_items: Vec<String>,

    pub processed_at: DateTime<Utc>,
}

/// Decision thresholds and header tolerances for three-way matching.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ThreeWayThresholds {
    /// Confidence at or above which a clean match auto-approves
    pub auto_approve: Decimal,
    /// Confidence at or above which a match queues for review
    pub manual_review: Decimal,
    /// Relative amount tolerance applied per line and at the header
    pub amount_tolerance: Decimal,
    /// Relative quantity tolerance applied per line and at the header
    pub quantity_tolerance: Decimal,
}

impl Default for ThreeWayThresholds {
    fn default() -> Self {
        Self {
            auto_approve: dec!(0.95),
            manual_review: dec!(0.80),
            amount_tolerance: dec!(0.02),
            quantity_tolerance: dec!(0.01),
        }
    }
}

/// Three-way matching engine for one tenant.
pub struct ThreeWayMatchEngine {
    tenant_id: Uuid,
    storage: Arc<dyn Storage>,
    thresholds: ThreeWayThresholds,
}

impl ThreeWayMatchEngine {
    /// Create an engine with the default thresholds.
    pub fn new(tenant_id: Uuid, storage: Arc<dyn Storage>) -> Self {
        Self {
            tenant_id,
            storage,
            thresholds: ThreeWayThresholds::default(),
        }
    }

    /// Override the decision thresholds.
    pub fn with_thresholds(mut self, thresholds: ThreeWayThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Perform a full three-way match for an invoice.
    ///
    /// Returns `None` when the invoice or a matching PO cannot be found;
    /// absence is never an error. A successful reconciliation persists a
    /// `MatchResult` and a `match_created` audit event carrying the full
    /// classification block.
    pub fn perform(&self, invoice_id: Uuid) -> ReconResult<Option<ThreeWayMatchOutcome>> {
        let Some(invoice) = self.storage.invoice(self.tenant_id, invoice_id)? else {
            warn!(%invoice_id, "invoice not found");
            return Ok(None);
        };
        if invoice.status.is_archived() {
            return Ok(None);
        }
        let invoice_lines = self.storage.invoice_lines(self.tenant_id, invoice_id)?;

        let Some(po) = self.find_matching_po(&invoice)? else {
            debug!(%invoice_id, "no matching PO found");
            return Ok(None);
        };
        let po_lines = self.storage.purchase_order_lines(self.tenant_id, po.id)?;

        let receipts = self.find_related_receipts(po.id, &invoice)?;
        let receipt_lines = self.load_receipt_lines(&receipts)?;

        // Per-tenant tolerance rules override the built-in line/header
        // bounds; without rules the 2%/1% defaults apply.
        let rules = self.storage.active_tolerances(self.tenant_id)?;
        let policy = resolve_policy(&rules, invoice.vendor_id, invoice.total_amount);
        let rule_in_scope = |tolerance_type: ToleranceType| {
            rules.iter().any(|r| {
                r.tolerance_type == tolerance_type
                    && r.applies_to(invoice.vendor_id, invoice.total_amount)
            })
        };
        let thresholds = ThreeWayThresholds {
            amount_tolerance: if rule_in_scope(ToleranceType::Price) {
                policy.amount.percentage
            } else {
                self.thresholds.amount_tolerance
            },
            quantity_tolerance: if rule_in_scope(ToleranceType::Quantity) {
                policy.quantity.percentage
            } else {
                self.thresholds.quantity_tolerance
            },
            ..self.thresholds
        };

        let aggregates = aggregate_receipt_lines(&receipt_lines);
        let line_matches =
            self.match_lines(&invoice_lines, &po_lines, &aggregates, &thresholds);

        let summary = financial_summary(&invoice, &po, &receipts, &invoice_lines, &po_lines);
        let (class, confidence) = classify(&line_matches, &summary, &thresholds);

        let amount_within_tolerance =
            summary.net_amount_variance <= summary.total_po_amount * thresholds.amount_tolerance;
        let quantity_within_tolerance = summary.total_po_quantity <= Decimal::ZERO
            || summary.net_quantity_variance
                <= summary.total_po_quantity * thresholds.quantity_tolerance;

        let (auto_approved, requires_review, exceptions) = approval_decision(
            confidence,
            amount_within_tolerance,
            quantity_within_tolerance,
            &line_matches,
            &thresholds,
        );

        let mut outcome = ThreeWayMatchOutcome {
            invoice_id: invoice.id,
            po_id: po.id,
            receipt_ids: receipts.iter().map(|r| r.id).collect(),
            match_result_id: Uuid::nil(),
            class,
            overall_confidence: confidence,
            line_matches,
            summary,
            amount_within_tolerance,
            quantity_within_tolerance,
            auto_approved,
            requires_review,
            exception_items: exceptions,
            processed_at: Utc::now(),
        };

        outcome.match_result_id = self.persist(&invoice, &outcome)?;

        info!(
            %invoice_id,
            class = outcome.class.as_str(),
            confidence = %outcome.overall_confidence,
            "three-way match completed"
        );
        Ok(Some(outcome))
    }

    /// Exact PO by reference and vendor, else the closest-amount candidate
    /// in the date window within the +-10% amount band.
    fn find_matching_po(&self, invoice: &Invoice) -> ReconResult<Option<PurchaseOrder>> {
        if let Some(reference) = invoice.po_reference.as_deref() {
            let reference = reference.trim();
            if !reference.is_empty() {
                let exact = self
                    .storage
                    .purchase_orders_by_number(self.tenant_id, invoice.vendor_id, reference)?
                    .into_iter()
                    .find(|po| po.currency == invoice.currency);
                if exact.is_some() {
                    return Ok(exact);
                }
            }
        }

        let from = invoice.invoice_date - ChronoDuration::days(PO_WINDOW_DAYS_BACK);
        let to = invoice.invoice_date + ChronoDuration::days(PO_WINDOW_DAYS_FORWARD);
        let low = invoice.total_amount * (Decimal::ONE - FUZZY_AMOUNT_BAND);
        let high = invoice.total_amount * (Decimal::ONE + FUZZY_AMOUNT_BAND);

        let candidate = self
            .storage
            .purchase_orders_in_window(self.tenant_id, Some(invoice.vendor_id), from, to)?
            .into_iter()
            .filter(|po| {
                po.currency == invoice.currency
                    && po.total_amount >= low
                    && po.total_amount <= high
            })
            .min_by_key(|po| (po.total_amount - invoice.total_amount).abs());

        Ok(candidate)
    }

    /// All receipts for the PO within a wide envelope around the invoice
    /// date, so late postings still reconcile.
    fn find_related_receipts(&self, po_id: Uuid, invoice: &Invoice) -> ReconResult<Vec<Receipt>> {
        let today = Utc::now().date_naive();
        let from = (invoice.invoice_date - ChronoDuration::days(RECEIPT_WINDOW_DAYS_BACK))
            .min(today - ChronoDuration::days(RECEIPT_FALLBACK_DAYS_BACK));
        let to = (invoice.invoice_date + ChronoDuration::days(RECEIPT_WINDOW_DAYS_FORWARD)).max(today);

        self.storage.receipts_for_po(self.tenant_id, po_id, from, to)
    }

    fn load_receipt_lines(
        &self,
        receipts: &[Receipt],
    ) -> ReconResult<Vec<invrecon_core::ReceiptLine>> {
        let mut lines = Vec::new();
        for receipt in receipts {
            lines.extend(self.storage.receipt_lines(self.tenant_id, receipt.id)?);
        }
        Ok(lines)
    }

    /// Bind each invoice line to its best PO line and compute variances.
    fn match_lines(
        &self,
        invoice_lines: &[InvoiceLine],
        po_lines: &[PurchaseOrderLine],
        aggregates: &HashMap<Uuid, ReceiptAggregate>,
        thresholds: &ThreeWayThresholds,
    ) -> Vec<LineMatch> {
        invoice_lines
            .iter()
            .map(|inv_line| {
                let best = po_lines
                    .iter()
                    .map(|po_line| (po_line, line_match_confidence(inv_line, po_line)))
                    .max_by(|a, b| a.1.cmp(&b.1));

                match best {
                    Some((po_line, confidence)) if confidence >= LINE_MATCH_THRESHOLD => {
                        let aggregate = aggregates.get(&po_line.id);
                        let receipt_quantity =
                            aggregate.map_or(Decimal::ZERO, |a| a.quantity);
                        let receipt_amount = aggregate.map_or(Decimal::ZERO, |a| a.amount);

                        let quantity_variance = quantity_variance(
                            inv_line.quantity,
                            po_line.quantity,
                            receipt_quantity,
                        );
                        let amount_variance =
                            amount_variance(inv_line.line_total, po_line.line_total);

                        let within = quantity_variance <= thresholds.quantity_tolerance
                            && amount_variance <= thresholds.amount_tolerance;

                        LineMatch {
                            invoice_line_id: inv_line.id,
                            po_line_id: Some(po_line.id),
                            receipt_line_id: aggregate
                                .and_then(|a| a.line_ids.first().copied()),
                            invoice_quantity: inv_line.quantity,
                            po_quantity: Some(po_line.quantity),
                            receipt_quantity,
                            invoice_amount: inv_line.line_total,
                            po_amount: Some(po_line.line_total),
                            receipt_amount,
                            quantity_variance,
                            amount_variance,
                            is_matched: true,
                            variance_within_tolerance: within,
                            match_confidence: confidence,
                            variance_explanation: explain_line_variance(
                                quantity_variance,
                                amount_variance,
                            ),
                        }
                    }
                    _ => LineMatch {
                        invoice_line_id: inv_line.id,
                        po_line_id: None,
                        receipt_line_id: None,
                        invoice_quantity: inv_line.quantity,
                        po_quantity: None,
                        receipt_quantity: Decimal::ZERO,
                        invoice_amount: inv_line.line_total,
                        po_amount: None,
                        receipt_amount: Decimal::ZERO,
                        quantity_variance: dec!(1.0),
                        amount_variance: dec!(1.0),
                        is_matched: false,
                        variance_within_tolerance: false,
                        match_confidence: Decimal::ZERO,
                        variance_explanation: "No matching PO line found".to_string(),
                    },
                }
            })
            .collect()
    }

    /// Persist the outcome and its audit event.
    fn persist(&self, invoice: &Invoice, outcome: &ThreeWayMatchOutcome) -> ReconResult<Uuid> {
        let match_type = if outcome.class == ThreeWayMatchClass::PerfectMatch {
            MatchType::Exact
        } else {
            MatchType::Fuzzy
        };

        let criteria = serde_json::json!({
            "three_way_match_type": outcome.class.as_str(),
            "line_matches_count": outcome.line_matches.len(),
            "amount_within_tolerance": outcome.amount_within_tolerance,
            "quantity_within_tolerance": outcome.quantity_within_tolerance,
        });

        let mut result = MatchResult::new(
            self.tenant_id,
            invoice.id,
            match_type,
            outcome.overall_confidence,
        )
        .with_purchase_order(outcome.po_id)
        .with_criteria(criteria)
        .with_variances(
            Some(outcome.summary.net_amount_variance),
            Some(outcome.summary.net_quantity_variance),
        )
        .with_decision(outcome.auto_approved, outcome.requires_review);

        if let Some(&receipt_id) = outcome.receipt_ids.first() {
            result = result.with_receipt(receipt_id);
        }

        let matched = outcome
            .line_matches
            .iter()
            .filter(|m| m.is_matched)
            .count();
        let within = outcome
            .line_matches
            .iter()
            .filter(|m| m.variance_within_tolerance)
            .count();

        let decision_factors = serde_json::json!({
            "three_way_match_result": {
                "match_type": outcome.class.as_str(),
                "overall_confidence": outcome.overall_confidence.to_string(),
                "line_matches_summary": {
                    "total_lines": outcome.line_matches.len(),
                    "matched_lines": matched,
                    "within_tolerance": within,
                },
                "financial_summary": {
                    "po_amount": outcome.summary.total_po_amount.to_string(),
                    "invoice_amount": outcome.summary.total_invoice_amount.to_string(),
                    "receipt_amount": outcome.summary.total_receipt_amount.to_string(),
                    "amount_variance": outcome.summary.net_amount_variance.to_string(),
                    "quantity_variance": outcome.summary.net_quantity_variance.to_string(),
                },
                "approval_decision": {
                    "auto_approved": outcome.auto_approved,
                    "requires_review": outcome.requires_review,
                    "exceptions": outcome.exception_items,
                },
            },
        });

        let audit = NewAuditEvent::new(
            self.tenant_id,
            result.id,
            AuditEventType::MatchCreated,
            format!("3-way match completed: {}", outcome.class.as_str()),
        )
        .with_factors(decision_factors)
        .with_breakdown(serde_json::json!({
            "overall_confidence": outcome.overall_confidence.to_string(),
        }))
        .with_algorithm_version(ALGORITHM_VERSION);

        let result_id = result.id;
        let stored = result.clone();
        self.storage.transaction(self.tenant_id, &mut |txn| {
            txn.insert_match_result(stored.clone())?;
            txn.append_audit_event(audit.clone())?;
            Ok(())
        })?;

        Ok(result_id)
    }
}

/// Aggregated receipt postings for one PO line.
#[derive(Debug, Clone, Default)]
pub struct ReceiptAggregate {
    pub quantity: Decimal,
    pub amount: Decimal,
    pub line_ids: Vec<Uuid>,
}

fn aggregate_receipt_lines(
    receipt_lines: &[invrecon_core::ReceiptLine],
) -> HashMap<Uuid, ReceiptAggregate> {
    let mut aggregates: HashMap<Uuid, ReceiptAggregate> = HashMap::new();
    for line in receipt_lines {
        let entry = aggregates.entry(line.po_line_id).or_default();
        entry.quantity += line.quantity_received;
        entry.amount += line.line_value;
        entry.line_ids.push(line.id);
    }
    aggregates
}

/// Sub-factor confidence for binding an invoice line to a PO line:
/// item code 0.4, description overlap 0.3, unit price 0.2, quantity
/// reasonableness 0.1.
fn line_match_confidence(invoice_line: &InvoiceLine, po_line: &PurchaseOrderLine) -> Decimal {
    let mut score = 0.0f64;

    score += match (&invoice_line.item_code, &po_line.item_code) {
        (Some(a), Some(b)) => {
            if a.trim().eq_ignore_ascii_case(b.trim()) {
                0.4
            } else {
                0.0
            }
        }
        (None, None) => 0.1,
        _ => 0.0,
    };

    score += description_similarity(&invoice_line.description, &po_line.description) * 0.3;

    if po_line.unit_price > Decimal::ZERO {
        let price_diff = ((invoice_line.unit_price - po_line.unit_price).abs()
            / po_line.unit_price)
            .to_f64()
            .unwrap_or(1.0);
        score += (1.0 - price_diff).max(0.0) * 0.2;
    }

    if po_line.quantity > Decimal::ZERO && invoice_line.quantity > Decimal::ZERO {
        let ratio_a = (invoice_line.quantity / po_line.quantity).to_f64().unwrap_or(0.0);
        let ratio_b = (po_line.quantity / invoice_line.quantity).to_f64().unwrap_or(0.0);
        score += ratio_a.min(ratio_b) * 0.1;
    }

    Decimal::from_f64(score)
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

/// Jaccard overlap of lowercased word sets.
fn description_similarity(a: &str, b: &str) -> f64 {
    let words_a: std::collections::HashSet<String> =
        a.to_lowercase().split_whitespace().map(String::from).collect();
    let words_b: std::collections::HashSet<String> =
        b.to_lowercase().split_whitespace().map(String::from).collect();

    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    intersection as f64 / union as f64
}

/// Relative quantity variance against the PO line; the receipt quantity is
/// authoritative when goods have been posted.
fn quantity_variance(invoice_qty: Decimal, po_qty: Decimal, receipt_qty: Decimal) -> Decimal {
    if po_qty == Decimal::ZERO {
        return dec!(1.0);
    }
    let compare = if receipt_qty > Decimal::ZERO {
        receipt_qty
    } else {
        invoice_qty
    };
    (compare - po_qty).abs() / po_qty
}

/// Relative amount variance of the invoice line against the PO line.
fn amount_variance(invoice_amount: Decimal, po_amount: Decimal) -> Decimal {
    if po_amount == Decimal::ZERO {
        return dec!(1.0);
    }
    (invoice_amount - po_amount).abs() / po_amount
}

fn explain_line_variance(qty_variance: Decimal, amt_variance: Decimal) -> String {
    let mut parts = Vec::new();
    if qty_variance > dec!(0.05) {
        parts.push(format!("Quantity variance: {}", qty_variance.round_dp(4)));
    }
    if amt_variance > dec!(0.05) {
        parts.push(format!("Amount variance: {}", amt_variance.round_dp(4)));
    }
    if parts.is_empty() {
        "Within tolerance".to_string()
    } else {
        parts.join("; ")
    }
}

fn financial_summary(
    invoice: &Invoice,
    po: &PurchaseOrder,
    receipts: &[Receipt],
    invoice_lines: &[InvoiceLine],
    po_lines: &[PurchaseOrderLine],
) -> FinancialSummary {
    let total_po_quantity: Decimal = po_lines.iter().map(|l| l.quantity).sum();
    let total_invoice_quantity: Decimal = invoice_lines.iter().map(|l| l.quantity).sum();
    let total_receipt_quantity: Decimal = receipts.iter().map(|r| r.total_quantity).sum();
    let total_receipt_amount: Decimal = receipts.iter().map(|r| r.total_value).sum();

    let net_quantity_variance = if total_po_quantity > Decimal::ZERO {
        (total_invoice_quantity - total_po_quantity).abs()
    } else {
        Decimal::ZERO
    };

    FinancialSummary {
        total_po_amount: po.total_amount,
        total_invoice_amount: invoice.total_amount,
        total_receipt_amount,
        net_amount_variance: (invoice.total_amount - po.total_amount).abs(),
        total_po_quantity,
        total_invoice_quantity,
        total_receipt_quantity,
        net_quantity_variance,
    }
}

/// Classify the match and derive its confidence, clamped to [0, 1].
fn classify(
    line_matches: &[LineMatch],
    summary: &FinancialSummary,
    thresholds: &ThreeWayThresholds,
) -> (ThreeWayMatchClass, Decimal) {
    let total_lines = line_matches.len();
    if total_lines == 0 {
        return (ThreeWayMatchClass::PerfectMatch, Decimal::ZERO);
    }

    let matched = line_matches.iter().filter(|m| m.is_matched).count();
    let within = line_matches
        .iter()
        .filter(|m| m.variance_within_tolerance)
        .count();

    let match_pct = Decimal::from(matched as u64) / Decimal::from(total_lines as u64);
    let tol_pct = Decimal::from(within as u64) / Decimal::from(total_lines as u64);

    let lines_with_receipt = line_matches.iter().filter(|m| m.receipt_line_id.is_some()).count();
    let lines_with_po = line_matches.iter().filter(|m| m.po_line_id.is_some()).count();

    let (class, confidence) = if match_pct >= dec!(0.95) && tol_pct >= dec!(0.95) {
        (ThreeWayMatchClass::PerfectMatch, dec!(0.95))
    } else if summary.total_receipt_quantity < summary.total_po_quantity {
        (ThreeWayMatchClass::PartialReceipt, match_pct * dec!(0.85))
    } else if lines_with_receipt > lines_with_po {
        (ThreeWayMatchClass::SplitDelivery, match_pct * dec!(0.80))
    } else if summary.net_amount_variance
        > summary.total_po_amount * thresholds.amount_tolerance
    {
        (ThreeWayMatchClass::PriceVariance, tol_pct * dec!(0.75))
    } else if summary.net_quantity_variance
        > summary.total_po_quantity * thresholds.quantity_tolerance
    {
        (ThreeWayMatchClass::QuantityVariance, tol_pct * dec!(0.70))
    } else {
        // Residual mixed cases read as partial receipts.
        (
            ThreeWayMatchClass::PartialReceipt,
            match_pct * tol_pct * dec!(0.80),
        )
    };

    (
        class,
        confidence.clamp(Decimal::ZERO, Decimal::ONE).round_dp(4),
    )
}

fn approval_decision(
    confidence: Decimal,
    amount_within_tolerance: bool,
    quantity_within_tolerance: bool,
    line_matches: &[LineMatch],
    thresholds: &ThreeWayThresholds,
) -> (bool, bool, Vec<String>) {
    let mut exceptions = Vec::new();

    let unmatched = line_matches.iter().filter(|m| !m.is_matched).count();
    if unmatched > 0 {
        exceptions.push(format!("{} unmatched invoice lines", unmatched));
    }

    let high_variance = line_matches
        .iter()
        .filter(|m| m.is_matched && !m.variance_within_tolerance)
        .count();
    if high_variance > 0 {
        exceptions.push(format!("{} lines with high variance", high_variance));
    }

    if !amount_within_tolerance {
        exceptions.push("Total amount exceeds tolerance".to_string());
    }
    if !quantity_within_tolerance {
        exceptions.push("Total quantity exceeds tolerance".to_string());
    }

    let auto_approved = confidence >= thresholds.auto_approve
        && exceptions.is_empty()
        && amount_within_tolerance
        && quantity_within_tolerance;

    let requires_review = confidence >= thresholds.manual_review && !auto_approved;

    (auto_approved, requires_review, exceptions)
}
