//! Two-way matching engine (Invoice <-> Purchase Order).
//!
//! Matching runs an exact pass first (PO reference + vendor + amount), then
//! a tolerance-based fuzzy pass over candidate POs in a date window around
//! the invoice date. The winning candidate is scored, persisted as a
//! `MatchResult`, and audited - all inside one storage transaction, so a
//! persistence failure leaves no trace of the attempt.
//!
//! Batches run over a bounded worker pool; each worker processes fixed-size
//! chunks pulled from a shared queue and reports into a completion channel.
//! A failing invoice never aborts the batch.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use invrecon_config::{validate_config, ConfigLoader};
use invrecon_core::{
    AuditActor, AuditEventType, Invoice, MatchResult, MatchStatus, MatchType,
    MatchingConfiguration, NewAuditEvent, PurchaseOrder, ReconError, ReconResult, Storage,
};

use crate::confidence::{ConfidenceScorer, FactorWeights, MatchFactors};
use crate::fuzzy::{composite_similarity, FuzzyMatcher};
use crate::metrics::ProcessingMetrics;
use crate::tolerance::{check_amount, check_date, resolve_policy, TolerancePolicy};

/// Days of PO history considered before the invoice date.
const FUZZY_WINDOW_DAYS_BACK: i64 = 30;

/// Days of PO future considered after the invoice date.
const FUZZY_WINDOW_DAYS_FORWARD: i64 = 7;

/// Invoices per worker chunk in parallel batches.
const BATCH_CHUNK_SIZE: usize = 10;

/// Algorithm version stamped on audit events.
const ALGORITHM_VERSION: &str = "2-way-1.0.0";

/// User feedback on a match result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserFeedback {
    /// Confirm the match
    Approve,
    /// Reject the match
    Reject,
    /// Request modification; the match goes back to review
    Modify,
}

impl UserFeedback {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Modify => "modify",
        }
    }
}

/// The outcome of matching one invoice.
#[derive(Debug, Clone, Serialize)]
pub struct MatchDecision {
    pub invoice_id: Uuid,
    pub match_result_id: Uuid,
    pub purchase_order_id: Option<Uuid>,
    pub receipt_id: Option<Uuid>,
    pub match_type: MatchType,
    pub confidence_score: rust_decimal::Decimal,
    pub auto_approved: bool,
    pub requires_review: bool,
    pub criteria_met: serde_json::Value,
    pub explanation: String,
}

impl MatchDecision {
    fn from_stored(result: &MatchResult) -> Self {
        Self {
            invoice_id: result.invoice_id,
            match_result_id: result.id,
            purchase_order_id: result.purchase_order_id,
            receipt_id: result.receipt_id,
            match_type: result.match_type,
            confidence_score: result.confidence_score,
            auto_approved: result.auto_approved,
            requires_review: result.requires_review,
            criteria_met: result.criteria_met.clone(),
            explanation: "Existing match decision returned".to_string(),
        }
    }
}

/// A scored candidate produced by one of the matching passes.
struct MatchCandidate {
    po_id: Uuid,
    confidence: rust_decimal::Decimal,
    factors: MatchFactors,
    breakdown: serde_json::Value,
    policy: Option<TolerancePolicy>,
}

/// Two-way matching engine for one tenant.
///
/// Initialization loads the tenant configuration, installs the factor
/// weights, and pre-fits the vendor corpus. After initialization the engine
/// is immutable and safe to share across batch workers.
pub struct TwoWayMatchEngine {
    tenant_id: Uuid,
    storage: Arc<dyn Storage>,
    config: MatchingConfiguration,
    scorer: ConfidenceScorer,
    fuzzy: FuzzyMatcher,
    initialized: bool,
}

impl TwoWayMatchEngine {
    /// Create an uninitialized engine. Call [`Self::initialize`] before
    /// matching.
    pub fn new(tenant_id: Uuid, storage: Arc<dyn Storage>) -> Self {
        Self {
            tenant_id,
            storage,
            config: MatchingConfiguration::defaults(tenant_id),
            scorer: ConfidenceScorer::with_defaults(),
            fuzzy: FuzzyMatcher::new(),
            initialized: false,
        }
    }

    /// Load configuration and pre-fit the vendor corpus. Idempotent.
    pub fn initialize(&mut self) -> ReconResult<()> {
        if self.initialized {
            return Ok(());
        }

        let loader = ConfigLoader::new(Arc::clone(&self.storage));
        let config = loader.active_for(self.tenant_id)?;
        validate_config(&config)?;
        self.scorer = ConfidenceScorer::new(FactorWeights::from_config(&config))?;

        let vendor_names = self.storage.active_vendor_names(self.tenant_id)?;
        self.fuzzy.fit_vendor_corpus(&vendor_names);

        info!(
            tenant_id = %self.tenant_id,
            vendors = vendor_names.len(),
            version = %config.config_version,
            "matching engine initialized"
        );

        self.config = config;
        self.initialized = true;
        Ok(())
    }

    /// The active configuration.
    pub fn config(&self) -> &MatchingConfiguration {
        &self.config
    }

    /// The fuzzy matcher with the fitted vendor corpus.
    pub fn fuzzy(&self) -> &FuzzyMatcher {
        &self.fuzzy
    }

    fn ensure_initialized(&self) -> ReconResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(ReconError::config("matching engine not initialized"))
        }
    }

    /// Match a single invoice against purchase orders.
    ///
    /// Returns `None` when the invoice does not exist, is archived, or no
    /// candidate reaches the review threshold - absence of a match is never
    /// an error. With `force_rematch = false` a previously persisted
    /// decision is returned unchanged; with `true` the pipeline re-runs and
    /// appends a fresh result, leaving history intact.
    pub fn match_one(
        &self,
        invoice_id: Uuid,
        force_rematch: bool,
    ) -> ReconResult<Option<MatchDecision>> {
        self.ensure_initialized()?;

        let Some(invoice) = self.storage.invoice(self.tenant_id, invoice_id)? else {
            warn!(%invoice_id, "invoice not found");
            return Ok(None);
        };
        if invoice.status.is_archived() {
            return Ok(None);
        }

        if !force_rematch {
            let prior = self
                .storage
                .match_results_for_invoice(self.tenant_id, invoice_id)?
                .into_iter()
                .find(|r| r.match_status != MatchStatus::Rejected);
            if let Some(result) = prior {
                debug!(%invoice_id, "returning prior match decision");
                return Ok(Some(MatchDecision::from_stored(&result)));
            }
        }

        let candidate = match self.attempt_exact_match(&invoice)? {
            Some(candidate) => Some(candidate),
            None if self.config.fuzzy_matching_enabled => self.attempt_fuzzy_match(&invoice)?,
            None => None,
        };

        match candidate {
            Some(candidate) => Ok(Some(self.finalize(&invoice, candidate)?)),
            None => {
                debug!(%invoice_id, "no match found");
                Ok(None)
            }
        }
    }

    /// Exact pass: PO number equals the invoice's reference, same vendor,
    /// same currency, amount equal to the cent.
    fn attempt_exact_match(&self, invoice: &Invoice) -> ReconResult<Option<MatchCandidate>> {
        let Some(po_reference) = invoice.po_reference.as_deref() else {
            return Ok(None);
        };
        let po_reference = po_reference.trim();
        if po_reference.is_empty() {
            return Ok(None);
        }

        let pos = self.storage.purchase_orders_by_number(
            self.tenant_id,
            invoice.vendor_id,
            po_reference,
        )?;

        for po in pos {
            if po.currency == invoice.currency && po.total_amount == invoice.total_amount {
                let factors = MatchFactors {
                    vendor_similarity: 1.0,
                    vendor_exact_match: true,
                    amount_within_tolerance: true,
                    amount_variance: rust_decimal::Decimal::ZERO,
                    amount_exact_match: true,
                    date_within_tolerance: true,
                    date_variance_days: (invoice.invoice_date - po.po_date).num_days().abs(),
                    reference_exact_match: true,
                    reference_similarity: 1.0,
                };
                return Ok(Some(MatchCandidate {
                    po_id: po.id,
                    confidence: dec!(1.0),
                    breakdown: serde_json::json!({
                        "vendor_name": 1.0,
                        "amount": 1.0,
                        "date": 1.0,
                        "reference": 1.0,
                    }),
                    factors,
                    policy: None,
                }));
            }
        }

        Ok(None)
    }

    /// Fuzzy pass: tolerance-scored candidates from the PO date window.
    fn attempt_fuzzy_match(&self, invoice: &Invoice) -> ReconResult<Option<MatchCandidate>> {
        let from = invoice.invoice_date - ChronoDuration::days(FUZZY_WINDOW_DAYS_BACK);
        let to = invoice.invoice_date + ChronoDuration::days(FUZZY_WINDOW_DAYS_FORWARD);

        let pos = self.storage.purchase_orders_in_window(
            self.tenant_id,
            Some(invoice.vendor_id),
            from,
            to,
        )?;
        if pos.is_empty() {
            return Ok(None);
        }

        let rules = self.storage.active_tolerances(self.tenant_id)?;
        let policy = resolve_policy(&rules, invoice.vendor_id, invoice.total_amount);

        let mut best: Option<MatchCandidate> = None;
        for po in &pos {
            // Mixed-currency documents never match.
            if po.currency != invoice.currency {
                continue;
            }

            let factors = self.calculate_match_factors(invoice, po, &policy)?;
            let (confidence, breakdown) = self.scorer.calculate(&factors);

            if confidence < self.config.manual_review_threshold {
                continue;
            }
            if best.as_ref().map_or(true, |b| confidence > b.confidence) {
                best = Some(MatchCandidate {
                    po_id: po.id,
                    confidence,
                    breakdown: breakdown.to_json(),
                    factors,
                    policy: Some(policy),
                });
            }
        }

        Ok(best)
    }

    fn calculate_match_factors(
        &self,
        invoice: &Invoice,
        po: &PurchaseOrder,
        policy: &TolerancePolicy,
    ) -> ReconResult<MatchFactors> {
        let vendor_exact_match = invoice.vendor_id == po.vendor_id;
        let vendor_similarity = if vendor_exact_match {
            1.0
        } else {
            let invoice_vendor = self
                .storage
                .vendor(self.tenant_id, invoice.vendor_id)?
                .ok_or_else(|| ReconError::not_found("invoice vendor"))?;
            let po_vendor = self
                .storage
                .vendor(self.tenant_id, po.vendor_id)?
                .ok_or_else(|| ReconError::not_found("PO vendor"))?;
            self.fuzzy.composite(&invoice_vendor.name, &po_vendor.name)
        };

        let (amount_within_tolerance, amount_variance) =
            check_amount(invoice.total_amount, po.total_amount, policy.amount);
        let (date_within_tolerance, date_variance_days) =
            check_date(invoice.invoice_date, po.po_date, policy.date_days);

        let (reference_exact_match, reference_similarity) = match invoice.po_reference.as_deref() {
            Some(reference) if !reference.trim().is_empty() => {
                let reference = reference.trim();
                let exact = reference.eq_ignore_ascii_case(po.po_number.trim());
                let similarity = if exact {
                    1.0
                } else {
                    composite_similarity(reference, &po.po_number)
                };
                (exact, similarity)
            }
            _ => (false, 0.0),
        };

        Ok(MatchFactors {
            vendor_similarity,
            vendor_exact_match,
            amount_within_tolerance,
            amount_variance,
            amount_exact_match: invoice.total_amount == po.total_amount,
            date_within_tolerance,
            date_variance_days,
            reference_exact_match,
            reference_similarity,
        })
    }

    /// Persist the winning candidate and its audit event, then return the
    /// decision.
    fn finalize(&self, invoice: &Invoice, candidate: MatchCandidate) -> ReconResult<MatchDecision> {
        let match_type = if candidate.confidence == dec!(1.0) {
            MatchType::Exact
        } else {
            MatchType::Fuzzy
        };

        let auto_approved = candidate.confidence >= self.config.auto_approve_threshold;
        let requires_review = !auto_approved
            && candidate.confidence >= self.config.manual_review_threshold;

        let explanation = self.explain(&candidate, match_type);
        let criteria = candidate.factors.to_json();

        let mut result = MatchResult::new(
            self.tenant_id,
            invoice.id,
            match_type,
            candidate.confidence,
        )
        .with_purchase_order(candidate.po_id)
        .with_criteria(criteria.clone())
        .with_variances(Some(candidate.factors.amount_variance), None)
        .with_decision(auto_approved, requires_review);

        if let Some(policy) = &candidate.policy {
            result = result.with_tolerance_applied(
                serde_json::to_value(policy).map_err(ReconError::from)?,
            );
        }

        let decision = MatchDecision {
            invoice_id: invoice.id,
            match_result_id: result.id,
            purchase_order_id: Some(candidate.po_id),
            receipt_id: None,
            match_type,
            confidence_score: candidate.confidence,
            auto_approved,
            requires_review,
            criteria_met: criteria.clone(),
            explanation: explanation.clone(),
        };

        let audit = NewAuditEvent::new(
            self.tenant_id,
            result.id,
            AuditEventType::MatchCreated,
            format!("Automated match created: {}", explanation),
        )
        .with_factors(criteria)
        .with_breakdown(candidate.breakdown.clone())
        .with_algorithm_version(ALGORITHM_VERSION);

        let stored_result = result.clone();
        self.storage.transaction(self.tenant_id, &mut |txn| {
            txn.insert_match_result(stored_result.clone())?;
            txn.append_audit_event(audit.clone())?;
            Ok(())
        })?;

        info!(
            invoice_id = %invoice.id,
            confidence = %candidate.confidence,
            ?match_type,
            "match result saved"
        );

        Ok(decision)
    }

    fn explain(&self, candidate: &MatchCandidate, match_type: MatchType) -> String {
        if match_type == MatchType::Exact {
            return "Exact match found on PO number, vendor, and amount".to_string();
        }

        format!(
            "Fuzzy match with confidence {}; vendor similarity {:.3}; amount variance {}; date variance {} days; reference exact: {}",
            candidate.confidence,
            candidate.factors.vendor_similarity,
            candidate.factors.amount_variance,
            candidate.factors.date_variance_days,
            candidate.factors.reference_exact_match,
        )
    }

    /// Match a batch of invoices, optionally in parallel.
    ///
    /// Parallel batches partition the ids into fixed-size chunks consumed by
    /// a worker pool bounded by `max_concurrent_jobs`; results carry their
    /// invoice id, and no cross-invoice ordering is promised. Per-invoice
    /// failures are logged, counted, and never abort the batch.
    pub fn match_batch(
        &self,
        invoice_ids: &[Uuid],
        parallel: bool,
    ) -> ReconResult<ProcessingMetrics> {
        self.ensure_initialized()?;
        let started = Instant::now();
        info!(
            tenant_id = %self.tenant_id,
            invoices = invoice_ids.len(),
            parallel,
            "starting batch matching"
        );

        let mut results: Vec<(Uuid, Option<MatchDecision>)> = Vec::new();
        let mut errors = 0usize;

        let run_parallel =
            parallel && self.config.parallel_processing_enabled && invoice_ids.len() > 1;

        if run_parallel {
            let chunks: Vec<Vec<Uuid>> = invoice_ids
                .chunks(BATCH_CHUNK_SIZE)
                .map(|c| c.to_vec())
                .collect();
            let workers = (self.config.max_concurrent_jobs as usize)
                .min(num_cpus::get())
                .min(chunks.len())
                .max(1);

            let (chunk_tx, chunk_rx) = crossbeam_channel::unbounded::<Vec<Uuid>>();
            let (done_tx, done_rx) =
                crossbeam_channel::unbounded::<(Uuid, ReconResult<Option<MatchDecision>>)>();

            for chunk in chunks {
                chunk_tx
                    .send(chunk)
                    .map_err(|_| ReconError::ChannelClosed)?;
            }
            drop(chunk_tx);

            std::thread::scope(|scope| {
                for _ in 0..workers {
                    let chunk_rx = chunk_rx.clone();
                    let done_tx = done_tx.clone();
                    scope.spawn(move || {
                        while let Ok(chunk) = chunk_rx.recv() {
                            for invoice_id in chunk {
                                let outcome = self.match_one(invoice_id, false);
                                if done_tx.send((invoice_id, outcome)).is_err() {
                                    return;
                                }
                            }
                        }
                    });
                }
                drop(done_tx);

                for (invoice_id, outcome) in done_rx.iter() {
                    match outcome {
                        Ok(decision) => results.push((invoice_id, decision)),
                        Err(err) => {
                            error!(%invoice_id, %err, "error matching invoice");
                            errors += 1;
                        }
                    }
                }
            });
        } else {
            for &invoice_id in invoice_ids {
                match self.match_one(invoice_id, false) {
                    Ok(decision) => results.push((invoice_id, decision)),
                    Err(err) => {
                        error!(%invoice_id, %err, "error matching invoice");
                        errors += 1;
                    }
                }
            }
        }

        let metrics = ProcessingMetrics::from_results(&results, errors, started.elapsed());
        info!(
            tenant_id = %self.tenant_id,
            exact = metrics.exact_matches,
            fuzzy = metrics.fuzzy_matches,
            unmatched = metrics.unmatched,
            errors = metrics.errors,
            "batch matching completed"
        );
        Ok(metrics)
    }

    /// All match results persisted for an invoice, most recent first.
    pub fn match_results_for(&self, invoice_id: Uuid) -> ReconResult<Vec<MatchResult>> {
        self.storage
            .match_results_for_invoice(self.tenant_id, invoice_id)
    }

    /// Apply user feedback to a match result and audit it.
    pub fn user_feedback(
        &self,
        match_result_id: Uuid,
        feedback: UserFeedback,
        actor: AuditActor,
        notes: Option<String>,
    ) -> ReconResult<MatchResult> {
        self.ensure_initialized()?;

        let mut result = self
            .storage
            .match_result(self.tenant_id, match_result_id)?
            .ok_or_else(|| ReconError::not_found(format!("match result {}", match_result_id)))?;

        let now = Utc::now();
        match feedback {
            UserFeedback::Approve => {
                result.match_status = MatchStatus::Approved;
                result.approved_at = Some(now);
                result.approved_by = actor.user_id;
                result.requires_review = false;
            }
            UserFeedback::Reject => {
                result.match_status = MatchStatus::Rejected;
                result.review_notes = notes.clone();
                result.reviewed_at = Some(now);
                result.reviewed_by = actor.user_id;
                result.requires_review = false;
            }
            UserFeedback::Modify => {
                result.match_status = MatchStatus::ManualReview;
                result.reviewed_at = Some(now);
                result.reviewed_by = actor.user_id;
                result.requires_review = true;
            }
        }

        let audit = NewAuditEvent::new(
            self.tenant_id,
            match_result_id,
            AuditEventType::UserFeedback,
            format!("User feedback received: {}", feedback.as_str()),
        )
        .with_factors(serde_json::json!({
            "feedback": feedback.as_str(),
            "notes": notes,
        }))
        .with_algorithm_version(ALGORITHM_VERSION)
        .with_actor(actor);

        let updated = result.clone();
        self.storage.transaction(self.tenant_id, &mut |txn| {
            txn.update_match_result(updated.clone())?;
            txn.append_audit_event(audit.clone())?;
            Ok(())
        })?;

        info!(%match_result_id, feedback = feedback.as_str(), "user feedback processed");
        Ok(result)
    }
}
