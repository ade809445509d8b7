//! Batch processing metrics.

use std::time::Duration;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use invrecon_core::MatchType;

use crate::two_way::MatchDecision;

/// Aggregate metrics for one batch matching run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingMetrics {
    /// Invoices submitted
    pub total_invoices: usize,
    /// Decisions with an exact match
    pub exact_matches: usize,
    /// Decisions with a fuzzy match
    pub fuzzy_matches: usize,
    /// Invoices with no candidate above threshold
    pub unmatched: usize,
    /// Decisions auto-approved
    pub auto_approved: usize,
    /// Decisions queued for review
    pub manual_review: usize,
    /// Invoices whose processing failed
    pub errors: usize,
    /// Wall-clock processing time in seconds
    pub processing_time_secs: f64,
    /// Mean confidence over matched invoices
    pub average_confidence: Decimal,
}

impl ProcessingMetrics {
    /// Aggregate decisions from a completed batch.
    pub fn from_results(
        results: &[(uuid::Uuid, Option<MatchDecision>)],
        errors: usize,
        elapsed: Duration,
    ) -> Self {
        let decisions: Vec<&MatchDecision> =
            results.iter().filter_map(|(_, d)| d.as_ref()).collect();

        let confidence_sum: f64 = decisions
            .iter()
            .map(|d| {
                use rust_decimal::prelude::ToPrimitive;
                d.confidence_score.to_f64().unwrap_or(0.0)
            })
            .sum();
        let average_confidence = if decisions.is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from_f64(confidence_sum / decisions.len() as f64)
                .unwrap_or(Decimal::ZERO)
                .round_dp(4)
        };

        Self {
            total_invoices: results.len() + errors,
            exact_matches: decisions
                .iter()
                .filter(|d| d.match_type == MatchType::Exact)
                .count(),
            fuzzy_matches: decisions
                .iter()
                .filter(|d| d.match_type == MatchType::Fuzzy)
                .count(),
            unmatched: results.iter().filter(|(_, d)| d.is_none()).count(),
            auto_approved: decisions.iter().filter(|d| d.auto_approved).count(),
            manual_review: decisions.iter().filter(|d| d.requires_review).count(),
            errors,
            processing_time_secs: elapsed.as_secs_f64(),
            average_confidence,
        }
    }
}
