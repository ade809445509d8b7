//! Weighted confidence scoring with per-factor explainability.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;

use invrecon_core::{MatchingConfiguration, ReconError, ReconResult};

/// Tolerance when checking that weights sum to 1.0.
const WEIGHT_SUM_EPSILON: f64 = 0.001;

/// Factor weights installed from the tenant configuration.
#[derive(Debug, Clone, Copy)]
pub struct FactorWeights {
    pub vendor_name: f64,
    pub amount: f64,
    pub date: f64,
    pub reference: f64,
}

impl FactorWeights {
    /// Extract weights from a matching configuration.
    pub fn from_config(config: &MatchingConfiguration) -> Self {
        Self {
            vendor_name: decimal_to_f64(config.vendor_name_weight),
            amount: decimal_to_f64(config.amount_weight),
            date: decimal_to_f64(config.date_weight),
            reference: decimal_to_f64(config.reference_weight),
        }
    }
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            vendor_name: 0.30,
            amount: 0.40,
            date: 0.20,
            reference: 0.10,
        }
    }
}

fn decimal_to_f64(d: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    d.to_f64().unwrap_or(0.0)
}

/// Observed facts about one invoice/PO comparison, fed to the scorer.
#[derive(Debug, Clone, Serialize)]
pub struct MatchFactors {
    /// Composite vendor name similarity, in [0, 1]
    pub vendor_similarity: f64,

    /// Same vendor id on both documents
    pub vendor_exact_match: bool,

    /// Amount variance inside the resolved tolerance
    pub amount_within_tolerance: bool,

    /// Relative amount variance
    pub amount_variance: Decimal,

    /// Amounts equal to the cent
    pub amount_exact_match: bool,

    /// Date variance inside the resolved tolerance
    pub date_within_tolerance: bool,

    /// Absolute date variance in days
    pub date_variance_days: i64,

    /// PO reference equals the PO number (case-insensitive)
    pub reference_exact_match: bool,

    /// Composite similarity of the reference when not exact
    pub reference_similarity: f64,
}

impl MatchFactors {
    /// Serialize to the JSON map persisted in `criteria_met`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "vendor_similarity": self.vendor_similarity,
            "vendor_exact_match": self.vendor_exact_match,
            "amount_within_tolerance": self.amount_within_tolerance,
            "amount_variance_percentage": self.amount_variance,
            "amount_exact_match": self.amount_exact_match,
            "date_within_tolerance": self.date_within_tolerance,
            "date_variance_days": self.date_variance_days,
            "reference_exact_match": self.reference_exact_match,
            "reference_similarity": self.reference_similarity,
        })
    }
}

/// Per-factor score breakdown, keyed by the factor names in the weights.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FactorBreakdown {
    pub vendor_name: f64,
    pub amount: f64,
    pub date: f64,
    pub reference: f64,
}

impl FactorBreakdown {
    /// Serialize to the JSON map persisted in `confidence_breakdown`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "vendor_name": self.vendor_name,
            "amount": self.amount,
            "date": self.date,
            "reference": self.reference,
        })
    }
}

/// Weighted confidence scorer.
///
/// Construction fails when the weights do not sum to 1.0, so an engine can
/// never run with a skewed factor mix.
pub struct ConfidenceScorer {
    weights: FactorWeights,
}

impl ConfidenceScorer {
    /// Create a scorer, validating the weight sum.
    pub fn new(weights: FactorWeights) -> ReconResult<Self> {
        let sum = weights.vendor_name + weights.amount + weights.date + weights.reference;
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ReconError::config(format!(
                "Confidence weights must sum to 1.0, got {}",
                sum
            )));
        }
        Ok(Self { weights })
    }

    /// Scorer with the default weights.
    pub fn with_defaults() -> Self {
        Self {
            weights: FactorWeights::default(),
        }
    }

    /// Compute the weighted confidence and its per-factor breakdown.
    ///
    /// The confidence is quantized to 4 decimal places, rounding half up.
    pub fn calculate(&self, factors: &MatchFactors) -> (Decimal, FactorBreakdown) {
        let vendor_score = factors.vendor_similarity.clamp(0.0, 1.0);

        let amount_variance = decimal_to_f64(factors.amount_variance);
        let amount_score = if factors.amount_within_tolerance {
            (1.0 - amount_variance).max(0.0)
        } else {
            (0.5 - amount_variance).max(0.0)
        };

        let days = factors.date_variance_days as f64;
        let date_score = if factors.date_within_tolerance {
            (1.0 - days / 30.0).max(0.7)
        } else {
            (0.5 - days / 60.0).max(0.0)
        };

        let reference_score = if factors.reference_exact_match {
            1.0
        } else {
            factors.reference_similarity.clamp(0.0, 1.0)
        };

        let breakdown = FactorBreakdown {
            vendor_name: vendor_score,
            amount: amount_score,
            date: date_score,
            reference: reference_score,
        };

        let weighted = vendor_score * self.weights.vendor_name
            + amount_score * self.weights.amount
            + date_score * self.weights.date
            + reference_score * self.weights.reference;

        let confidence = Decimal::from_f64(weighted)
            .unwrap_or(Decimal::ZERO)
            .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
            .clamp(Decimal::ZERO, dec!(1.0));

        (confidence, breakdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perfect_factors() -> MatchFactors {
        MatchFactors {
            vendor_similarity: 1.0,
            vendor_exact_match: true,
            amount_within_tolerance: true,
            amount_variance: Decimal::ZERO,
            amount_exact_match: true,
            date_within_tolerance: true,
            date_variance_days: 0,
            reference_exact_match: true,
            reference_similarity: 1.0,
        }
    }

    #[test]
    fn test_perfect_factors_score_one() {
        let scorer = ConfidenceScorer::with_defaults();
        let (confidence, breakdown) = scorer.calculate(&perfect_factors());

        assert_eq!(confidence, dec!(1.0000));
        assert_eq!(breakdown.vendor_name, 1.0);
        assert_eq!(breakdown.reference, 1.0);
    }

    #[test]
    fn test_bad_weights_rejected() {
        let weights = FactorWeights {
            vendor_name: 0.5,
            amount: 0.5,
            date: 0.5,
            reference: 0.5,
        };
        assert!(ConfidenceScorer::new(weights).is_err());
    }

    #[test]
    fn test_date_score_floors_at_point_seven_within_tolerance() {
        let scorer = ConfidenceScorer::with_defaults();
        let mut factors = perfect_factors();
        factors.date_variance_days = 29; // 1 - 29/30 < 0.7, floor applies

        let (_, breakdown) = scorer.calculate(&factors);
        assert_eq!(breakdown.date, 0.7);
    }

    #[test]
    fn test_out_of_tolerance_amount_is_penalized() {
        let scorer = ConfidenceScorer::with_defaults();
        let mut factors = perfect_factors();
        factors.amount_within_tolerance = false;
        factors.amount_variance = dec!(0.10);

        let (_, breakdown) = scorer.calculate(&factors);
        assert!((breakdown.amount - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_always_in_unit_interval() {
        let scorer = ConfidenceScorer::with_defaults();
        let mut factors = perfect_factors();
        factors.amount_variance = dec!(5.0);
        factors.amount_within_tolerance = false;
        factors.date_variance_days = 400;
        factors.date_within_tolerance = false;
        factors.vendor_similarity = 0.0;
        factors.reference_exact_match = false;
        factors.reference_similarity = 0.0;

        let (confidence, _) = scorer.calculate(&factors);
        assert!(confidence >= Decimal::ZERO && confidence <= dec!(1.0));
    }
}
