//! Per-tenant matching configuration, versioned.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-tenant matching configuration.
///
/// Exactly one version is active per tenant; `(tenant_id, config_version)`
/// is unique. Thresholds must satisfy
/// `auto_approve >= manual_review >= rejection` and the four factor weights
/// must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfiguration {
    /// Configuration identifier
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Confidence at or above which matches auto-approve
    pub auto_approve_threshold: Decimal,

    /// Confidence at or above which matches queue for review
    pub manual_review_threshold: Decimal,

    /// Confidence below which candidates are discarded
    pub rejection_threshold: Decimal,

    /// Enable the fuzzy matching pass
    pub fuzzy_matching_enabled: bool,

    /// Enable phonetic (soundex) comparison
    pub phonetic_matching_enabled: bool,

    /// Enable OCR confusion-variant generation
    pub ocr_correction_enabled: bool,

    /// Vendor name factor weight
    pub vendor_name_weight: Decimal,

    /// Amount factor weight
    pub amount_weight: Decimal,

    /// Date factor weight
    pub date_weight: Decimal,

    /// Reference factor weight
    pub reference_weight: Decimal,

    /// Batch size for bulk matching, in (0, 1000]
    pub batch_size: u32,

    /// Enable parallel batch matching
    pub parallel_processing_enabled: bool,

    /// Worker pool size for parallel batches, in (0, 20]
    pub max_concurrent_jobs: u32,

    /// Default date window for candidate lookup, days
    pub default_date_range_days: u32,

    /// Maximum permitted date window, days
    pub max_date_range_days: u32,

    /// Enable ML-assisted scoring
    pub machine_learning_enabled: bool,

    /// Enable learning from user feedback
    pub feedback_learning_enabled: bool,

    /// Version label, unique within the tenant
    pub config_version: String,

    /// Is this the active version
    pub is_active: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Actor that created the version
    pub created_by: Option<Uuid>,
}

impl MatchingConfiguration {
    /// Create the default configuration for a tenant, version "1".
    pub fn defaults(tenant_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            auto_approve_threshold: dec!(0.85),
            manual_review_threshold: dec!(0.70),
            rejection_threshold: dec!(0.30),
            fuzzy_matching_enabled: true,
            phonetic_matching_enabled: true,
            ocr_correction_enabled: true,
            vendor_name_weight: dec!(0.30),
            amount_weight: dec!(0.40),
            date_weight: dec!(0.20),
            reference_weight: dec!(0.10),
            batch_size: 100,
            parallel_processing_enabled: true,
            max_concurrent_jobs: 4,
            default_date_range_days: 7,
            max_date_range_days: 30,
            machine_learning_enabled: true,
            feedback_learning_enabled: true,
            config_version: "1".to_string(),
            is_active: true,
            created_at: Utc::now(),
            created_by: None,
        }
    }

    /// Sum of the four factor weights.
    pub fn weight_sum(&self) -> Decimal {
        self.vendor_name_weight + self.amount_weight + self.date_weight + self.reference_weight
    }
}
