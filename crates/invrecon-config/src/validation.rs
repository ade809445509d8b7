//! Matching configuration validation.
//!
//! Engines refuse to run on an invalid configuration, so every rule here
//! surfaces as `ReconError::ConfigError` at initialization time rather than
//! mid-batch.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use invrecon_core::{MatchingConfiguration, ReconError, ReconResult};

/// Tolerance when checking that factor weights sum to 1.0.
const WEIGHT_SUM_EPSILON: Decimal = dec!(0.001);

/// Maximum permitted batch size.
const MAX_BATCH_SIZE: u32 = 1000;

/// Maximum permitted worker pool size.
const MAX_CONCURRENT_JOBS: u32 = 20;

/// Maximum permitted candidate date window in days.
const MAX_DATE_RANGE_DAYS: u32 = 365;

/// Validate a matching configuration.
pub fn validate_config(config: &MatchingConfiguration) -> ReconResult<()> {
    validate_thresholds(config)?;
    validate_weights(config)?;
    validate_performance(config)?;
    validate_date_ranges(config)?;
    Ok(())
}

fn validate_thresholds(config: &MatchingConfiguration) -> ReconResult<()> {
    for (name, value) in [
        ("auto_approve_threshold", config.auto_approve_threshold),
        ("manual_review_threshold", config.manual_review_threshold),
        ("rejection_threshold", config.rejection_threshold),
    ] {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(ReconError::config(format!(
                "{} must be within [0, 1], got {}",
                name, value
            )));
        }
    }

    if config.auto_approve_threshold < config.manual_review_threshold {
        return Err(ReconError::config(format!(
            "auto_approve_threshold ({}) must be >= manual_review_threshold ({})",
            config.auto_approve_threshold, config.manual_review_threshold
        )));
    }
    if config.manual_review_threshold < config.rejection_threshold {
        return Err(ReconError::config(format!(
            "manual_review_threshold ({}) must be >= rejection_threshold ({})",
            config.manual_review_threshold, config.rejection_threshold
        )));
    }
    Ok(())
}

fn validate_weights(config: &MatchingConfiguration) -> ReconResult<()> {
    for (name, value) in [
        ("vendor_name_weight", config.vendor_name_weight),
        ("amount_weight", config.amount_weight),
        ("date_weight", config.date_weight),
        ("reference_weight", config.reference_weight),
    ] {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(ReconError::config(format!(
                "{} must be within [0, 1], got {}",
                name, value
            )));
        }
    }

    let sum = config.weight_sum();
    if (sum - Decimal::ONE).abs() > WEIGHT_SUM_EPSILON {
        return Err(ReconError::config(format!(
            "Factor weights must sum to 1.0, got {}",
            sum
        )));
    }
    Ok(())
}

fn validate_performance(config: &MatchingConfiguration) -> ReconResult<()> {
    if config.batch_size == 0 || config.batch_size > MAX_BATCH_SIZE {
        return Err(ReconError::config(format!(
            "batch_size must be within (0, {}], got {}",
            MAX_BATCH_SIZE, config.batch_size
        )));
    }
    if config.max_concurrent_jobs == 0 || config.max_concurrent_jobs > MAX_CONCURRENT_JOBS {
        return Err(ReconError::config(format!(
            "max_concurrent_jobs must be within (0, {}], got {}",
            MAX_CONCURRENT_JOBS, config.max_concurrent_jobs
        )));
    }
    Ok(())
}

fn validate_date_ranges(config: &MatchingConfiguration) -> ReconResult<()> {
    if config.default_date_range_days == 0
        || config.default_date_range_days > config.max_date_range_days
    {
        return Err(ReconError::config(format!(
            "default_date_range_days ({}) must be within (0, max_date_range_days ({})]",
            config.default_date_range_days, config.max_date_range_days
        )));
    }
    if config.max_date_range_days > MAX_DATE_RANGE_DAYS {
        return Err(ReconError::config(format!(
            "max_date_range_days must be at most {}, got {}",
            MAX_DATE_RANGE_DAYS, config.max_date_range_days
        )));
    }
    Ok(())
}
